// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Container format parsing/serialization.
//!
//! A document container is a text file with a metadata header, an element-text section holding
//! each text element's raw source, and a data block holding the serialized snapshot in either a
//! plain or compressed encoding. A legacy bare-snapshot format is read-supported.

pub mod container;

pub use container::{
    generate_container, parse_container, peek_text_mode, ContainerDoc, FormatError, WriteOptions,
};
