// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core data model.
//!
//! Documents contain ordered diagram elements (including soft-deleted ones) plus embedded
//! resources and presentation state.

pub mod element;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod ids;
pub mod resource;
pub mod snapshot;

pub use element::{BoundRef, Element, ElementKind, TextContent};
pub use ids::{ElementId, FileId, GroupId, Id, IdError};
pub use resource::{EmbeddedResource, ResourceData};
pub use snapshot::{
    scene_fingerprint, ExportPreference, ParseTextModeError, TextMode, Theme, ViewState,
};
