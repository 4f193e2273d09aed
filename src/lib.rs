// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Proteus — diagram-document synchronization engine.
//!
//! Stores a structured diagram scene inside a plain-text container file, keeps it consistent
//! under concurrent external modification, and lazily materializes referenced resources. Hosts
//! plug in storage, rendering, and reference lookup through the traits in [`host`].

pub mod engine;
pub mod format;
pub mod host;
pub mod loader;
pub mod merge;
pub mod model;
pub mod resolve;
pub mod scene;

pub use engine::{DocumentEngine, EngineConfig, EngineError, EngineState};
pub use scene::Scene;
