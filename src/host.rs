// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Collaborator interfaces exposed by the hosting environment.
//!
//! The engine never touches storage, rendering, or reference lookup directly; everything flows
//! through these traits so hosts (and tests) can provide their own implementations.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{Element, FileId, ResourceData, ViewState};
use crate::resolve::CachedTarget;
use crate::scene::Scene;

/// Opaque per-write revision stamp reported by the host's storage layer,
/// used to detect that a write produced no observable change.
pub type RevisionStamp = u64;

/// File access offered by the hosting environment.
///
/// Change notifications travel the other way: the host calls
/// `DocumentEngine::notify_external_change` with the affected path.
#[async_trait]
pub trait FileAccess: Send + Sync {
    async fn read(&self, path: &Path) -> io::Result<String>;
    async fn write(&self, path: &Path, text: &str) -> io::Result<RevisionStamp>;
    async fn exists(&self, path: &Path) -> bool;
}

/// Partial scene update pushed to the rendering surface.
#[derive(Debug, Clone, Default)]
pub struct SceneUpdate {
    pub elements: Option<Vec<Element>>,
    pub resources: Vec<(FileId, ResourceData)>,
    pub view: Option<ViewState>,
}

/// The rendering/editing surface the engine synchronizes with.
pub trait RenderSurface: Send + Sync {
    /// Current scene elements including soft-deleted ones, in layer order.
    fn elements(&self) -> Vec<Element>;
    fn view_state(&self) -> ViewState;
    /// True while a user edit (text entry, drag) is in flight.
    fn is_editing(&self) -> bool;
    /// True when the same container is being edited as plain text elsewhere;
    /// the engine then writes the uncompressed encoding for that save.
    fn plain_text_coedit(&self) -> bool;
    fn apply_update(&self, update: SceneUpdate, restore: bool);
    /// Drops the undo buffer. Requested after asynchronous text resolution
    /// so undo cannot resurrect the stale pre-resolution text.
    fn clear_history(&self);
    fn warn_user(&self, message: &str);
}

/// Resolution of reference targets and materialization of resources.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Synchronous cache probe used by the quick resolution path.
    fn cached_target(&self, target: &str) -> CachedTarget;
    /// Slow path: looks the target up in the hosting environment.
    async fn resolve_target(&self, target: &str) -> Option<String>;
    async fn fetch_resource(&self, file_id: &FileId, dark: bool) -> Option<ResourceData>;
    async fn render_equation(&self, formula: &str, dark: bool) -> Option<ResourceData>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Svg,
    Png,
}

/// Auxiliary export obligations triggered after explicit saves.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn export(&self, kind: ExportKind, scene: &Scene) -> io::Result<()>;
}

/// Bundle of host collaborators handed to a document engine.
#[derive(Clone)]
pub struct HostHandles {
    pub files: Arc<dyn FileAccess>,
    pub surface: Arc<dyn RenderSurface>,
    pub references: Arc<dyn ReferenceSource>,
    pub exports: Arc<dyn ExportSink>,
}
