// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;

use smallvec::SmallVec;
use smol_str::SmolStr;

use super::ids::{ElementId, FileId, GroupId};

/// The kind tag of a diagram element.
///
/// Geometry and style are opaque to the engine; the kind only matters where
/// behavior differs (text resolution, resource binding on images). Unknown
/// kinds from newer writers are preserved verbatim through round trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Shape,
    Text,
    Image,
    Arrow,
    Frame,
    Other(SmolStr),
}

impl ElementKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "shape" => Self::Shape,
            "text" => Self::Text,
            "image" => Self::Image,
            "arrow" => Self::Arrow,
            "frame" => Self::Frame,
            other => Self::Other(SmolStr::new(other)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Shape => "shape",
            Self::Text => "text",
            Self::Image => "image",
            Self::Arrow => "arrow",
            Self::Frame => "frame",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Back-reference from a container element to one bound to it (e.g. a shape
/// referencing its bound text label).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundRef {
    pub id: ElementId,
    pub kind: ElementKind,
}

/// Text payload of a text element.
///
/// `raw` is the stored source form and may contain unresolved reference
/// syntax; `display` is the resolved presentation form. `display` is always
/// derivable from `raw` plus the resolution context and is never the sole
/// source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextContent {
    raw: String,
    display: String,
}

impl TextContent {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let display = raw.clone();
        Self { raw, display }
    }

    pub fn with_display(raw: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            display: display.into(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn set_raw(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
    }

    pub fn set_display(&mut self, display: impl Into<String>) {
        self.display = display.into();
    }
}

/// A single addressable diagram primitive.
///
/// `id` is immutable for the lifetime of the element. `version` is
/// monotonic per element; an element with a higher version always represents
/// equal-or-later state than one with a lower version for the same id.
/// Soft-deleted elements are retained until a compaction point so that
/// concurrent external writers observing them can converge.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    id: ElementId,
    version: u64,
    kind: ElementKind,
    is_deleted: bool,
    group_ids: SmallVec<[GroupId; 4]>,
    bound_elements: SmallVec<[BoundRef; 2]>,
    link: Option<String>,
    file_id: Option<FileId>,
    text: Option<TextContent>,
    custom: serde_json::Value,
}

impl Element {
    pub fn new(id: ElementId, kind: ElementKind) -> Self {
        let text = matches!(kind, ElementKind::Text).then(TextContent::default);
        Self {
            id,
            version: 1,
            kind,
            is_deleted: false,
            group_ids: SmallVec::new(),
            bound_elements: SmallVec::new(),
            link: None,
            file_id: None,
            text,
            custom: serde_json::Value::Null,
        }
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn bump_version(&mut self) {
        self.version = self.version.saturating_add(1);
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, ElementKind::Text)
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, ElementKind::Image)
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.is_deleted = deleted;
    }

    pub fn group_ids(&self) -> &[GroupId] {
        &self.group_ids
    }

    pub fn group_ids_mut(&mut self) -> &mut SmallVec<[GroupId; 4]> {
        &mut self.group_ids
    }

    pub fn bound_elements(&self) -> &[BoundRef] {
        &self.bound_elements
    }

    pub fn bound_elements_mut(&mut self) -> &mut SmallVec<[BoundRef; 2]> {
        &mut self.bound_elements
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn set_link(&mut self, link: Option<String>) {
        self.link = link;
    }

    pub fn file_id(&self) -> Option<&FileId> {
        self.file_id.as_ref()
    }

    pub fn set_file_id(&mut self, file_id: Option<FileId>) {
        self.file_id = file_id;
    }

    pub fn text(&self) -> Option<&TextContent> {
        self.text.as_ref()
    }

    pub fn text_mut(&mut self) -> Option<&mut TextContent> {
        self.text.as_mut()
    }

    pub fn set_text(&mut self, text: Option<TextContent>) {
        self.text = text;
    }

    /// Opaque geometry/style payload, preserved byte-for-byte through the
    /// container codec.
    pub fn custom(&self) -> &serde_json::Value {
        &self.custom
    }

    pub fn set_custom(&mut self, custom: serde_json::Value) {
        self.custom = custom;
    }
}
