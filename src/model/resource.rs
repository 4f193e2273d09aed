// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use smol_str::SmolStr;

use super::ids::FileId;

/// Materialized bytes of an external resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceData {
    bytes: Vec<u8>,
    mime: SmolStr,
}

impl ResourceData {
    pub fn new(bytes: Vec<u8>, mime: impl AsRef<str>) -> Self {
        Self {
            bytes,
            mime: SmolStr::new(mime.as_ref()),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }
}

/// An external resource referenced by one or more image-type elements.
///
/// Created on first reference discovery with no materialized data; the
/// resource loader fills in `data` on a successful load. Resources are never
/// dropped while any element still references their file id (reference
/// counting is by scan, not by an explicit counter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedResource {
    file_id: FileId,
    data: Option<ResourceData>,
    mime: Option<SmolStr>,
    dark_variant: bool,
    attempt_counter: u32,
    equation: Option<String>,
}

impl EmbeddedResource {
    pub fn new_file(file_id: FileId) -> Self {
        Self {
            file_id,
            data: None,
            mime: None,
            dark_variant: false,
            attempt_counter: 0,
            equation: None,
        }
    }

    pub fn new_equation(file_id: FileId, formula: impl Into<String>) -> Self {
        Self {
            file_id,
            data: None,
            mime: None,
            dark_variant: false,
            attempt_counter: 0,
            equation: Some(formula.into()),
        }
    }

    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    pub fn data(&self) -> Option<&ResourceData> {
        self.data.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn set_data(&mut self, data: ResourceData) {
        self.mime = Some(SmolStr::new(data.mime()));
        self.data = Some(data);
    }

    pub fn clear_data(&mut self) {
        self.data = None;
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn set_mime(&mut self, mime: Option<&str>) {
        self.mime = mime.map(SmolStr::new);
    }

    /// Resources may carry different renditions for light and dark
    /// presentation; the flag records which variant `data` holds.
    pub fn dark_variant(&self) -> bool {
        self.dark_variant
    }

    pub fn set_dark_variant(&mut self, dark: bool) {
        self.dark_variant = dark;
    }

    pub fn attempt_counter(&self) -> u32 {
        self.attempt_counter
    }

    pub fn record_attempt(&mut self) {
        self.attempt_counter = self.attempt_counter.saturating_add(1);
    }

    pub fn reset_attempts(&mut self) {
        self.attempt_counter = 0;
    }

    pub fn is_equation(&self) -> bool {
        self.equation.is_some()
    }

    pub fn equation(&self) -> Option<&str> {
        self.equation.as_deref()
    }

    pub fn set_equation(&mut self, formula: Option<String>) {
        self.equation = formula;
    }
}
