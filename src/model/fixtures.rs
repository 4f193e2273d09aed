// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use super::element::{Element, ElementKind, TextContent};
use super::ids::{ElementId, FileId};

pub(crate) fn eid(value: &str) -> ElementId {
    ElementId::new(value).expect("element id")
}

pub(crate) fn fid(value: &str) -> FileId {
    FileId::new(value).expect("file id")
}

pub(crate) fn shape(id: &str, version: u64) -> Element {
    let mut element = Element::new(eid(id), ElementKind::Shape);
    element.set_version(version);
    element
}

pub(crate) fn text(id: &str, version: u64, raw: &str) -> Element {
    let mut element = Element::new(eid(id), ElementKind::Text);
    element.set_version(version);
    element.set_text(Some(TextContent::new(raw)));
    element
}

pub(crate) fn image(id: &str, version: u64, file_id: &str) -> Element {
    let mut element = Element::new(eid(id), ElementKind::Image);
    element.set_version(version);
    element.set_file_id(Some(fid(file_id)));
    element
}
