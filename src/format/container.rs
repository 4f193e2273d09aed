// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::io::{Read, Write};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{
    BoundRef, Element, ElementId, ElementKind, EmbeddedResource, ExportPreference, FileId,
    GroupId, IdError, ParseTextModeError, ResourceData, TextContent, TextMode, Theme,
};
use crate::scene::Scene;

const HEADER_MODE_KEY: &str = "proteus-doc";
const HEADER_EXPORT_KEY: &str = "proteus-export";
const TEXT_SECTION: &str = "# Element Text";
const DATA_SECTION: &str = "# Document Data";
const FENCE_JSON: &str = "```json";
const FENCE_COMPRESSED: &str = "```compressed-json";
const BASE64_LINE_WIDTH: usize = 76;

#[derive(Debug)]
pub enum FormatError {
    MissingDataSection,
    UnknownEncoding {
        fence: String,
    },
    Json {
        source: serde_json::Error,
    },
    Base64 {
        source: base64::DecodeError,
    },
    Compress {
        source: io::Error,
    },
    Decompress {
        source: io::Error,
    },
    InvalidId {
        field: &'static str,
        value: String,
        source: IdError,
    },
    InvalidTextMode {
        source: ParseTextModeError,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDataSection => {
                write!(f, "container has no {DATA_SECTION:?} section")
            }
            Self::UnknownEncoding { fence } => {
                write!(f, "unknown document data encoding {fence:?}")
            }
            Self::Json { source } => write!(f, "document data is not valid json: {source}"),
            Self::Base64 { source } => {
                write!(f, "compressed document data is not valid base64: {source}")
            }
            Self::Compress { source } => write!(f, "cannot compress document data: {source}"),
            Self::Decompress { source } => {
                write!(f, "cannot decompress document data: {source}")
            }
            Self::InvalidId { field, value, source } => {
                write!(f, "invalid id for {field}: {value:?}: {source}")
            }
            Self::InvalidTextMode { source } => write!(f, "invalid container header: {source}"),
        }
    }
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json { source } => Some(source),
            Self::Base64 { source } => Some(source),
            Self::Compress { source } | Self::Decompress { source } => Some(source),
            Self::InvalidId { source, .. } => Some(source),
            Self::InvalidTextMode { source } => Some(source),
            Self::MissingDataSection | Self::UnknownEncoding { .. } => None,
        }
    }
}

/// A parsed container document.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDoc {
    pub scene: Scene,
    pub export_override: Option<ExportPreference>,
    /// True when the source was the legacy bare-snapshot format.
    pub legacy: bool,
    /// True when the data block used the compressed encoding.
    pub compressed: bool,
}

/// Options for serializing a scene into container text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub compress: bool,
    pub export_override: Option<ExportPreference>,
}

/// Parses container text into a scene.
///
/// A document whose first non-whitespace byte is `{` is read as the legacy
/// bare-snapshot format and mapped to raw text mode. Everything else must
/// carry a document-data section; its absence is a parse error.
pub fn parse_container(text: &str) -> Result<ContainerDoc, FormatError> {
    if text.trim_start().starts_with('{') {
        let snapshot: SnapshotJson =
            serde_json::from_str(text).map_err(|source| FormatError::Json { source })?;
        let mut scene = scene_from_json(snapshot)?;
        scene.set_text_mode(TextMode::Raw);
        return Ok(ContainerDoc {
            scene,
            export_override: None,
            legacy: true,
            compressed: false,
        });
    }

    let (text_mode, export_override) = parse_header(text)?;

    let data_start = text.find(DATA_SECTION).ok_or(FormatError::MissingDataSection)?;
    let data_body = &text[data_start + DATA_SECTION.len()..];
    let json = decode_data_block(data_body)?;
    let compressed = data_body.trim_start().starts_with(FENCE_COMPRESSED);

    let snapshot: SnapshotJson =
        serde_json::from_str(&json).map_err(|source| FormatError::Json { source })?;
    let mut scene = scene_from_json(snapshot)?;
    scene.set_text_mode(text_mode);

    overlay_raw_text(&mut scene, section_body(text, data_start));

    Ok(ContainerDoc {
        scene,
        export_override,
        legacy: false,
        compressed,
    })
}

/// Serializes a scene into container text.
///
/// The element-text section stores each text element's raw source keyed by
/// an element anchor; the data block stores everything else. Both encodings
/// of the data block round-trip losslessly.
pub fn generate_container(scene: &Scene, options: &WriteOptions) -> Result<String, FormatError> {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("{HEADER_MODE_KEY}: {}\n", scene.text_mode()));
    if let Some(preference) = options.export_override {
        out.push_str(&format!("{HEADER_EXPORT_KEY}: {}\n", preference.as_str()));
    }
    out.push_str("---\n\n");

    out.push_str(TEXT_SECTION);
    out.push('\n');
    for element in scene.elements() {
        let Some(text) = element.text() else {
            continue;
        };
        out.push('\n');
        out.push_str(text.raw());
        out.push_str(&format!(" ^{}\n", element.id()));
    }

    out.push('\n');
    out.push_str(DATA_SECTION);
    out.push('\n');

    let json = serde_json::to_string_pretty(&scene_to_json(scene))
        .map_err(|source| FormatError::Json { source })?;

    if options.compress {
        out.push_str(FENCE_COMPRESSED);
        out.push('\n');
        out.push_str(&compress_block(&json)?);
        out.push_str("```\n");
    } else {
        out.push_str(FENCE_JSON);
        out.push('\n');
        out.push_str(&json);
        out.push_str("\n```\n");
    }

    Ok(out)
}

/// Reads only the text-mode header of a container, without decoding the data
/// block. Used for the lightweight metadata-only refresh path.
pub fn peek_text_mode(text: &str) -> Result<TextMode, FormatError> {
    if text.trim_start().starts_with('{') {
        return Ok(TextMode::Raw);
    }
    parse_header(text).map(|(mode, _)| mode)
}

fn parse_header(text: &str) -> Result<(TextMode, Option<ExportPreference>), FormatError> {
    let mut text_mode = TextMode::Raw;
    let mut export_override = None;

    let Some(rest) = text.strip_prefix("---\n") else {
        return Ok((text_mode, export_override));
    };
    let Some(end) = rest.find("\n---") else {
        return Ok((text_mode, export_override));
    };

    for line in rest[..end].lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            HEADER_MODE_KEY => {
                text_mode = value
                    .parse()
                    .map_err(|source| FormatError::InvalidTextMode { source })?;
            }
            HEADER_EXPORT_KEY => {
                export_override = ExportPreference::parse(value);
            }
            _ => {}
        }
    }

    Ok((text_mode, export_override))
}

fn section_body<'a>(text: &'a str, data_start: usize) -> &'a str {
    match text.find(TEXT_SECTION) {
        Some(start) if start < data_start => &text[start + TEXT_SECTION.len()..data_start],
        _ => "",
    }
}

fn text_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)(.*?) \^(\S+)\n").expect("text block regex compiles")
    })
}

/// Overlays raw text from the element-text section onto the scene's text
/// elements. Display text stays what the data block said; entries for
/// unknown anchors are ignored.
fn overlay_raw_text(scene: &mut Scene, section: &str) {
    for capture in text_block_regex().captures_iter(section) {
        let raw = capture.get(1).map(|m| m.as_str().trim_start_matches('\n')).unwrap_or("");
        let Some(anchor) = capture.get(2) else {
            continue;
        };
        let Ok(id) = ElementId::new(anchor.as_str()) else {
            continue;
        };
        if let Some(element) = scene.get_mut(&id) {
            if let Some(text) = element.text_mut() {
                text.set_raw(raw);
            }
        }
    }
}

fn decode_data_block(body: &str) -> Result<String, FormatError> {
    let body = body.trim_start();
    if let Some(rest) = body.strip_prefix(FENCE_COMPRESSED) {
        let block = fenced_content(rest)?;
        return decompress_block(block);
    }
    if let Some(rest) = body.strip_prefix(FENCE_JSON) {
        let block = fenced_content(rest)?;
        return Ok(block.to_owned());
    }

    let fence = body.lines().next().unwrap_or("").to_owned();
    if fence.starts_with("```") {
        return Err(FormatError::UnknownEncoding { fence });
    }
    Err(FormatError::MissingDataSection)
}

fn fenced_content(rest: &str) -> Result<&str, FormatError> {
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let end = rest.find("\n```").ok_or(FormatError::MissingDataSection)?;
    Ok(&rest[..end])
}

fn compress_block(json: &str) -> Result<String, FormatError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let mut compressed = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 9, 22);
        writer
            .write_all(json.as_bytes())
            .map_err(|source| FormatError::Compress { source })?;
        writer
            .flush()
            .map_err(|source| FormatError::Compress { source })?;
    }

    let encoded = STANDARD.encode(&compressed);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH + 1);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 output is ascii"));
        out.push('\n');
    }
    Ok(out)
}

fn decompress_block(block: &str) -> Result<String, FormatError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let stripped: String = block.chars().filter(|ch| !ch.is_whitespace()).collect();
    let compressed = STANDARD
        .decode(stripped.as_bytes())
        .map_err(|source| FormatError::Base64 { source })?;

    let mut json = String::new();
    brotli::Decompressor::new(compressed.as_slice(), 4096)
        .read_to_string(&mut json)
        .map_err(|source| FormatError::Decompress { source })?;
    Ok(json)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotJson {
    #[serde(default)]
    elements: Vec<ElementJson>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    resources: BTreeMap<String, ResourceJson>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    links: BTreeMap<String, String>,
    #[serde(default)]
    view: ViewJson,
}

#[derive(Debug, Serialize, Deserialize)]
struct ElementJson {
    id: String,
    #[serde(default)]
    version: u64,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_deleted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    bound_elements: Vec<BoundRefJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    custom: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct BoundRefJson {
    id: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ResourceJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mime: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    dark_variant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewJson {
    #[serde(default)]
    theme: String,
    #[serde(default)]
    scroll_x: f64,
    #[serde(default)]
    scroll_y: f64,
    #[serde(default = "default_zoom")]
    zoom: f64,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    style_defaults: serde_json::Value,
}

fn default_zoom() -> f64 {
    1.0
}

impl Default for ViewJson {
    fn default() -> Self {
        Self {
            theme: String::new(),
            scroll_x: 0.0,
            scroll_y: 0.0,
            zoom: default_zoom(),
            style_defaults: serde_json::Value::Null,
        }
    }
}

fn scene_from_json(snapshot: SnapshotJson) -> Result<Scene, FormatError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let mut scene = Scene::new();

    for element_json in snapshot.elements {
        let id = ElementId::new(&element_json.id).map_err(|source| FormatError::InvalidId {
            field: "element id",
            value: element_json.id.clone(),
            source,
        })?;
        let mut element = Element::new(id, ElementKind::parse(&element_json.kind));
        element.set_version(element_json.version);
        element.set_deleted(element_json.is_deleted);
        element.set_link(element_json.link);
        element.set_custom(element_json.custom);

        for group in element_json.group_ids {
            let group_id = GroupId::new(&group).map_err(|source| FormatError::InvalidId {
                field: "group id",
                value: group.clone(),
                source,
            })?;
            element.group_ids_mut().push(group_id);
        }

        for bound in element_json.bound_elements {
            let bound_id = ElementId::new(&bound.id).map_err(|source| FormatError::InvalidId {
                field: "bound element id",
                value: bound.id.clone(),
                source,
            })?;
            element.bound_elements_mut().push(BoundRef {
                id: bound_id,
                kind: ElementKind::parse(&bound.kind),
            });
        }

        if let Some(file_id) = element_json.file_id {
            let file_id = FileId::new(&file_id).map_err(|source| FormatError::InvalidId {
                field: "file id",
                value: file_id.clone(),
                source,
            })?;
            element.set_file_id(Some(file_id));
        }

        if let Some(display) = element_json.text {
            element.set_text(Some(TextContent::with_display(display.clone(), display)));
        }

        scene.elements_mut().push(element);
    }

    for (raw_id, resource_json) in snapshot.resources {
        let file_id = FileId::new(&raw_id).map_err(|source| FormatError::InvalidId {
            field: "resource file id",
            value: raw_id.clone(),
            source,
        })?;
        let mut resource = match resource_json.equation {
            Some(formula) => EmbeddedResource::new_equation(file_id.clone(), formula),
            None => EmbeddedResource::new_file(file_id.clone()),
        };
        resource.set_mime(resource_json.mime.as_deref());
        resource.set_dark_variant(resource_json.dark_variant);
        if let (Some(data), Some(mime)) = (resource_json.data, resource.mime().map(str::to_owned))
        {
            if let Ok(bytes) = STANDARD.decode(data.as_bytes()) {
                resource.set_data(ResourceData::new(bytes, &mime));
            }
        }
        scene.resources_mut().insert(file_id, resource);
    }

    for (raw_id, link) in snapshot.links {
        let id = ElementId::new(&raw_id).map_err(|source| FormatError::InvalidId {
            field: "link element id",
            value: raw_id.clone(),
            source,
        })?;
        scene.links_mut().insert(id, link);
    }

    scene.view_mut().set_theme(Theme::parse(&snapshot.view.theme));
    scene
        .view_mut()
        .set_scroll(snapshot.view.scroll_x, snapshot.view.scroll_y);
    scene.view_mut().set_zoom(snapshot.view.zoom);
    scene.view_mut().set_style_defaults(snapshot.view.style_defaults);

    Ok(scene)
}

fn scene_to_json(scene: &Scene) -> SnapshotJson {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let elements = scene
        .elements()
        .iter()
        .map(|element| ElementJson {
            id: element.id().to_string(),
            version: element.version(),
            kind: element.kind().as_str().to_owned(),
            is_deleted: element.is_deleted(),
            group_ids: element.group_ids().iter().map(|g| g.to_string()).collect(),
            bound_elements: element
                .bound_elements()
                .iter()
                .map(|bound| BoundRefJson {
                    id: bound.id.to_string(),
                    kind: bound.kind.as_str().to_owned(),
                })
                .collect(),
            link: element.link().map(str::to_owned),
            file_id: element.file_id().map(|f| f.to_string()),
            text: element.text().map(|text| text.display().to_owned()),
            custom: element.custom().clone(),
        })
        .collect();

    let resources = scene
        .resources()
        .iter()
        .map(|(file_id, resource)| {
            (
                file_id.to_string(),
                ResourceJson {
                    mime: resource.mime().map(str::to_owned),
                    dark_variant: resource.dark_variant(),
                    equation: resource.equation().map(str::to_owned),
                    data: resource.data().map(|data| STANDARD.encode(data.bytes())),
                },
            )
        })
        .collect();

    let links = scene
        .links()
        .iter()
        .map(|(id, link)| (id.to_string(), link.clone()))
        .collect();

    let (scroll_x, scroll_y) = scene.view().scroll();

    SnapshotJson {
        elements,
        resources,
        links,
        view: ViewJson {
            theme: scene.view().theme().as_str().to_owned(),
            scroll_x,
            scroll_y,
            zoom: scene.view().zoom(),
            style_defaults: scene.view().style_defaults().clone(),
        },
    }
}

#[cfg(test)]
mod tests;
