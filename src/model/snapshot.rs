// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::str::FromStr;

use super::element::Element;

/// Document-wide text presentation mode.
///
/// In `Raw` mode text elements display their stored source form; in
/// `Resolved` mode they display the resolved form while the source form is
/// persisted separately in the container's element-text section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextMode {
    #[default]
    Raw,
    Resolved,
}

impl TextMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for TextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTextModeError {
    pub value: String,
}

impl fmt::Display for ParseTextModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown text mode {:?} (expected raw or resolved)", self.value)
    }
}

impl std::error::Error for ParseTextModeError {}

impl FromStr for TextMode {
    type Err = ParseTextModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "resolved" => Ok(Self::Resolved),
            other => Err(ParseTextModeError {
                value: other.to_owned(),
            }),
        }
    }
}

/// Per-document auto-export preference, recorded in the container header
/// when it overrides the engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportPreference {
    #[default]
    None,
    Svg,
    Png,
    Both,
}

impl ExportPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Both => "both",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    pub fn wants_svg(self) -> bool {
        matches!(self, Self::Svg | Self::Both)
    }

    pub fn wants_png(self) -> bool {
        matches!(self, Self::Png | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value == "dark" {
            Self::Dark
        } else {
            Self::Light
        }
    }

    pub fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }
}

/// Persisted presentation state: theme, viewport and style defaults.
///
/// Style defaults are opaque to the engine, like element geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    theme: Theme,
    scroll_x: f64,
    scroll_y: f64,
    zoom: f64,
    style_defaults: serde_json::Value,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            scroll_x: 0.0,
            scroll_y: 0.0,
            zoom: 1.0,
            style_defaults: serde_json::Value::Null,
        }
    }
}

impl ViewState {
    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn scroll(&self) -> (f64, f64) {
        (self.scroll_x, self.scroll_y)
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        self.scroll_x = x;
        self.scroll_y = y;
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    pub fn style_defaults(&self) -> &serde_json::Value {
        &self.style_defaults
    }

    pub fn set_style_defaults(&mut self, defaults: serde_json::Value) {
        self.style_defaults = defaults;
    }
}

/// Change-detection fingerprint over the visible element set.
///
/// A pure function of the non-deleted elements: the sum of their versions.
/// Cheap to compute, never incremented directly, and stable under pure
/// reordering.
pub fn scene_fingerprint<'a>(elements: impl IntoIterator<Item = &'a Element>) -> u64 {
    elements
        .into_iter()
        .filter(|element| !element.is_deleted())
        .fold(0_u64, |acc, element| acc.wrapping_add(element.version()))
}
