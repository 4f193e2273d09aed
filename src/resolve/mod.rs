// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Text-mode codec: raw source text to resolved display text.
//!
//! Resolution is a pure function of the raw text plus the resolution context (text mode and the
//! reference cache). It is called at defined points only: on text commit, on mode switch, and
//! after an external merge.
//!
//! `[[target]]` and `[[target|alias]]` references resolve synchronously. `![[target]]` embeds
//! require the referenced document's content; when the target is not cached the fast path yields
//! [`QuickResolve::NeedsAsync`] and the caller schedules the slow path.

use std::sync::OnceLock;

use log::warn;
use regex::{Captures, Regex};

use crate::host::ReferenceSource;
use crate::model::{ElementId, TextMode};
use crate::scene::Scene;

/// Serialized diagram-clipboard payloads are refused as element text: a
/// paste that misidentifies structured drawing data as plain text would
/// otherwise store the whole serialized scene inside one text element.
pub const CLIPBOARD_SIGNATURE: &str = "{\"kind\":\"proteus/clipboard\"";

/// Placeholder substituted when a clipboard payload is refused.
pub const CLIPBOARD_PLACEHOLDER: &str = "Pasted drawing data cannot be shown as text";

/// State of a reference target in the synchronous cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedTarget {
    /// Target known, content available.
    Hit(String),
    /// Target known to not exist.
    Missing,
    /// Not looked up yet; resolution needs the asynchronous path.
    Unknown,
}

/// Outcome of the synchronous resolution fast path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickResolve {
    Resolved(String),
    NeedsAsync,
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(!)?\[\[([^\[\]|]+?)(?:\|([^\[\]]+?))?\]\]").expect("reference regex compiles")
    })
}

/// Best-effort synchronous resolution.
///
/// Returns [`QuickResolve::NeedsAsync`] when the text contains an embed
/// reference whose target has not been looked up yet.
pub fn quick_resolve(raw: &str, source: &dyn ReferenceSource) -> QuickResolve {
    if is_clipboard_payload(raw) {
        warn!("refusing to resolve serialized clipboard payload as element text");
        return QuickResolve::Resolved(CLIPBOARD_PLACEHOLDER.to_owned());
    }

    let mut needs_async = false;
    let resolved = reference_regex().replace_all(raw, |capture: &Captures<'_>| {
        let target = capture.get(2).map_or("", |m| m.as_str());
        let alias = capture.get(3).map(|m| m.as_str());
        let embed = capture.get(1).is_some();

        if embed {
            match source.cached_target(target) {
                CachedTarget::Hit(content) => content,
                CachedTarget::Missing => target.to_owned(),
                CachedTarget::Unknown => {
                    needs_async = true;
                    String::new()
                }
            }
        } else {
            alias.unwrap_or(target).to_owned()
        }
    });

    if needs_async {
        QuickResolve::NeedsAsync
    } else {
        QuickResolve::Resolved(resolved.into_owned())
    }
}

/// Full resolution, suspending on uncached embed targets.
///
/// Callers must re-fetch the element by id after this returns (the scene
/// may have been mutated while the lookup was suspended) and must request
/// an undo-history clear before applying the result.
pub async fn resolve_text(raw: &str, source: &dyn ReferenceSource) -> String {
    if is_clipboard_payload(raw) {
        warn!("refusing to resolve serialized clipboard payload as element text");
        return CLIPBOARD_PLACEHOLDER.to_owned();
    }

    // regex::replace_all cannot await inside the replacer, so walk matches
    // manually and stitch the output together.
    let mut out = String::with_capacity(raw.len());
    let mut cursor = 0;
    for capture in reference_regex().captures_iter(raw) {
        let whole = capture.get(0).expect("capture 0 is the whole match");
        out.push_str(&raw[cursor..whole.start()]);
        cursor = whole.end();

        let target = capture.get(2).map_or("", |m| m.as_str());
        let alias = capture.get(3).map(|m| m.as_str());
        let embed = capture.get(1).is_some();

        if embed {
            match source.cached_target(target) {
                CachedTarget::Hit(content) => out.push_str(&content),
                CachedTarget::Missing => out.push_str(target),
                CachedTarget::Unknown => match source.resolve_target(target).await {
                    Some(content) => out.push_str(&content),
                    None => out.push_str(target),
                },
            }
        } else {
            out.push_str(alias.unwrap_or(target));
        }
    }
    out.push_str(&raw[cursor..]);
    out
}

/// Returns the target of the first reference in the text, used to mirror a
/// resolved reference into the element's link attribute for single-click
/// navigation.
pub fn extract_first_link(text: &str) -> Option<String> {
    reference_regex()
        .captures(text)
        .and_then(|capture| capture.get(2))
        .map(|m| m.as_str().to_owned())
}

fn is_clipboard_payload(raw: &str) -> bool {
    raw.trim_start().starts_with(CLIPBOARD_SIGNATURE)
}

/// Re-derives every text element's display text for the given mode without
/// mutating raw text. Returns the ids of elements that need the
/// asynchronous path; their display text is left untouched until it runs.
pub fn apply_text_mode(
    scene: &mut Scene,
    mode: TextMode,
    source: &dyn ReferenceSource,
) -> Vec<ElementId> {
    scene.set_text_mode(mode);
    let mut pending = Vec::new();

    let ids: Vec<ElementId> = scene
        .elements()
        .iter()
        .filter(|element| element.is_text())
        .map(|element| element.id().clone())
        .collect();

    for id in ids {
        let Some(element) = scene.get_mut(&id) else {
            continue;
        };
        let Some(text) = element.text() else {
            continue;
        };
        let raw = text.raw().to_owned();

        let display = match mode {
            TextMode::Raw => raw.clone(),
            TextMode::Resolved => match quick_resolve(&raw, source) {
                QuickResolve::Resolved(display) => display,
                QuickResolve::NeedsAsync => {
                    pending.push(id);
                    continue;
                }
            },
        };

        let link = extract_first_link(&raw);
        if element.text().map(|t| t.display()) != Some(display.as_str()) {
            if let Some(text) = element.text_mut() {
                text.set_display(display);
            }
            element.set_link(link);
            element.bump_version();
        } else {
            element.set_link(link);
        }
    }

    pending
}
