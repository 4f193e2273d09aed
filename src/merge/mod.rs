// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Reconciliation of an externally observed document state into the live scene.
//!
//! The merge is additive/overwrite and never deletes based on absence; deletion is communicated
//! explicitly through the deleted-id set. Ordering follows the incoming sequence: a replaced or
//! inserted element is placed right after its incoming predecessor's current local position, so
//! the layer order stays globally consistent even when only a subset of elements changed.

use std::collections::BTreeSet;

use log::debug;

use crate::model::{Element, ElementId};
use crate::scene::Scene;

/// What a reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The merged state carries net-new content beyond the incoming
    /// snapshot; a save must propagate it outward so the two sides
    /// converge instead of silently diverging.
    pub dirty: bool,
    /// Resource bindings were adopted; referencing elements need a load
    /// pass to materialize them.
    pub resources_changed: bool,
}

/// Merges `incoming` into `local`, element by element.
///
/// Local elements win unless the incoming element has a strictly higher
/// version, or an equal version with different content (competing writes are
/// resolved in favor of the external source). Local elements absent from
/// `incoming` are left as-is; ids in `deleted_ids` are dropped from the
/// local sequence before the walk.
pub fn reconcile(
    local: &mut Scene,
    incoming: &Scene,
    deleted_ids: &BTreeSet<ElementId>,
) -> MergeOutcome {
    let mut elements: Vec<Element> = local
        .elements()
        .iter()
        .filter(|element| !deleted_ids.contains(element.id()))
        .cloned()
        .collect();
    let mut ids: Vec<ElementId> = elements.iter().map(|element| element.id().clone()).collect();

    let mut resources_changed = false;
    let incoming_elements = incoming.elements();

    for (index, incoming_element) in incoming_elements.iter().enumerate() {
        let current = ids.iter().position(|id| id == incoming_element.id());

        match current {
            Some(current) => {
                let local_element = &elements[current];
                let incoming_wins = incoming_element.version() > local_element.version()
                    || (incoming_element.version() == local_element.version()
                        && local_element != incoming_element);

                if incoming_wins {
                    carry_bindings(local, incoming, incoming_element, &mut resources_changed);

                    elements.remove(current);
                    ids.remove(current);

                    let insert_at = insert_position(&ids, incoming_elements, index);
                    elements.insert(insert_at, incoming_element.clone());
                    ids.insert(insert_at, incoming_element.id().clone());
                } else if incoming_element.is_image() {
                    // The resource may have synced in before the element's own
                    // version advanced; adopt the binding without touching the
                    // locally newer element state.
                    if let Some(file_id) = incoming_element.file_id() {
                        if !local.resources().contains_key(file_id.as_str()) {
                            if let Some(resource) = incoming.resources().get(file_id.as_str()) {
                                local.resources_mut().insert(file_id.clone(), resource.clone());
                                resources_changed = true;
                            }
                        }
                    }
                }
            }
            None => {
                carry_bindings(local, incoming, incoming_element, &mut resources_changed);

                let insert_at = insert_position(&ids, incoming_elements, index);
                elements.insert(insert_at, incoming_element.clone());
                ids.insert(insert_at, incoming_element.id().clone());
            }
        }
    }

    local.set_elements(elements);

    let merged_fingerprint = local.fingerprint();
    let incoming_fingerprint = incoming.fingerprint();
    let dirty = merged_fingerprint != incoming_fingerprint;
    if dirty {
        debug!(
            "merge left local content beyond incoming snapshot \
             (local={merged_fingerprint}, incoming={incoming_fingerprint})"
        );
    }

    MergeOutcome {
        dirty,
        resources_changed,
    }
}

/// Position for an incoming element: pinned to 0 for the first incoming
/// element, otherwise right after its incoming predecessor's current local
/// position (or 0 when the predecessor is unknown locally).
fn insert_position(ids: &[ElementId], incoming_elements: &[Element], index: usize) -> usize {
    if index == 0 {
        return 0;
    }
    let prev_id = incoming_elements[index - 1].id();
    ids.iter().position(|id| id == prev_id).map_or(0, |p| p + 1)
}

/// Carries the incoming element's auxiliary bindings into the local scene:
/// resource/equation entries for image elements and the raw link binding.
/// Text bindings travel inside the element itself.
fn carry_bindings(
    local: &mut Scene,
    incoming: &Scene,
    incoming_element: &Element,
    resources_changed: &mut bool,
) {
    if incoming_element.is_image() {
        if let Some(file_id) = incoming_element.file_id() {
            if let Some(resource) = incoming.resources().get(file_id.as_str()) {
                let changed = local.resources().get(file_id.as_str()) != Some(resource);
                if changed {
                    local.resources_mut().insert(file_id.clone(), resource.clone());
                    *resources_changed = true;
                }
            }
        }
    }

    if let Some(link) = incoming.links().get(incoming_element.id().as_str()) {
        local
            .links_mut()
            .insert(incoming_element.id().clone(), link.clone());
    }
}
