// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The in-memory element store.
//!
//! A `Scene` owns the ordered element sequence (including soft-deleted elements), the embedded
//! resource map, and the per-element raw link bindings. It is purely in-memory; persistence goes
//! through the container codec and the document engine.

use std::collections::BTreeMap;

use log::debug;

use crate::model::{
    scene_fingerprint, Element, ElementId, EmbeddedResource, FileId, TextMode, ViewState,
};

/// Ordered element store plus auxiliary binding maps.
///
/// The scene is the exclusive owner of element identity. Asynchronous tasks
/// must not hold references across suspension points; they re-fetch by id
/// through [`Scene::get`] after every await.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    elements: Vec<Element>,
    resources: BTreeMap<FileId, EmbeddedResource>,
    links: BTreeMap<ElementId, String>,
    view: ViewState,
    text_mode: TextMode,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|element| element.id() == id)
    }

    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|element| element.id() == id)
    }

    pub fn position_of(&self, id: &ElementId) -> Option<usize> {
        self.elements.iter().position(|element| element.id() == id)
    }

    /// Inserts or replaces the element with the same id, keeping its current
    /// position; new elements append at the top of the layer order.
    pub fn upsert(&mut self, element: Element) {
        match self.position_of(element.id()) {
            Some(position) => self.elements[position] = element,
            None => self.elements.push(element),
        }
    }

    /// Marks the element as deleted without removing it from the sequence.
    ///
    /// Soft-deleted elements stay in the serialized document so concurrent
    /// external writers can observe the deletion instead of resurrecting the
    /// element on the next merge.
    pub fn remove(&mut self, id: &ElementId) -> bool {
        match self.get_mut(id) {
            Some(element) => {
                if !element.is_deleted() {
                    element.set_deleted(true);
                    element.bump_version();
                    debug!("soft-deleted element {id}");
                }
                true
            }
            None => false,
        }
    }

    /// The visible element sequence, in layer order.
    pub fn ordered_live(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|element| !element.is_deleted())
    }

    /// All elements including soft-deleted ones, in layer order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut Vec<Element> {
        &mut self.elements
    }

    pub fn set_elements(&mut self, elements: Vec<Element>) {
        self.elements = elements;
    }

    pub fn fingerprint(&self) -> u64 {
        scene_fingerprint(self.elements.iter())
    }

    pub fn resources(&self) -> &BTreeMap<FileId, EmbeddedResource> {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut BTreeMap<FileId, EmbeddedResource> {
        &mut self.resources
    }

    /// Raw link source per element; the resolved form lives on the element
    /// itself as [`Element::link`].
    pub fn links(&self) -> &BTreeMap<ElementId, String> {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut BTreeMap<ElementId, String> {
        &mut self.links
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn text_mode(&self) -> TextMode {
        self.text_mode
    }

    pub fn set_text_mode(&mut self, mode: TextMode) {
        self.text_mode = mode;
    }

    /// Registers resources for every image element whose file id has no
    /// entry yet. Returns the ids of resources that are not materialized.
    pub fn discover_resources(&mut self) -> Vec<FileId> {
        let wanted = self
            .elements
            .iter()
            .filter(|element| element.is_image() && !element.is_deleted())
            .filter_map(|element| element.file_id().cloned())
            .collect::<Vec<_>>();

        for file_id in &wanted {
            self.resources
                .entry(file_id.clone())
                .or_insert_with(|| EmbeddedResource::new_file(file_id.clone()));
        }

        self.resources
            .values()
            .filter(|resource| !resource.is_loaded())
            .map(|resource| resource.file_id().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Scene;
    use crate::model::fixtures::{eid, image, shape};

    #[test]
    fn upsert_keeps_position_on_replace_and_appends_new() {
        let mut scene = Scene::new();
        scene.upsert(shape("a", 1));
        scene.upsert(shape("b", 1));

        let mut replacement = shape("a", 2);
        replacement.set_deleted(false);
        scene.upsert(replacement);

        let order: Vec<_> = scene.elements().iter().map(|e| e.id().as_str().to_owned()).collect();
        assert_eq!(order, ["a", "b"]);
        assert_eq!(scene.get(&eid("a")).unwrap().version(), 2);
    }

    #[test]
    fn remove_soft_deletes_and_bumps_version() {
        let mut scene = Scene::new();
        scene.upsert(shape("a", 1));

        assert!(scene.remove(&eid("a")));
        let element = scene.get(&eid("a")).unwrap();
        assert!(element.is_deleted());
        assert_eq!(element.version(), 2);

        // still present in the full sequence, absent from the live view
        assert_eq!(scene.elements().len(), 1);
        assert_eq!(scene.ordered_live().count(), 0);
        assert!(!scene.remove(&eid("missing")));
    }

    #[test]
    fn fingerprint_reflects_visible_mutations() {
        let mut scene = Scene::new();
        scene.upsert(shape("a", 1));
        scene.upsert(shape("b", 1));
        let before = scene.fingerprint();

        let mut updated = shape("a", 2);
        updated.set_deleted(false);
        scene.upsert(updated);
        assert_ne!(scene.fingerprint(), before);
    }

    #[test]
    fn discover_resources_registers_unloaded_entries() {
        let mut scene = Scene::new();
        scene.upsert(image("img1", 1, "f1"));
        scene.upsert(image("img2", 1, "f2"));

        let unresolved = scene.discover_resources();
        assert_eq!(unresolved.len(), 2);
        assert!(scene.resources().contains_key("f1"));
        assert!(scene.resources().contains_key("f2"));
    }
}
