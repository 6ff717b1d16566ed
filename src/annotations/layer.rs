//! Per-page annotation list
//!
//! Every mutation builds a new list and swaps it in, bumping the revision.
//! Callers never observe a half-applied change, and the revision is all the
//! render cache needs for change detection.

use crate::geometry::BBox;

use super::types::{Annotation, AnnotationId, AnnotationSource, AnnotationType};

#[derive(Debug, Clone, Default)]
pub struct AnnotationLayer {
    annotations: Vec<Annotation>,
    selected: Option<AnnotationId>,
    revision: u64,
}

impl AnnotationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotations in z-order (last is topmost).
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id == id)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected
    }

    /// Select one annotation (or none). Unknown ids are ignored.
    pub fn select(&mut self, id: Option<AnnotationId>) -> bool {
        if let Some(id) = id {
            if self.get(id).is_none() {
                return false;
            }
        }
        if self.selected != id {
            self.selected = id;
            self.revision += 1;
        }
        true
    }

    /// Append an annotation on top of the others.
    pub fn push(&mut self, annotation: Annotation) -> AnnotationId {
        let id = annotation.id;
        let mut next = self.annotations.clone();
        next.push(annotation);
        self.replace(next);
        id
    }

    /// Wrap detected table boxes into pending TABLE annotations.
    ///
    /// Existing annotations are kept as they are.
    pub fn append_detected_tables(&mut self, boxes: &[BBox]) -> Vec<AnnotationId> {
        if boxes.is_empty() {
            return Vec::new();
        }
        let created: Vec<Annotation> = boxes
            .iter()
            .map(|bbox| Annotation::new(AnnotationType::Table, *bbox, AnnotationSource::AutoDetected))
            .collect();
        let ids = created.iter().map(|annotation| annotation.id).collect();
        let mut next = self.annotations.clone();
        next.extend(created);
        self.replace(next);
        ids
    }

    /// Apply `change` to one annotation. Returns `false` for an unknown id.
    pub fn update(&mut self, id: AnnotationId, change: impl FnOnce(&mut Annotation)) -> bool {
        let Some(index) = self.annotations.iter().position(|a| a.id == id) else {
            return false;
        };
        let mut next = self.annotations.clone();
        change(&mut next[index]);
        self.replace(next);
        true
    }

    pub fn set_bbox(&mut self, id: AnnotationId, bbox: BBox) -> bool {
        self.update(id, |annotation| annotation.bbox = bbox)
    }

    /// Remove an annotation, clearing the selection if it pointed at it.
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let index = self.annotations.iter().position(|a| a.id == id)?;
        let mut next = self.annotations.clone();
        let removed = next.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.replace(next);
        Some(removed)
    }

    pub fn pending_ids(&self) -> Vec<AnnotationId> {
        self.annotations
            .iter()
            .filter(|annotation| annotation.is_pending())
            .map(|annotation| annotation.id)
            .collect()
    }

    fn replace(&mut self, next: Vec<Annotation>) {
        self.annotations = next;
        self.revision += 1;
    }
}
