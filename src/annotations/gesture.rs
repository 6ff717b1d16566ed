//! Pointer gesture state machine
//!
//! One gesture per pointer-down/up pair:
//!
//! - `Idle` -> `Drawing` on empty space; commits a new pending annotation
//!   on release if the box is at least the minimum size.
//! - `Idle` -> `Moving` on an annotation body; the cumulative pointer delta
//!   is added to the initial box.
//! - `Idle` -> `Resizing` on a corner handle; the dragged corner is clamped
//!   against the opposite one so the box never inverts.
//! - Delete handle removes the annotation immediately.
//! - Pointer-leave cancels any gesture without committing and keeps the
//!   selection.
//!
//! Moves and resizes are previewed from the gesture itself and only written
//! to the layer on release.

use serde::Serialize;

use crate::geometry::{BBox, Point};
use crate::hit_test::{Corner, HandleKind, HitTarget};

use super::layer::AnnotationLayer;
use super::types::{Annotation, AnnotationId, AnnotationSource, AnnotationType};

/// Default minimum committed annotation side, in image pixels.
pub const MIN_ANNOTATION_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    Drawing {
        start: Point,
        current: Point,
    },
    Moving {
        id: AnnotationId,
        origin: Point,
        initial: BBox,
        current: BBox,
    },
    Resizing {
        id: AnnotationId,
        corner: Corner,
        origin: Point,
        initial: BBox,
        current: BBox,
    },
}

/// What a pointer event did to the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum GestureOutcome {
    Ignored,
    Started,
    Updated,
    Created { id: AnnotationId },
    Discarded,
    Moved { id: AnnotationId },
    Resized { id: AnnotationId },
    Deleted { id: AnnotationId },
    Cancelled,
}

/// Rules a gesture commits under.
#[derive(Debug, Clone, Copy)]
pub struct GestureRules {
    /// Type given to newly drawn annotations.
    pub armed: AnnotationType,
    /// Minimum width and height of a drawn box.
    pub min_size: f64,
}

impl Default for GestureRules {
    fn default() -> Self {
        Self {
            armed: AnnotationType::Text,
            min_size: MIN_ANNOTATION_SIZE,
        }
    }
}

/// Move one corner of `initial` to `target`, clamped against the opposite corner.
pub fn resize_from_corner(initial: BBox, corner: Corner, target: Point) -> BBox {
    let BBox { x1, y1, x2, y2 } = initial;
    let (x1, y1, x2, y2) = match corner {
        Corner::TopLeft => (target.x.min(x2), target.y.min(y2), x2, y2),
        Corner::TopRight => (x1, target.y.min(y2), target.x.max(x1), y2),
        Corner::BottomLeft => (target.x.min(x2), y1, x2, target.y.max(y1)),
        Corner::BottomRight => (x1, y1, target.x.max(x1), target.y.max(y1)),
    };
    BBox { x1, y1, x2, y2 }
}

fn corner_point(bbox: BBox, corner: Corner) -> Point {
    match corner {
        Corner::TopLeft => bbox.top_left(),
        Corner::TopRight => bbox.top_right(),
        Corner::BottomLeft => bbox.bottom_left(),
        Corner::BottomRight => bbox.bottom_right(),
    }
}

impl Gesture {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Box being drawn, or the live box of the annotation being adjusted.
    pub fn preview(&self) -> Option<(Option<AnnotationId>, BBox)> {
        match *self {
            Self::Idle => None,
            Self::Drawing { start, current } => Some((None, BBox::from_points(start, current))),
            Self::Moving { id, current, .. } | Self::Resizing { id, current, .. } => {
                Some((Some(id), current))
            }
        }
    }

    /// Id of the annotation currently being moved or resized.
    pub fn adjusting(&self) -> Option<AnnotationId> {
        match self {
            Self::Moving { id, .. } | Self::Resizing { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Start a gesture at `point` on whatever the resolver found there.
    pub fn pointer_down(
        &mut self,
        point: Point,
        target: HitTarget,
        layer: &mut AnnotationLayer,
    ) -> GestureOutcome {
        if self.is_active() {
            // A second button press mid-gesture is ignored.
            return GestureOutcome::Ignored;
        }

        match target {
            HitTarget::Annotation { id, handle } => {
                let Some(initial) = layer.get(id).map(|annotation| annotation.bbox) else {
                    return GestureOutcome::Ignored;
                };
                match handle {
                    HandleKind::Delete => {
                        layer.remove(id);
                        tracing::debug!(annotation_id = %id, "Deleted annotation");
                        GestureOutcome::Deleted { id }
                    }
                    HandleKind::Move => {
                        layer.select(Some(id));
                        *self = Self::Moving {
                            id,
                            origin: point,
                            initial,
                            current: initial,
                        };
                        GestureOutcome::Started
                    }
                    resize => {
                        let Some(corner) = resize.corner() else {
                            return GestureOutcome::Ignored;
                        };
                        layer.select(Some(id));
                        *self = Self::Resizing {
                            id,
                            corner,
                            origin: point,
                            initial,
                            current: initial,
                        };
                        GestureOutcome::Started
                    }
                }
            }
            HitTarget::None | HitTarget::OcrLine { .. } | HitTarget::Table { .. } => {
                layer.select(None);
                *self = Self::Drawing {
                    start: point,
                    current: point,
                };
                GestureOutcome::Started
            }
        }
    }

    pub fn pointer_move(&mut self, point: Point) -> GestureOutcome {
        match self {
            Self::Idle => GestureOutcome::Ignored,
            Self::Drawing { current, .. } => {
                *current = point;
                GestureOutcome::Updated
            }
            Self::Moving {
                origin,
                initial,
                current,
                ..
            } => {
                *current = initial.translate(origin.delta_to(point));
                GestureOutcome::Updated
            }
            Self::Resizing {
                corner,
                origin,
                initial,
                current,
                ..
            } => {
                let delta = origin.delta_to(point);
                let start = corner_point(*initial, *corner);
                let target = Point::new(start.x + delta.x, start.y + delta.y);
                *current = resize_from_corner(*initial, *corner, target);
                GestureOutcome::Updated
            }
        }
    }

    /// Finish the gesture and commit its effect to `layer`.
    pub fn pointer_up(
        &mut self,
        point: Point,
        layer: &mut AnnotationLayer,
        rules: GestureRules,
    ) -> GestureOutcome {
        self.pointer_move(point);
        let finished = std::mem::take(self);

        match finished {
            Self::Idle => GestureOutcome::Ignored,
            Self::Drawing { start, current } => {
                let bbox = BBox::from_points(start, current);
                if bbox.width() < rules.min_size || bbox.height() < rules.min_size {
                    tracing::debug!(
                        width = bbox.width(),
                        height = bbox.height(),
                        min_size = rules.min_size,
                        "Discarded drawn box below minimum size"
                    );
                    return GestureOutcome::Discarded;
                }
                let annotation = Annotation::new(rules.armed, bbox, AnnotationSource::Manual);
                let id = layer.push(annotation);
                layer.select(Some(id));
                tracing::debug!(
                    annotation_id = %id,
                    annotation_type = rules.armed.as_str(),
                    ?bbox,
                    "Created annotation"
                );
                GestureOutcome::Created { id }
            }
            Self::Moving {
                id,
                initial,
                current,
                ..
            } => {
                if current != initial {
                    layer.set_bbox(id, current);
                }
                GestureOutcome::Moved { id }
            }
            Self::Resizing {
                id,
                initial,
                current,
                ..
            } => {
                if current != initial {
                    layer.set_bbox(id, current);
                }
                GestureOutcome::Resized { id }
            }
        }
    }

    /// Pointer left the canvas: drop the gesture, keep the selection.
    pub fn pointer_leave(&mut self) -> GestureOutcome {
        if std::mem::take(self).is_active() {
            GestureOutcome::Cancelled
        } else {
            GestureOutcome::Ignored
        }
    }
}
