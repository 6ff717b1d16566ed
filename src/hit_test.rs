//! Hit-test resolver
//!
//! Given an image-space point, decide which interactive element is under the
//! pointer. Resolution is a pure function of its inputs:
//!
//! 1. In annotate mode, the selected annotation's delete control and corner
//!    handles win over everything else.
//! 2. Then the topmost (last created) annotation whose box contains the point.
//! 3. In inspect mode, OCR lines and table boxes: direct hits beat near
//!    misses; direct hits prefer the smallest box, near misses the closest
//!    center. The near-miss margin grows as the view zooms out.

use serde::{Deserialize, Serialize};

use crate::annotations::{Annotation, AnnotationId};
use crate::geometry::{BBox, Point, ViewTransform};

/// Minimum near-miss margin in image pixels.
const MIN_MARGIN: f64 = 3.0;
/// Near-miss margin at zoom 1, scaled by `1 / zoom`.
const ZOOM_MARGIN: f64 = 8.0;

/// Whether pointer input edits annotations or inspects extraction results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionMode {
    #[default]
    Inspect,
    Annotate,
}

/// Box corner addressed by a resize handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// What a pointer-down on an annotation will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandleKind {
    Move,
    ResizeTopLeft,
    ResizeTopRight,
    ResizeBottomLeft,
    ResizeBottomRight,
    Delete,
}

impl HandleKind {
    pub fn corner(self) -> Option<Corner> {
        match self {
            Self::ResizeTopLeft => Some(Corner::TopLeft),
            Self::ResizeTopRight => Some(Corner::TopRight),
            Self::ResizeBottomLeft => Some(Corner::BottomLeft),
            Self::ResizeBottomRight => Some(Corner::BottomRight),
            Self::Move | Self::Delete => None,
        }
    }
}

/// Resolved pointer target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HitTarget {
    #[default]
    None,
    OcrLine { index: usize },
    Table { index: usize },
    Annotation { id: AnnotationId, handle: HandleKind },
}

/// Square handle in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionHandle {
    pub kind: HandleKind,
    pub center: Point,
    /// Half the side length, in image pixels.
    pub half_extent: f64,
}

impl SelectionHandle {
    pub fn contains(&self, point: Point) -> bool {
        (point.x - self.center.x).abs() <= self.half_extent
            && (point.y - self.center.y).abs() <= self.half_extent
    }
}

/// Handle geometry for a selected box.
///
/// Sizes are fixed in canvas pixels, so they are converted with the fit
/// scale only and do not change with zoom. The delete control sits outside
/// the box's on-screen top-right corner, whatever the rotation. Both the
/// resolver and the render pass read positions from here.
pub fn selection_handles(
    bbox: BBox,
    view: &ViewTransform,
    handle_px: f64,
) -> Option<Vec<SelectionHandle>> {
    let half_extent = view.canvas_len_to_image(handle_px / 2.0)?;
    let to_canvas = view.image_to_canvas()?;
    let to_image = to_canvas.inverse()?;

    let on_canvas = bbox.map(&to_canvas);
    let delete_canvas = Point::new(on_canvas.x2 + handle_px, on_canvas.y1 - handle_px);

    Some(vec![
        SelectionHandle {
            kind: HandleKind::Delete,
            center: to_image.apply(delete_canvas),
            half_extent: half_extent * 1.6,
        },
        SelectionHandle {
            kind: HandleKind::ResizeTopLeft,
            center: bbox.top_left(),
            half_extent,
        },
        SelectionHandle {
            kind: HandleKind::ResizeTopRight,
            center: bbox.top_right(),
            half_extent,
        },
        SelectionHandle {
            kind: HandleKind::ResizeBottomLeft,
            center: bbox.bottom_left(),
            half_extent,
        },
        SelectionHandle {
            kind: HandleKind::ResizeBottomRight,
            center: bbox.bottom_right(),
            half_extent,
        },
    ])
}

/// Near-miss margin in image pixels for the given zoom.
pub fn near_miss_margin(zoom: f64) -> f64 {
    if zoom <= 0.0 || !zoom.is_finite() {
        return MIN_MARGIN;
    }
    MIN_MARGIN.max(ZOOM_MARGIN / zoom)
}

/// Everything the resolver looks at.
#[derive(Debug, Clone, Copy)]
pub struct HitQuery<'a> {
    /// Pointer position in image space.
    pub point: Point,
    pub mode: InteractionMode,
    /// In z-order, last is topmost.
    pub annotations: &'a [Annotation],
    pub selected: Option<AnnotationId>,
    /// OCR line boxes already mapped into image space.
    pub text_boxes: &'a [BBox],
    pub table_boxes: &'a [BBox],
    pub view: &'a ViewTransform,
    pub handle_px: f64,
}

/// Resolve the target under the pointer.
pub fn resolve(query: &HitQuery<'_>) -> HitTarget {
    match query.mode {
        InteractionMode::Annotate => resolve_annotation(query),
        InteractionMode::Inspect => resolve_result_boxes(
            query.point,
            query.text_boxes,
            query.table_boxes,
            query.view.zoom,
        ),
    }
}

fn resolve_annotation(query: &HitQuery<'_>) -> HitTarget {
    let selected = query
        .selected
        .and_then(|id| query.annotations.iter().find(|a| a.id == id));

    if let Some(annotation) = selected {
        let handles = selection_handles(annotation.bbox, query.view, query.handle_px);
        if let Some(handle) = handles
            .into_iter()
            .flatten()
            .find(|handle| handle.contains(query.point))
        {
            return HitTarget::Annotation {
                id: annotation.id,
                handle: handle.kind,
            };
        }
    }

    query
        .annotations
        .iter()
        .rev()
        .find(|annotation| annotation.bbox.contains(query.point))
        .map(|annotation| HitTarget::Annotation {
            id: annotation.id,
            handle: HandleKind::Move,
        })
        .unwrap_or_default()
}

#[derive(Clone, Copy)]
enum ResultKind {
    Line,
    Table,
}

/// Pick among OCR line and table boxes.
pub fn resolve_result_boxes(
    point: Point,
    text_boxes: &[BBox],
    table_boxes: &[BBox],
    zoom: f64,
) -> HitTarget {
    let margin = near_miss_margin(zoom);
    let candidates = text_boxes
        .iter()
        .enumerate()
        .map(|(index, bbox)| (ResultKind::Line, index, bbox))
        .chain(
            table_boxes
                .iter()
                .enumerate()
                .map(|(index, bbox)| (ResultKind::Table, index, bbox)),
        );

    let mut best_direct: Option<(ResultKind, usize, f64)> = None;
    let mut best_near: Option<(ResultKind, usize, f64)> = None;

    for (kind, index, bbox) in candidates {
        if bbox.contains(point) {
            let area = bbox.area();
            if best_direct.map_or(true, |(_, _, best)| area < best) {
                best_direct = Some((kind, index, area));
            }
        } else if bbox.expand(margin).contains(point) {
            let distance = bbox.center().distance_to(point);
            if best_near.map_or(true, |(_, _, best)| distance < best) {
                best_near = Some((kind, index, distance));
            }
        }
    }

    match best_direct.or(best_near) {
        Some((ResultKind::Line, index, _)) => HitTarget::OcrLine { index },
        Some((ResultKind::Table, index, _)) => HitTarget::Table { index },
        None => HitTarget::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{AnnotationSource, AnnotationType};
    use crate::geometry::{Rotation, Size};

    fn view() -> ViewTransform {
        // Scale 1: canvas pixels equal image pixels.
        ViewTransform::new(Size::new(400.0, 400.0), Size::new(400.0, 400.0))
    }

    fn annotation(bbox: BBox) -> Annotation {
        Annotation::new(AnnotationType::Text, bbox, AnnotationSource::Manual)
    }

    fn query<'a>(
        point: Point,
        annotations: &'a [Annotation],
        selected: Option<AnnotationId>,
        view: &'a ViewTransform,
    ) -> HitQuery<'a> {
        HitQuery {
            point,
            mode: InteractionMode::Annotate,
            annotations,
            selected,
            text_boxes: &[],
            table_boxes: &[],
            view,
            handle_px: 10.0,
        }
    }

    #[test]
    fn smallest_containing_box_wins() {
        let boxes = [
            BBox::new(0.0, 0.0, 40.0, 40.0),
            BBox::new(15.0, 15.0, 25.0, 25.0),
        ];
        let target = resolve_result_boxes(Point::new(20.0, 20.0), &boxes, &[], 1.0);
        assert_eq!(target, HitTarget::OcrLine { index: 1 });
    }

    #[test]
    fn direct_hit_beats_closer_near_miss() {
        let text = [BBox::new(100.0, 100.0, 104.0, 104.0)];
        let tables = [BBox::new(0.0, 0.0, 99.0, 200.0)];
        let target = resolve_result_boxes(Point::new(98.0, 102.0), &text, &tables, 1.0);
        assert_eq!(target, HitTarget::Table { index: 0 });
    }

    #[test]
    fn near_misses_pick_nearest_center() {
        let boxes = [
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(14.0, 0.0, 20.0, 10.0),
        ];
        // Outside both, within the 8px margin of both; closer to the second.
        let target = resolve_result_boxes(Point::new(12.5, 5.0), &boxes, &[], 1.0);
        assert_eq!(target, HitTarget::OcrLine { index: 1 });
    }

    #[test]
    fn margin_grows_when_zoomed_out() {
        assert_eq!(near_miss_margin(1.0), 8.0);
        assert_eq!(near_miss_margin(0.5), 16.0);
        assert_eq!(near_miss_margin(5.0), 3.0);

        let boxes = [BBox::new(0.0, 0.0, 10.0, 10.0)];
        let point = Point::new(22.0, 5.0);
        assert_eq!(resolve_result_boxes(point, &boxes, &[], 1.0), HitTarget::None);
        assert_eq!(
            resolve_result_boxes(point, &boxes, &[], 0.5),
            HitTarget::OcrLine { index: 0 }
        );
    }

    #[test]
    fn topmost_annotation_is_moved() {
        let view = view();
        let annotations = vec![
            annotation(BBox::new(0.0, 0.0, 100.0, 100.0)),
            annotation(BBox::new(50.0, 50.0, 150.0, 150.0)),
        ];
        let target = resolve(&query(Point::new(75.0, 75.0), &annotations, None, &view));
        assert_eq!(
            target,
            HitTarget::Annotation {
                id: annotations[1].id,
                handle: HandleKind::Move,
            }
        );
    }

    #[test]
    fn selected_handles_take_priority_over_bodies() {
        let view = view();
        let annotations = vec![
            annotation(BBox::new(100.0, 100.0, 200.0, 200.0)),
            annotation(BBox::new(90.0, 90.0, 300.0, 300.0)),
        ];
        let selected = annotations[0].id;
        let target = resolve(&query(
            Point::new(102.0, 98.0),
            &annotations,
            Some(selected),
            &view,
        ));
        assert_eq!(
            target,
            HitTarget::Annotation {
                id: selected,
                handle: HandleKind::ResizeTopLeft,
            }
        );
    }

    #[test]
    fn delete_control_sits_outside_visual_top_right() {
        let view = view();
        let annotations = vec![annotation(BBox::new(100.0, 100.0, 200.0, 200.0))];
        let selected = annotations[0].id;
        let target = resolve(&query(
            Point::new(210.0, 90.0),
            &annotations,
            Some(selected),
            &view,
        ));
        assert_eq!(
            target,
            HitTarget::Annotation {
                id: selected,
                handle: HandleKind::Delete,
            }
        );
    }

    #[test]
    fn delete_control_follows_rotation() {
        let mut view = view();
        view.rotation = Rotation::Deg90;
        let bbox = BBox::new(100.0, 100.0, 200.0, 200.0);
        let handles = selection_handles(bbox, &view, 10.0).unwrap();
        let delete = handles
            .iter()
            .find(|h| h.kind == HandleKind::Delete)
            .unwrap();
        // A clockwise quarter turn shows the image's top-left corner at the
        // on-screen top-right, so the control lands beyond x1/y1.
        assert!(delete.center.x < bbox.x1);
        assert!(delete.center.y < bbox.y1);
    }

    #[test]
    fn handle_size_ignores_zoom() {
        let mut view = view();
        let bbox = BBox::new(100.0, 100.0, 200.0, 200.0);
        let at_one = selection_handles(bbox, &view, 10.0).unwrap();
        view.set_zoom(4.0);
        let at_four = selection_handles(bbox, &view, 10.0).unwrap();
        assert_eq!(at_one[1].half_extent, at_four[1].half_extent);
    }

    #[test]
    fn inspect_mode_ignores_annotations() {
        let view = view();
        let annotations = vec![annotation(BBox::new(0.0, 0.0, 100.0, 100.0))];
        let mut q = query(Point::new(50.0, 50.0), &annotations, None, &view);
        q.mode = InteractionMode::Inspect;
        assert_eq!(resolve(&q), HitTarget::None);
    }
}
