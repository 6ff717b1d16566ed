//! Render Pass
//!
//! Paints one viewport frame from viewer state. `render` is a pure function:
//! the same scene always produces the same pixels, and it never mutates
//! anything but the pixmap it returns.
//!
//! Paint order:
//!
//! 1. background and base image (fit, rotation, zoom and pan in one affine)
//! 2. OCR line and table boxes, inspect mode only
//! 3. committed annotations, colored by type, with a status glyph each;
//!    the selected one dashed and thicker with handles and a delete glyph
//! 4. the box being drawn, dashed in the armed type's color
//!
//! Boxes are mapped to screen space before stroking so line widths stay
//! constant at any zoom.

mod cache;
mod crop;
mod raster;

pub use cache::{FrameKey, RenderCache};
pub use crop::{crop_for_extraction, Crop};
pub use raster::PageRaster;

use tiny_skia::{
    Color, FillRule, FilterQuality, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke,
    StrokeDash, Transform,
};

use crate::annotations::{Annotation, AnnotationId, AnnotationType, Gesture, ProcessingStatus};
use crate::geometry::{Affine, BBox, Point, ViewTransform};
use crate::hit_test::{selection_handles, HandleKind, HitTarget, InteractionMode};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to decode page image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Cannot allocate a {width}x{height} pixmap")]
    Allocation { width: u32, height: u32 },

    #[error("Crop {bbox:?} lies outside the page image")]
    EmptyCrop { bbox: [i64; 4] },
}

type Rgba = [u8; 4];

const BACKGROUND: Rgba = [229, 231, 235, 255];
const OCR_LINE: Rgba = [59, 130, 246, 170];
const TABLE_BOX: Rgba = [16, 185, 129, 200];
const HIGHLIGHT_FILL: Rgba = [250, 204, 21, 70];
const HANDLE_FILL: Rgba = [255, 255, 255, 255];
const DELETE_FILL: Rgba = [220, 38, 38, 255];
const GLYPH_INK: Rgba = [255, 255, 255, 255];

const LINE_WIDTH: f32 = 1.0;
const ANNOTATION_WIDTH: f32 = 2.0;
const SELECTED_WIDTH: f32 = 3.0;
const GLYPH_RADIUS: f32 = 6.0;

fn type_color(annotation_type: AnnotationType) -> Rgba {
    match annotation_type {
        AnnotationType::Text => [37, 99, 235, 255],
        AnnotationType::Table => [22, 163, 74, 255],
        AnnotationType::Diagram => [147, 51, 234, 255],
    }
}

fn status_color(status: ProcessingStatus) -> Rgba {
    match status {
        ProcessingStatus::Pending => [107, 114, 128, 255],
        ProcessingStatus::Processing => [245, 158, 11, 255],
        ProcessingStatus::Processed => [22, 163, 74, 255],
        ProcessingStatus::ProcessedWithError => [220, 38, 38, 255],
    }
}

/// Everything one frame depends on.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub raster: &'a PageRaster,
    pub view: ViewTransform,
    pub mode: InteractionMode,
    /// OCR line boxes in image space.
    pub text_boxes: &'a [BBox],
    pub table_boxes: &'a [BBox],
    pub annotations: &'a [Annotation],
    pub selected: Option<AnnotationId>,
    pub hover: HitTarget,
    /// OCR line or table picked in inspect mode.
    pub inspected: HitTarget,
    pub gesture: Gesture,
    pub armed: AnnotationType,
    pub handle_px: f64,
}

/// Paint the viewport. `None` until the container has a size.
pub fn render(scene: &Scene<'_>) -> Option<Pixmap> {
    let to_screen = scene.view.image_to_screen()?;
    let width = scene.view.container.width.ceil() as u32;
    let height = scene.view.container.height.ceil() as u32;
    let mut pixmap = Pixmap::new(width, height)?;

    pixmap.fill(color(BACKGROUND));
    pixmap.draw_pixmap(
        0,
        0,
        scene.raster.pixmap().as_ref(),
        &PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        },
        skia_transform(&to_screen),
        None,
    );

    if scene.mode == InteractionMode::Inspect {
        draw_result_boxes(&mut pixmap, scene, &to_screen);
    }

    for annotation in scene.annotations {
        let bbox = live_bbox(annotation, &scene.gesture);
        let selected = scene.selected == Some(annotation.id);
        draw_annotation(&mut pixmap, annotation, bbox, selected, &to_screen);
    }

    if scene.mode == InteractionMode::Annotate {
        if let Some(selected) = scene.selected.and_then(|id| find(scene.annotations, id)) {
            let bbox = live_bbox(selected, &scene.gesture);
            draw_handles(&mut pixmap, selected.annotation_type, bbox, scene, &to_screen);
        }
    }

    if let Gesture::Drawing { start, current } = scene.gesture {
        let preview = BBox::from_points(start, current);
        if let Some(path) = screen_quad(preview, &to_screen) {
            stroke(&mut pixmap, &path, type_color(scene.armed), ANNOTATION_WIDTH, true);
        }
    }

    Some(pixmap)
}

/// Render and PNG-encode in one step.
pub fn render_png(scene: &Scene<'_>) -> Result<Option<Vec<u8>>, RenderError> {
    match render(scene) {
        Some(pixmap) => pixmap
            .encode_png()
            .map(Some)
            .map_err(|e| RenderError::Encode(e.to_string())),
        None => Ok(None),
    }
}

fn find(annotations: &[Annotation], id: AnnotationId) -> Option<&Annotation> {
    annotations.iter().find(|annotation| annotation.id == id)
}

/// Box to draw: the gesture preview while it is being moved or resized.
fn live_bbox(annotation: &Annotation, gesture: &Gesture) -> BBox {
    match gesture.preview() {
        Some((Some(id), bbox)) if id == annotation.id => bbox,
        _ => annotation.bbox,
    }
}

fn draw_result_boxes(pixmap: &mut Pixmap, scene: &Scene<'_>, to_screen: &Affine) {
    let highlighted = |target: HitTarget| target == scene.hover || target == scene.inspected;

    for (index, bbox) in scene.text_boxes.iter().enumerate() {
        let Some(path) = screen_quad(*bbox, to_screen) else {
            continue;
        };
        if highlighted(HitTarget::OcrLine { index }) {
            fill(pixmap, &path, HIGHLIGHT_FILL);
        }
        stroke(pixmap, &path, OCR_LINE, LINE_WIDTH, false);
    }

    for (index, bbox) in scene.table_boxes.iter().enumerate() {
        let Some(path) = screen_quad(*bbox, to_screen) else {
            continue;
        };
        if highlighted(HitTarget::Table { index }) {
            fill(pixmap, &path, HIGHLIGHT_FILL);
        }
        stroke(pixmap, &path, TABLE_BOX, ANNOTATION_WIDTH, false);
    }
}

fn draw_annotation(
    pixmap: &mut Pixmap,
    annotation: &Annotation,
    bbox: BBox,
    selected: bool,
    to_screen: &Affine,
) {
    let Some(path) = screen_quad(bbox, to_screen) else {
        return;
    };
    let [r, g, b, _] = type_color(annotation.annotation_type);
    fill(pixmap, &path, [r, g, b, 36]);
    let width = if selected { SELECTED_WIDTH } else { ANNOTATION_WIDTH };
    stroke(pixmap, &path, [r, g, b, 255], width, selected);

    let anchor = visual_top_left(bbox, to_screen);
    draw_status_glyph(pixmap, annotation.status, anchor);
}

/// Screen point of the box corner that appears top-left after rotation.
fn visual_top_left(bbox: BBox, to_screen: &Affine) -> Point {
    let corners = [
        bbox.top_left(),
        bbox.top_right(),
        bbox.bottom_left(),
        bbox.bottom_right(),
    ]
    .map(|corner| to_screen.apply(corner));
    let x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    Point::new(x, y)
}

fn draw_status_glyph(pixmap: &mut Pixmap, status: ProcessingStatus, anchor: Point) {
    let cx = anchor.x as f32 + GLYPH_RADIUS + 2.0;
    let cy = anchor.y as f32 + GLYPH_RADIUS + 2.0;
    let Some(circle) = PathBuilder::from_circle(cx, cy, GLYPH_RADIUS) else {
        return;
    };
    let ink = status_color(status);

    match status {
        ProcessingStatus::Pending => {
            fill(pixmap, &circle, HANDLE_FILL);
            stroke(pixmap, &circle, ink, 1.5, false);
        }
        ProcessingStatus::Processing => {
            fill(pixmap, &circle, ink);
            if let Some(dot) = PathBuilder::from_circle(cx, cy, GLYPH_RADIUS / 3.0) {
                fill(pixmap, &dot, GLYPH_INK);
            }
        }
        ProcessingStatus::Processed => {
            fill(pixmap, &circle, ink);
            let r = GLYPH_RADIUS;
            let tick = polyline(&[
                (cx - r * 0.5, cy),
                (cx - r * 0.1, cy + r * 0.4),
                (cx + r * 0.5, cy - r * 0.4),
            ]);
            if let Some(tick) = tick {
                stroke(pixmap, &tick, GLYPH_INK, 1.5, false);
            }
        }
        ProcessingStatus::ProcessedWithError => {
            fill(pixmap, &circle, ink);
            draw_cross(pixmap, cx, cy, GLYPH_RADIUS * 0.45);
        }
    }
}

fn draw_cross(pixmap: &mut Pixmap, cx: f32, cy: f32, arm: f32) {
    let lines = [
        polyline(&[(cx - arm, cy - arm), (cx + arm, cy + arm)]),
        polyline(&[(cx - arm, cy + arm), (cx + arm, cy - arm)]),
    ];
    for line in lines.iter().flatten() {
        stroke(pixmap, line, GLYPH_INK, 1.5, false);
    }
}

fn draw_handles(
    pixmap: &mut Pixmap,
    annotation_type: AnnotationType,
    bbox: BBox,
    scene: &Scene<'_>,
    to_screen: &Affine,
) {
    let Some(handles) = selection_handles(bbox, &scene.view, scene.handle_px) else {
        return;
    };
    let scale = to_screen.length_scale();
    let ink = type_color(annotation_type);

    for handle in handles {
        let center = to_screen.apply(handle.center);
        let half = (handle.half_extent * scale) as f32;
        let (cx, cy) = (center.x as f32, center.y as f32);

        if handle.kind == HandleKind::Delete {
            if let Some(circle) = PathBuilder::from_circle(cx, cy, half) {
                fill(pixmap, &circle, DELETE_FILL);
                draw_cross(pixmap, cx, cy, half * 0.45);
            }
            continue;
        }

        let square = polyline(&[
            (cx - half, cy - half),
            (cx + half, cy - half),
            (cx + half, cy + half),
            (cx - half, cy + half),
            (cx - half, cy - half),
        ]);
        if let Some(square) = square {
            fill(pixmap, &square, HANDLE_FILL);
            stroke(pixmap, &square, ink, 1.5, false);
        }
    }
}

/// Closed screen-space outline of an image-space box.
fn screen_quad(bbox: BBox, to_screen: &Affine) -> Option<Path> {
    let corners = [
        bbox.top_left(),
        bbox.top_right(),
        bbox.bottom_right(),
        bbox.bottom_left(),
    ]
    .map(|corner| to_screen.apply(corner));

    let mut pb = PathBuilder::new();
    pb.move_to(corners[0].x as f32, corners[0].y as f32);
    for corner in &corners[1..] {
        pb.line_to(corner.x as f32, corner.y as f32);
    }
    pb.close();
    pb.finish()
}

fn polyline(points: &[(f32, f32)]) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.0, first.1);
    for (x, y) in rest {
        pb.line_to(*x, *y);
    }
    pb.finish()
}

fn paint(rgba: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint.anti_alias = true;
    paint
}

fn color(rgba: Rgba) -> Color {
    Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3])
}

fn fill(pixmap: &mut Pixmap, path: &Path, rgba: Rgba) {
    pixmap.fill_path(path, &paint(rgba), FillRule::Winding, Transform::identity(), None);
}

fn stroke(pixmap: &mut Pixmap, path: &Path, rgba: Rgba, width: f32, dashed: bool) {
    let stroke = Stroke {
        width,
        dash: if dashed {
            StrokeDash::new(vec![6.0, 4.0], 0.0)
        } else {
            None
        },
        ..Stroke::default()
    };
    pixmap.stroke_path(path, &paint(rgba), &stroke, Transform::identity(), None);
}

/// `Affine` maps `(x, y)` to `(a x + c y + e, b x + d y + f)`; tiny-skia's
/// row order is `(sx, ky, kx, sy, tx, ty)` for the same matrix.
fn skia_transform(affine: &Affine) -> Transform {
    Transform::from_row(
        affine.a as f32,
        affine.b as f32,
        affine.c as f32,
        affine.d as f32,
        affine.e as f32,
        affine.f as f32,
    )
}
