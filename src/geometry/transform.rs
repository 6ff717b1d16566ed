//! View transforms
//!
//! One affine primitive serves every direction the viewer needs: image space
//! to canvas space (fit + rotation), canvas to screen (zoom + pan), and the
//! inverse used to resolve pointer events. Inverses are computed by matrix
//! inversion so forward and inverse mappings cannot drift apart.

use serde::{Deserialize, Serialize};

use super::{BBox, Point, Size};

/// Determinant magnitude below which a transform is treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// 2x3 affine matrix.
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(dx: f64, dy: f64) -> Self {
        Self {
            e: dx,
            f: dy,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// Clockwise rotation about the origin (y axis pointing down).
    pub fn rotate(rotation: Rotation) -> Self {
        let (cos, sin) = rotation.cos_sin();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Compose: apply `self` first, then `next`.
    pub fn then(self, next: Affine) -> Self {
        Self {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            e: next.a * self.e + next.c * self.f + next.e,
            f: next.b * self.e + next.d * self.f + next.f,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse mapping, or `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < SINGULAR_EPSILON || !det.is_finite() {
            return None;
        }
        Some(Self {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    pub fn apply(&self, point: Point) -> Point {
        Point::new(
            self.a * point.x + self.c * point.y + self.e,
            self.b * point.x + self.d * point.y + self.f,
        )
    }

    /// Uniform length scale of the linear part (exact for rotation + uniform scale).
    pub fn length_scale(&self) -> f64 {
        self.determinant().abs().sqrt()
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rotation value outside {0, 90, 180, 270}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rotation must be a multiple of 90 degrees, got {0}")]
pub struct InvalidRotation(pub i32);

/// Page rotation; only quarter turns are representable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Parse any multiple of 90 (negative values and full turns wrap).
    pub fn from_degrees(degrees: i32) -> Result<Self, InvalidRotation> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            _ => Err(InvalidRotation(degrees)),
        }
    }

    pub fn clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    pub fn counter_clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg270,
            Self::Deg90 => Self::Deg0,
            Self::Deg180 => Self::Deg90,
            Self::Deg270 => Self::Deg180,
        }
    }

    /// True for 90 and 270, where the displayed width and height swap.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// Exact cosine/sine pair; avoids `f64::sin` rounding on quarter turns.
    fn cos_sin(self) -> (f64, f64) {
        match self {
            Self::Deg0 => (1.0, 0.0),
            Self::Deg90 => (0.0, 1.0),
            Self::Deg180 => (-1.0, 0.0),
            Self::Deg270 => (0.0, -1.0),
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = InvalidRotation;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_degrees(value)
    }
}

impl From<Rotation> for i32 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

/// Inclusive zoom bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

impl ZoomRange {
    pub fn clamp(&self, zoom: f64) -> f64 {
        if !zoom.is_finite() {
            return 1.0_f64.clamp(self.min, self.max);
        }
        zoom.clamp(self.min, self.max)
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self { min: 0.5, max: 5.0 }
    }
}

/// Fitted canvas inside the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasLayout {
    /// Canvas pixels per image pixel.
    pub scale: f64,
    /// Displayed canvas size (already swapped for quarter turns).
    pub canvas: Size,
    /// Top-left of the canvas inside the container, before zoom and pan.
    pub offset: Point,
}

/// Full view state of one displayed page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Natural pixel size of the page image.
    pub natural: Size,
    /// Size of the on-screen container the canvas is fitted into.
    pub container: Size,
    pub rotation: Rotation,
    pub zoom: f64,
    /// Screen-space translation applied after zoom.
    pub pan: Point,
    pub zoom_range: ZoomRange,
}

impl ViewTransform {
    pub fn new(natural: Size, container: Size) -> Self {
        Self {
            natural,
            container,
            rotation: Rotation::Deg0,
            zoom: 1.0,
            pan: Point::ZERO,
            zoom_range: ZoomRange::default(),
        }
    }

    /// Fit the (possibly rotated) image into the container.
    ///
    /// Returns `None` until both the image and the container have a size.
    pub fn layout(&self) -> Option<CanvasLayout> {
        if self.natural.is_empty() || self.container.is_empty() {
            return None;
        }
        let effective = if self.rotation.swaps_axes() {
            Size::new(self.natural.height, self.natural.width)
        } else {
            self.natural
        };
        let scale = (self.container.width / effective.width)
            .min(self.container.height / effective.height);
        let canvas = Size::new(effective.width * scale, effective.height * scale);
        let offset = Point::new(
            (self.container.width - canvas.width) / 2.0,
            (self.container.height - canvas.height) / 2.0,
        );
        Some(CanvasLayout {
            scale,
            canvas,
            offset,
        })
    }

    /// Image space -> canvas space: scale, then rotate about the canvas center.
    pub fn image_to_canvas(&self) -> Option<Affine> {
        let layout = self.layout()?;
        let s = layout.scale;
        Some(
            Affine::scale(s, s)
                .then(Affine::translate(
                    -self.natural.width * s / 2.0,
                    -self.natural.height * s / 2.0,
                ))
                .then(Affine::rotate(self.rotation))
                .then(Affine::translate(
                    layout.canvas.width / 2.0,
                    layout.canvas.height / 2.0,
                )),
        )
    }

    /// Canvas space -> container-local screen space: center, zoom, pan.
    pub fn canvas_to_screen(&self) -> Option<Affine> {
        let layout = self.layout()?;
        Some(
            Affine::translate(layout.offset.x, layout.offset.y)
                .then(Affine::scale(self.zoom, self.zoom))
                .then(Affine::translate(self.pan.x, self.pan.y)),
        )
    }

    pub fn image_to_screen(&self) -> Option<Affine> {
        Some(self.image_to_canvas()?.then(self.canvas_to_screen()?))
    }

    pub fn screen_to_image(&self) -> Option<Affine> {
        self.image_to_screen()?.inverse()
    }

    pub fn to_canvas(&self, image_point: Point) -> Option<Point> {
        Some(self.image_to_canvas()?.apply(image_point))
    }

    pub fn to_screen(&self, image_point: Point) -> Option<Point> {
        Some(self.image_to_screen()?.apply(image_point))
    }

    /// Resolve a pointer position to image space.
    pub fn to_image(&self, screen_point: Point) -> Option<Point> {
        Some(self.screen_to_image()?.apply(screen_point))
    }

    /// Convert a fixed canvas-pixel length into image pixels (zoom-independent).
    pub fn canvas_len_to_image(&self, length: f64) -> Option<f64> {
        let layout = self.layout()?;
        Some(length / layout.scale)
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.zoom_range.clamp(zoom);
    }

    /// Multiply the zoom while keeping the image point under `anchor` fixed.
    pub fn zoom_at(&mut self, factor: f64, anchor: Point) {
        let Some(image_point) = self.to_image(anchor) else {
            self.set_zoom(self.zoom * factor);
            return;
        };
        self.set_zoom(self.zoom * factor);
        if let (Some(layout), Some(to_canvas)) = (self.layout(), self.image_to_canvas()) {
            let canvas = to_canvas.apply(image_point);
            self.pan = Point::new(
                anchor.x - self.zoom * (layout.offset.x + canvas.x),
                anchor.y - self.zoom * (layout.offset.y + canvas.y),
            );
        }
    }

    pub fn pan_by(&mut self, delta: Point) {
        self.pan.x += delta.x;
        self.pan.y += delta.y;
    }
}

/// Per-axis scale from an OCR reference frame to the natural image frame.
///
/// `reference` is the `image_bbox` reported by the OCR engine. Falls back to
/// identity when it is missing or degenerate, which means the OCR ran on the
/// natural resolution.
pub fn ocr_to_image(reference: Option<BBox>, natural: Size) -> Affine {
    match reference {
        Some(frame) if frame.width() > 0.0 && frame.height() > 0.0 && !natural.is_empty() => {
            Affine::translate(-frame.x1, -frame.y1).then(Affine::scale(
                natural.width / frame.width(),
                natural.height / frame.height(),
            ))
        }
        _ => Affine::IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROTATIONS: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Deterministic pseudo-random points (LCG) inside the image.
    fn sample_points(count: usize, natural: Size) -> Vec<Point> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..count)
            .map(|_| Point::new(next() * natural.width, next() * natural.height))
            .collect()
    }

    fn view(rotation: Rotation, zoom: f64) -> ViewTransform {
        let mut view = ViewTransform::new(Size::new(1700.0, 2200.0), Size::new(900.0, 700.0));
        view.rotation = rotation;
        view.set_zoom(zoom);
        view.pan = Point::new(-37.5, 12.25);
        view
    }

    #[test]
    fn screen_round_trip_for_every_rotation_and_zoom() {
        let natural = Size::new(1700.0, 2200.0);
        for rotation in ROTATIONS {
            for zoom in [0.5, 1.0, 2.0, 5.0] {
                let view = view(rotation, zoom);
                for point in sample_points(100, natural) {
                    let screen = view.to_screen(point).unwrap();
                    let back = view.to_image(screen).unwrap();
                    assert!(
                        point.distance_to(back) < 0.5,
                        "{rotation:?} zoom {zoom}: {point:?} -> {back:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn canvas_round_trip_uses_exact_inverse() {
        for rotation in ROTATIONS {
            let view = view(rotation, 1.0);
            let forward = view.image_to_canvas().unwrap();
            let inverse = forward.inverse().unwrap();
            let p = Point::new(123.25, 456.5);
            let back = inverse.apply(forward.apply(p));
            assert!(p.distance_to(back) < 1e-9);
        }
    }

    #[test]
    fn quarter_turn_swaps_canvas_dimensions() {
        let mut view = ViewTransform::new(Size::new(200.0, 100.0), Size::new(400.0, 400.0));
        let flat = view.layout().unwrap();
        assert_eq!(flat.canvas, Size::new(400.0, 200.0));

        view.rotation = Rotation::Deg90;
        let turned = view.layout().unwrap();
        assert_eq!(turned.canvas, Size::new(200.0, 400.0));
        assert_eq!(turned.scale, 2.0);
    }

    #[test]
    fn ninety_degrees_maps_top_left_to_top_right() {
        let mut view = ViewTransform::new(Size::new(200.0, 100.0), Size::new(100.0, 200.0));
        view.rotation = Rotation::Deg90;
        let canvas = view.to_canvas(Point::new(0.0, 0.0)).unwrap();
        assert!(canvas.distance_to(Point::new(100.0, 0.0)) < 1e-9);

        // (x, y) -> (imageHeight - y, x) at scale 1.
        let canvas = view.to_canvas(Point::new(30.0, 20.0)).unwrap();
        assert!(canvas.distance_to(Point::new(80.0, 30.0)) < 1e-9);
    }

    #[test]
    fn one_eighty_flips_both_axes() {
        let mut view = ViewTransform::new(Size::new(200.0, 100.0), Size::new(200.0, 100.0));
        view.rotation = Rotation::Deg180;
        let canvas = view.to_canvas(Point::new(10.0, 20.0)).unwrap();
        assert!(canvas.distance_to(Point::new(190.0, 80.0)) < 1e-9);
    }

    #[test]
    fn zero_sized_container_defers_layout() {
        let view = ViewTransform::new(Size::new(200.0, 100.0), Size::new(0.0, 300.0));
        assert!(view.layout().is_none());
        assert!(view.to_image(Point::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn zoom_is_clamped() {
        let mut view = view(Rotation::Deg0, 1.0);
        view.set_zoom(40.0);
        assert_eq!(view.zoom, 5.0);
        view.set_zoom(0.01);
        assert_eq!(view.zoom, 0.5);
    }

    #[test]
    fn zoom_at_keeps_anchor_over_same_image_point() {
        let mut view = view(Rotation::Deg270, 1.0);
        let anchor = Point::new(420.0, 333.0);
        let before = view.to_image(anchor).unwrap();
        view.zoom_at(1.75, anchor);
        let after = view.to_image(anchor).unwrap();
        assert!(before.distance_to(after) < 1e-6);
        assert_eq!(view.zoom, 1.75);
    }

    #[test]
    fn ocr_reference_frame_scales_per_axis() {
        let reference = BBox::new(0.0, 0.0, 850.0, 550.0);
        let transform = ocr_to_image(Some(reference), Size::new(1700.0, 2200.0));
        let mapped = transform.apply(Point::new(425.0, 275.0));
        assert!(mapped.distance_to(Point::new(850.0, 1100.0)) < 1e-9);

        let fallback = ocr_to_image(None, Size::new(1700.0, 2200.0));
        assert_eq!(fallback, Affine::IDENTITY);
    }

    #[test]
    fn rotation_parsing_and_stepping() {
        assert_eq!(Rotation::from_degrees(-90), Ok(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Ok(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), Err(InvalidRotation(45)));
        assert_eq!(Rotation::Deg270.clockwise(), Rotation::Deg0);
        assert_eq!(Rotation::Deg0.counter_clockwise(), Rotation::Deg270);

        let parsed: Rotation = serde_json::from_str("180").unwrap();
        assert_eq!(parsed, Rotation::Deg180);
        assert!(serde_json::from_str::<Rotation>("30").is_err());
    }
}
