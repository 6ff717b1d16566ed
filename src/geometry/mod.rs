//! Geometry primitives for the drawing viewer
//!
//! Coordinates are `f64` pixels. Image space has its origin at the top-left
//! corner of the decoded page raster with y growing downwards; every other
//! space (OCR, canvas, screen) is reached through an [`Affine`] built by
//! [`ViewTransform`].

mod transform;

pub use transform::{
    ocr_to_image, Affine, CanvasLayout, InvalidRotation, Rotation, ViewTransform, ZoomRange,
};

use serde::{Deserialize, Serialize};

/// A 2D point (or displacement) in some pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Vector from `self` to `other`.
    pub fn delta_to(self, other: Point) -> Point {
        Point::new(other.x - self.x, other.y - self.y)
    }
}

/// Width/height pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not a number.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned box with `x1 <= x2` and `y1 <= y2`.
///
/// Every constructor normalizes its input, so a box built from a drag that
/// went up-left still has its minimum corner first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn from_points(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    pub fn from_xyxy(coords: [f64; 4]) -> Self {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    pub fn to_xyxy(self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Integer-rounded corners, as sent to the extraction service.
    pub fn to_integer(self) -> [i64; 4] {
        [
            self.x1.round() as i64,
            self.y1.round() as i64,
            self.x2.round() as i64,
            self.y2.round() as i64,
        ]
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn top_right(&self) -> Point {
        Point::new(self.x2, self.y1)
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.x1, self.y2)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.x2, self.y2)
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x1 && point.x <= self.x2 && point.y >= self.y1 && point.y <= self.y2
    }

    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.x1 - margin,
            self.y1 - margin,
            self.x2 + margin,
            self.y2 + margin,
        )
    }

    pub fn translate(&self, delta: Point) -> Self {
        Self::new(
            self.x1 + delta.x,
            self.y1 + delta.y,
            self.x2 + delta.x,
            self.y2 + delta.y,
        )
    }

    /// Map both corners through `transform` and re-normalize.
    ///
    /// Exact for the transforms the viewer builds (axis scales, translations
    /// and quarter-turn rotations keep boxes axis-aligned).
    pub fn map(&self, transform: &Affine) -> Self {
        Self::from_points(
            transform.apply(self.top_left()),
            transform.apply(self.bottom_right()),
        )
    }

    /// Clamp into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, bounds: Size) -> Self {
        Self::new(
            self.x1.clamp(0.0, bounds.width),
            self.y1.clamp(0.0, bounds.height),
            self.x2.clamp(0.0, bounds.width),
            self.y2.clamp(0.0, bounds.height),
        )
    }
}
