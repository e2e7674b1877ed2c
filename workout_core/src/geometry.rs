//! Axis-aligned rectangles and drag offsets in screen units.

use serde::{Deserialize, Serialize};

/// Cumulative drag translation since the gesture started
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f32,
    pub dy: f32,
}

impl Offset {
    pub const fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }
}

/// Screen bounding box; `top < bottom` with y growing downwards
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn translate(&self, offset: Offset) -> Self {
        Self::new(
            self.left + offset.dx,
            self.top + offset.dy,
            self.right + offset.dx,
            self.bottom + offset.dy,
        )
    }

    pub fn expand(&self, margin: f32) -> Self {
        Self::new(
            self.left - margin,
            self.top - margin,
            self.right + margin,
            self.bottom + margin,
        )
    }

    /// Strict intersection: touching edges do not count
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn center_distance_squared(&self, other: &Rect) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (ax - bx).powi(2) + (ay - by).powi(2)
    }
}

/// Whether `a` intersects `b` grown by `margin` on every side
///
/// Growing either rectangle gives the same answer, so the predicate is
/// symmetric in its two arguments.
pub fn overlaps(a: &Rect, b: &Rect, margin: f32) -> bool {
    a.intersects(&b.expand(margin))
}
