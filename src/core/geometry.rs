use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Zero-area or non-finite boxes cannot be rasterized or rescaled.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// True when the two boxes share a region of positive area.
    pub fn intersects(&self, other: &Self) -> bool {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        x1 > x0 && y1 > y0
    }

    fn horizontal_overlap(&self, other: &Self) -> f32 {
        (self.x1.min(other.x1) - self.x0.max(other.x0)).max(0.0)
    }

    fn vertical_gap(&self, other: &Self) -> f32 {
        (other.y0 - self.y1).max(self.y0 - other.y1).max(0.0)
    }
}

/// Thresholds deciding whether two neighbouring block boxes belong to one region.
///
/// Two shapes are accepted:
/// - stacked: lines of a multi-line formula, vertically adjacent or overlapping
///   with enough shared horizontal extent;
/// - inline: a box continuing `first` on the same baseline, starting just to its right.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergePolicy {
    pub vertical_tolerance: f32,
    pub min_horizontal_overlap: f32,
    pub inline_tolerance: f32,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            vertical_tolerance: 8.0,
            min_horizontal_overlap: 0.3,
            inline_tolerance: 5.0,
        }
    }
}

impl MergePolicy {
    /// `first` precedes `second` in reading order.
    pub fn should_merge(&self, first: &BBox, second: &BBox) -> bool {
        self.stacked(first, second) || self.inline(first, second)
    }

    fn stacked(&self, a: &BBox, b: &BBox) -> bool {
        if a.vertical_gap(b) > self.vertical_tolerance {
            return false;
        }
        let narrower = a.width().min(b.width());
        if narrower <= 0.0 {
            return false;
        }
        a.horizontal_overlap(b) / narrower >= self.min_horizontal_overlap
    }

    fn inline(&self, a: &BBox, b: &BBox) -> bool {
        let tol = self.inline_tolerance;
        b.x0 > a.x0
            && (b.y0 - a.y0).abs() < tol
            && (b.y1 - a.y1).abs() < tol
            && (b.x0 - a.x1).abs() < tol
    }
}
