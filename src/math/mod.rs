//! 2D geometry helpers shared by the rig, mesh and transition code.
//!
//! Everything here works on `glam::Vec2` in the image/world plane. Angles are
//! radians, counter-clockwise in a y-up frame (clockwise on screen for
//! y-down image coordinates).

mod bsp;
mod raster;
mod triangle;

pub use bsp::Bsp2d;
pub use raster::{ScanLine, TriangleRasterizer};
pub use triangle::{Triangle2, TrianglePos};

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Vectors shorter than this cannot be normalized reliably.
pub const NORMALIZABLE: f32 = 1e-4;

// ============================================================================
// Angles
// ============================================================================

/// Angle of `v` measured from +X.
#[inline]
#[must_use]
pub fn angle_of(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Wraps an angle into `(-PI, PI]`.
#[must_use]
pub fn normalize_angle(mut angle: f32) -> f32 {
    angle %= TAU;
    if angle > PI {
        angle -= TAU;
    } else if angle <= -PI {
        angle += TAU;
    }
    angle
}

/// Signed rotation taking angle `from` onto angle `to`, in `(-PI, PI]`.
#[inline]
#[must_use]
pub fn angle_diff(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Signed rotation taking direction `from` onto direction `to`.
///
/// Returns 0 when either vector is zero.
#[must_use]
pub fn angle_between(from: Vec2, to: Vec2) -> f32 {
    if from == Vec2::ZERO || to == Vec2::ZERO {
        return 0.0;
    }
    angle_diff(angle_of(from), angle_of(to))
}

/// Rotates `v` by `angle`.
#[inline]
#[must_use]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Reflects `v` across the unit axis `axis`.
#[inline]
#[must_use]
pub fn reflect_across_axis(axis: Vec3, v: Vec3) -> Vec3 {
    2.0 * axis * axis.dot(v) - v
}

/// Builds `T(to) · Rz(to_angle - from_angle) · T(-from)`.
#[must_use]
pub fn rigid_transform(from_pos: Vec2, from_angle: f32, to_pos: Vec2, to_angle: f32) -> Mat4 {
    Mat4::from_translation(to_pos.extend(0.0))
        * Mat4::from_rotation_z(to_angle - from_angle)
        * Mat4::from_translation(-from_pos.extend(0.0))
}

/// Transforms a 2D point through a 4×4 matrix (z = 0, w = 1).
#[inline]
#[must_use]
pub fn transform_point2(m: &Mat4, p: Vec2) -> Vec2 {
    m.transform_point3(p.extend(0.0)).truncate()
}

// ============================================================================
// Segment
// ============================================================================

/// A directed segment `start → start + dir`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment2 {
    pub start: Vec2,
    pub dir: Vec2,
}

impl Segment2 {
    #[must_use]
    pub fn new(start: Vec2, dir: Vec2) -> Self {
        Self { start, dir }
    }

    #[must_use]
    pub fn from_points(start: Vec2, end: Vec2) -> Self {
        Self { start, dir: end - start }
    }

    #[inline]
    #[must_use]
    pub fn end(&self) -> Vec2 {
        self.start + self.dir
    }

    /// Projection parameter of `p` along the segment (unclamped).
    #[must_use]
    pub fn raw_rate(&self, p: Vec2) -> f32 {
        let len_sq = self.dir.length_squared();
        if len_sq <= 0.0 {
            return 0.0;
        }
        self.dir.dot(p - self.start) / len_sq
    }

    /// Distance of `p` from the infinite line through the segment.
    #[must_use]
    pub fn perpendicular_length(&self, p: Vec2) -> f32 {
        let len = self.dir.length();
        if len <= 0.0 {
            return (p - self.start).length();
        }
        self.dir.perp_dot(p - self.start).abs() / len
    }

    /// True if the two rays point toward each other.
    #[must_use]
    pub fn is_facing(&self, other: &Segment2) -> bool {
        self.dir.dot(other.dir) < 0.0 && (other.start - self.start).dot(self.dir) > 0.0
    }
}

// ============================================================================
// Rect
// ============================================================================

/// Axis-aligned rectangle given by its min and max corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect2 {
    #[must_use]
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Smallest rect containing every point. Empty input yields a zero rect.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        iter.fold(Self::new(first, first), |r, p| Self::new(r.min.min(p), r.max.max(p)))
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// True if `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains_rect(&self, other: &Rect2) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    #[must_use]
    pub fn intersects(&self, other: &Rect2) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

// ============================================================================
// Polygon
// ============================================================================

/// A closed polygon outline. The closing edge is implicit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon2 {
    points: Vec<Vec2>,
}

impl Polygon2 {
    #[must_use]
    pub fn new(mut points: Vec<Vec2>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self { points }
    }

    #[inline]
    #[must_use]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.len() < 3
    }

    #[must_use]
    pub fn bounding_rect(&self) -> Rect2 {
        Rect2::from_points(self.points.iter().copied())
    }

    /// Odd-even fill rule containment.
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        if self.is_empty() {
            return false;
        }
        let mut inside = false;
        let mut prev = self.points[self.points.len() - 1];
        for &curr in &self.points {
            if (curr.y > p.y) != (prev.y > p.y) {
                let x = prev.x + (p.y - prev.y) * (curr.x - prev.x) / (curr.y - prev.y);
                if p.x < x {
                    inside = !inside;
                }
            }
            prev = curr;
        }
        inside
    }
}
