use glam::Vec2;

use super::{Rect2, Segment2};

/// Relative slack applied to containment and parametrisation so that points
/// lying on shared edges or corners are never rejected by rounding.
const EDGE_TOLERANCE: f32 = 1e-5;

/// A 2D triangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Triangle2 {
    pub v: [Vec2; 3],
}

impl Triangle2 {
    #[must_use]
    pub fn new(a: Vec2, b: Vec2, c: Vec2) -> Self {
        Self { v: [a, b, c] }
    }

    #[must_use]
    pub fn bounding_rect(&self) -> Rect2 {
        Rect2::from_points(self.v)
    }

    /// True when both heights (over edges 0-1 and 1-2) reach `eps`.
    #[must_use]
    pub fn has_face(&self, eps: f32) -> bool {
        let seg01 = Segment2::from_points(self.v[0], self.v[1]);
        let seg12 = Segment2::from_points(self.v[1], self.v[2]);
        seg01.perpendicular_length(self.v[2]) >= eps && seg12.perpendicular_length(self.v[0]) >= eps
    }

    /// Twice the signed area.
    #[inline]
    #[must_use]
    pub fn doubled_area(&self) -> f32 {
        (self.v[1] - self.v[0]).perp_dot(self.v[2] - self.v[0])
    }

    /// Inclusive point-in-triangle test, independent of winding.
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        let area = self.doubled_area();
        if area == 0.0 {
            return false;
        }
        let slack = -EDGE_TOLERANCE * area.abs();
        let sign = area.signum();
        (0..3).all(|i| {
            let a = self.v[i];
            let b = self.v[(i + 1) % 3];
            sign * (b - a).perp_dot(p - a) >= slack
        })
    }
}

/// A point expressed relative to a triangle, stable under deformation of
/// that triangle.
///
/// The point is the blend `lerp(lerp(v[i+1], v[i], first), v[i+2], second)`
/// where `i` is [`index`](Self::index): first along an edge, then toward the
/// opposite corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrianglePos {
    index: usize,
    first: f32,
    second: f32,
}

impl TrianglePos {
    /// Locates `p` inside `tri`. Returns `None` for points outside the
    /// triangle and for degenerate triangles.
    #[must_use]
    pub fn make(tri: &Triangle2, p: Vec2) -> Option<Self> {
        let dir = [p - tri.v[0], p - tri.v[1], p - tri.v[2]];

        let mut far = None;
        let mut max_len_sq = 0.0;
        for (i, d) in dir.iter().enumerate() {
            let len_sq = d.length_squared();
            if len_sq > max_len_sq {
                far = Some(i);
                max_len_sq = len_sq;
            }
        }
        let far = far?;

        let first = (far + 1) % 3;
        let s0 = tri.v[first];
        let e0 = tri.v[(far + 2) % 3];
        let s1 = tri.v[far];
        let v0 = e0 - s0;
        let v1 = dir[far];
        let v = s1 - s0;

        let cross = v0.perp_dot(v1);
        if cross == 0.0 {
            return None;
        }
        let t0 = v.perp_dot(v1) / cross;
        if !(-EDGE_TOLERANCE..=1.0 + EDGE_TOLERANCE).contains(&t0) {
            return None;
        }
        let t0 = t0.clamp(0.0, 1.0);

        let x = s0 + v0 * t0;
        let v2 = s1 - x;
        let v3 = p - x;
        let v2_len_sq = v2.length_squared();
        if v2_len_sq <= 0.0 {
            return None;
        }
        // v3 is parallel to v2, so the projection equals the length ratio.
        let t1 = v2.dot(v3) / v2_len_sq;
        if !(-EDGE_TOLERANCE..=1.0 + EDGE_TOLERANCE).contains(&t1) {
            return None;
        }

        Some(Self {
            index: first,
            first: 1.0 - t0,
            second: 1.0 - t1.clamp(0.0, 1.0),
        })
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Rebuilds the point over a (possibly deformed) triangle.
    #[must_use]
    pub fn get(&self, v: &[Vec2; 3]) -> Vec2 {
        let i = self.index;
        let edge = v[i] * self.first + v[(i + 1) % 3] * (1.0 - self.first);
        edge * self.second + v[(i + 2) % 3] * (1.0 - self.second)
    }
}
