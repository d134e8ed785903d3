use glam::{Vec2, Vec3};

use super::values::Interpolatable;

const SPLIT_COUNT: usize = 8;

/// Points a spline can run through.
pub trait SplinePoint: Interpolatable {
    fn distance(a: Self, b: Self) -> f32;
}

impl SplinePoint for Vec2 {
    fn distance(a: Self, b: Self) -> f32 {
        a.distance(b)
    }
}

impl SplinePoint for Vec3 {
    fn distance(a: Self, b: Self) -> f32 {
        a.distance(b)
    }
}

/// Cubic Hermite (Ferguson-Coons) segment with an arc-length table so that
/// it can be walked at a uniform speed.
#[derive(Debug, Clone, Copy)]
pub struct FergusonCoonsSpline<T> {
    p0: T,
    p1: T,
    v0: T,
    v1: T,
    linearize: [f32; SPLIT_COUNT + 1],
    length: f32,
}

impl<T: SplinePoint> FergusonCoonsSpline<T> {
    #[must_use]
    pub fn new(p0: T, p1: T, v0: T, v1: T) -> Self {
        let mut spline = Self { p0, p1, v0, v1, linearize: [0.0; SPLIT_COUNT + 1], length: 0.0 };

        let mut current = p0;
        for i in 1..=SPLIT_COUNT {
            let next = spline.get(i as f32 / SPLIT_COUNT as f32);
            spline.length += T::distance(next, current);
            spline.linearize[i] = spline.length;
            current = next;
        }
        spline
    }

    /// Point at curve parameter `t` in `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn get(&self, t: f32) -> T {
        T::interpolate_cubic(self.p0, self.v0, self.v1, self.p1, t, 1.0)
    }

    /// Point at the fraction `t` of the total arc length.
    #[must_use]
    pub fn get_by_linear(&self, t: f32) -> T {
        let tlen = t * self.length;

        let mut a = 0;
        let mut b = SPLIT_COUNT >> 1;
        while b >= 1 {
            if tlen >= self.linearize[a + b] {
                a += b;
            }
            b >>= 1;
        }

        let prev = self.linearize[a];
        let range = self.linearize[a + 1] - prev;
        if range < 0.001 {
            return self.get(a as f32 / SPLIT_COUNT as f32);
        }

        let offset = (tlen - prev) / range;
        self.get((a as f32 + offset) / SPLIT_COUNT as f32)
    }

    #[inline]
    #[must_use]
    pub fn length(&self) -> f32 {
        self.length
    }
}
