use glam::Vec2;

/// One horizontal span `[x_begin, x_end)` of a rasterised triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLine {
    pub x_begin: i32,
    pub x_end: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Half {
    Upper,
    Lower,
    Done,
}

/// Scanline walker over a triangle, split at its middle vertex into a
/// flat-bottom upper half and a flat-top lower half.
#[derive(Debug, Clone)]
pub struct TriangleRasterizer {
    v1: Vec2,
    v2: Vec2,
    v3: Vec2,
    v4: Vec2,
    half: Half,
    height: f32,
    current: f32,
    slope1: f32,
    slope2: f32,
}

impl TriangleRasterizer {
    #[must_use]
    pub fn new(a: Vec2, b: Vec2, c: Vec2) -> Self {
        let mut v = [a, b, c];
        v.sort_by(|l, r| l.y.total_cmp(&r.y));
        let [v1, mut v2, v3] = v;

        let mut half = Half::Upper;
        let (mut v4, height) = if v2.y == v3.y {
            (v3, v2.y - v1.y)
        } else if v1.y == v2.y {
            half = Half::Lower;
            (v1, v3.y - v2.y)
        } else {
            let ratio = (v2.y - v1.y) / (v3.y - v1.y);
            (Vec2::new(v1.x + ratio * (v3.x - v1.x), v2.y), v2.y - v1.y)
        };

        if v2.x > v4.x {
            std::mem::swap(&mut v2, &mut v4);
        }

        let (slope1, slope2) = match half {
            Half::Upper => (v2.x - v1.x, v4.x - v1.x),
            _ => (v2.x - v3.x, v4.x - v3.x),
        };
        if height <= 0.0 {
            half = Half::Done;
        }

        Self { v1, v2, v3, v4, half, height, current: 0.0, slope1, slope2 }
    }
}

impl Iterator for TriangleRasterizer {
    type Item = ScanLine;

    fn next(&mut self) -> Option<ScanLine> {
        match self.half {
            Half::Done => None,
            Half::Upper => {
                let l = self.current * self.slope1 / self.height;
                let r = self.current * self.slope2 / self.height;
                let line = ScanLine {
                    x_begin: (self.v1.x + l) as i32,
                    x_end: (self.v1.x + r) as i32 + 1,
                    y: (self.v1.y + self.current) as i32,
                };
                self.current += 1.0;

                if self.current > self.height {
                    if self.v2.y == self.v3.y {
                        self.half = Half::Done;
                    } else {
                        self.half = Half::Lower;
                        self.height = self.v3.y - self.v2.y;
                        self.slope1 = self.v2.x - self.v3.x;
                        self.slope2 = self.v4.x - self.v3.x;
                        self.current = 0.0;
                    }
                }
                Some(line)
            }
            Half::Lower => {
                let inv = self.height - self.current;
                let l = inv * self.slope1 / self.height;
                let r = inv * self.slope2 / self.height;
                let line = ScanLine {
                    x_begin: (self.v3.x + l) as i32,
                    x_end: (self.v3.x + r) as i32 + 1,
                    y: (self.v2.y + self.current) as i32,
                };
                self.current += 1.0;
                if self.current > self.height {
                    self.half = Half::Done;
                }
                Some(line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_triangle_spans_shrink() {
        let lines: Vec<_> =
            TriangleRasterizer::new(Vec2::ZERO, Vec2::new(4.0, 4.0), Vec2::new(0.0, 4.0)).collect();
        assert_eq!(lines.first().map(|l| l.y), Some(0));
        assert_eq!(lines.last().map(|l| l.y), Some(4));
        assert!(lines.iter().all(|l| l.x_begin <= l.x_end));
    }

    #[test]
    fn degenerate_triangle_yields_nothing() {
        let mut r = TriangleRasterizer::new(Vec2::ZERO, Vec2::X, Vec2::new(2.0, 0.0));
        assert!(r.next().is_none());
    }
}
