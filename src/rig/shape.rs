//! Per-bone influence shape: a capsule around the bone segment with
//! elliptical caps and angular bend limits at both joints.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

use crate::math::{self, NORMALIZABLE, Polygon2, Rect2, Segment2};

/// Radii below this produce no falloff.
pub const RANGE_MIN: f32 = 0.1;

/// Extra radius added around each bone, relative to its larger wing.
pub const RANGE_EXTEND_RATE: f32 = 0.3;

const FAN_DIVIDE: usize = 16;

/// Angular limits around a joint.
///
/// `angle[0]` spans the positive direction and `angle[1]` the negative one.
/// A range is valid when `angle[0] >= 0 >= angle[1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BendRange {
    pub angle: [f32; 2],
}

impl Default for BendRange {
    fn default() -> Self {
        Self { angle: [-1.0, 1.0] }
    }
}

impl BendRange {
    #[must_use]
    pub fn new(positive: f32, negative: f32) -> Self {
        Self { angle: [positive, negative] }
    }

    /// Full-turn range opening at `diff`.
    fn from_diff(diff: f32) -> Self {
        if diff >= 0.0 { Self::new(diff, diff - TAU) } else { Self::new(diff + TAU, diff) }
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.angle[0] >= 0.0 && self.angle[1] <= 0.0
    }

    /// Weight of a point bent by `bend` radians away from the bone axis.
    #[must_use]
    pub fn weight(&self, bend: f32) -> f32 {
        if !self.is_valid() {
            return 1.0;
        }

        let mut posi = 0.0;
        if self.angle[0] > 0.0 {
            let b = if bend >= 0.0 { bend } else { bend + TAU };
            posi = 1.0 - b / self.angle[0];
        }

        let mut nega = 0.0;
        if self.angle[1] < 0.0 {
            let b = if bend <= 0.0 { bend } else { bend - TAU };
            nega = 1.0 - b / self.angle[1];
        }

        posi.max(nega).max(0.001)
    }
}

/// Influence volume of one bone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneShape {
    segment: Segment2,
    radius: [Vec2; 2],
    valid: bool,
    unit: Vec2,
    dir_angle: f32,
    length: f32,
    bounding: Rect2,
    polygon: Polygon2,
    root_bend: BendRange,
    tail_bend: BendRange,
}

impl BoneShape {
    /// A shape with no outline yet. `influence` stays 0 until
    /// [`set_polygon`](Self::set_polygon) is called.
    #[must_use]
    pub fn new(segment: Segment2, radius_root: Vec2, radius_tail: Vec2) -> Self {
        let mut shape = Self { segment, radius: [radius_root, radius_tail], ..Self::default() };
        shape.update_validity();
        shape
    }

    /// Builds a complete shape for the segment `start → end`: radii grown by
    /// [`RANGE_EXTEND_RATE`], capsule outline, root bend from the parent
    /// direction and tail bend from every child direction.
    #[must_use]
    pub fn from_segment(
        start: Vec2,
        end: Vec2,
        range: [Vec2; 2],
        parent_dir: Vec2,
        child_dirs: impl IntoIterator<Item = Vec2>,
    ) -> Option<Self> {
        let extend = RANGE_EXTEND_RATE * range[0].x.max(range[1].x);
        let range0 = range[0] + Vec2::splat(extend);
        let range1 = range[1] + Vec2::splat(extend);

        let segment = Segment2::from_points(start, end);
        let outline = capsule_outline(&segment, range0, range1)?;

        let mut shape = Self::new(segment, range0, range1);
        shape.set_polygon(outline);
        shape.set_root_bend_from_directions(segment.dir, parent_dir);
        for child in child_dirs {
            shape.adjust_tail_bend_from_directions(segment.dir, child);
        }
        Some(shape)
    }

    fn update_validity(&mut self) {
        let has_radius = self.radius[0] != Vec2::ZERO || self.radius[1] != Vec2::ZERO;
        let length = self.segment.dir.length();
        self.valid = has_radius && length >= NORMALIZABLE;
        if self.valid {
            self.unit = self.segment.dir / length;
            self.length = length;
            self.dir_angle = math::angle_of(self.unit);
        }
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn segment(&self) -> &Segment2 {
        &self.segment
    }

    #[must_use]
    pub fn radius(&self) -> [Vec2; 2] {
        self.radius
    }

    #[must_use]
    pub fn polygon(&self) -> &Polygon2 {
        &self.polygon
    }

    #[must_use]
    pub fn bend_ranges(&self) -> (BendRange, BendRange) {
        (self.root_bend, self.tail_bend)
    }

    pub fn set_segment(&mut self, segment: Segment2) {
        self.segment = segment;
        self.update_validity();
    }

    pub fn set_radius(&mut self, root: Vec2, tail: Vec2) {
        self.radius = [root, tail];
        self.update_validity();
    }

    pub fn set_polygon(&mut self, polygon: Polygon2) {
        self.bounding = polygon.bounding_rect();
        self.polygon = polygon;
    }

    pub fn set_bend_range(&mut self, root: BendRange, tail: BendRange) {
        self.root_bend = root;
        self.tail_bend = tail;
    }

    pub fn set_root_bend_from_directions(&mut self, my_dir: Vec2, parent_dir: Vec2) {
        self.root_bend = BendRange::default();
        if my_dir != Vec2::ZERO && parent_dir != Vec2::ZERO {
            self.root_bend = BendRange::from_diff(math::angle_between(my_dir, -parent_dir));
        }
    }

    /// Narrows the tail range so that it never covers `child_dir`.
    pub fn adjust_tail_bend_from_directions(&mut self, my_dir: Vec2, child_dir: Vec2) {
        if my_dir == Vec2::ZERO || child_dir == Vec2::ZERO {
            return;
        }
        let range = BendRange::from_diff(math::angle_between(-my_dir, child_dir));
        if self.tail_bend.is_valid() {
            self.tail_bend.angle[0] = self.tail_bend.angle[0].min(range.angle[0]);
            self.tail_bend.angle[1] = self.tail_bend.angle[1].max(range.angle[1]);
        } else {
            self.tail_bend = range;
        }
    }

    /// Influence of the bone over `p`, in `[0, 1]`.
    #[must_use]
    pub fn influence(&self, p: Vec2) -> f32 {
        if !self.valid || !self.bounding.contains(p) || !self.polygon.contains(p) {
            return 0.0;
        }
        self.bone_weight(p)
    }

    fn bone_weight(&self, p: Vec2) -> f32 {
        let mut twist = 1.0;

        let from_start = p - self.segment.start;
        if from_start != Vec2::ZERO {
            let diff = math::angle_diff(self.dir_angle, math::angle_of(from_start));
            let w = self.root_bend.weight(diff);
            twist *= w * w;
        }
        let from_end = p - self.segment.end();
        if from_end != Vec2::ZERO {
            let diff = math::angle_diff(self.dir_angle + PI, math::angle_of(from_end));
            let w = self.tail_bend.weight(diff);
            twist *= w * w;
        }

        let rate = self.segment.raw_rate(p);
        let mut nearness = 1.0;
        if rate < 0.0 {
            if self.radius[0].x >= RANGE_MIN {
                nearness = self.ellipse_weight(self.segment.start, self.radius[0], p);
            }
        } else if rate <= 1.0 {
            let range = self.radius[0].lerp(self.radius[1], rate);
            if range.x >= RANGE_MIN {
                let on_segment = self.segment.start + self.segment.dir * rate;
                nearness = (1.0 - p.distance(on_segment) / range.x).max(0.0);
            }
        } else if self.radius[1].x >= RANGE_MIN {
            nearness = self.ellipse_weight(self.segment.end(), self.radius[1], p);
        }

        let ratio = 0.3 * nearness * nearness;
        let twist = ratio + (1.0 - ratio) * twist;
        twist * nearness * self.weakness(rate.clamp(0.0, 1.0))
    }

    fn ellipse_weight(&self, center: Vec2, radius: Vec2, p: Vec2) -> f32 {
        if radius.x < RANGE_MIN || radius.y < RANGE_MIN {
            return 0.0;
        }
        let dir = p - center;
        let v = self.unit * self.unit.dot(dir);
        let h = dir - v;
        let skew = h + v * (radius.x / radius.y);
        let len_sq = skew.length_squared();
        if len_sq < radius.x * radius.x { 1.0 - len_sq.sqrt() / radius.x } else { 0.0 }
    }

    /// Halves the weight at the very ends, ramping back to 1 over the cap span.
    fn weakness(&self, rate: f32) -> f32 {
        let root_v = self.radius[0].y / self.length;
        let tail_v = self.radius[1].y / self.length;

        let mut weakness = 1.0;
        if root_v > 0.0 && rate < root_v {
            weakness *= 0.5 + 0.5 * (1.0 - (root_v - rate) / root_v);
        }
        if tail_v > 0.0 && rate > 1.0 - tail_v {
            weakness *= 0.5 + 0.5 * (1.0 - (rate - (1.0 - tail_v)) / tail_v);
        }
        weakness
    }
}

/// Capsule outline around `segment`: a half fan at each end, scaled along
/// the bone axis by `range.y / range.x`.
#[must_use]
pub fn capsule_outline(segment: &Segment2, range0: Vec2, range1: Vec2) -> Option<Polygon2> {
    if range0.x <= 0.0 && range1.x <= 0.0 {
        return None;
    }
    let len = segment.dir.length();
    if len < NORMALIZABLE {
        return None;
    }
    let v = segment.dir / len;
    let h = v.perp();

    let mut points: Vec<Vec2> = Vec::with_capacity(2 * (FAN_DIVIDE + 1));
    for (t, (center, range)) in [(segment.start, range0), (segment.end(), range1)].into_iter().enumerate() {
        let wing = range.x;
        let vscale = if wing.abs() < f32::EPSILON { 1.0 } else { range.y / wing };
        let swing = if t == 0 { h * wing } else { -h * wing };

        for i in 0..=FAN_DIVIDE {
            let offs = math::rotate(swing, PI * i as f32 / FAN_DIVIDE as f32);
            let pos = center + h * h.dot(offs) + v * (vscale * v.dot(offs));
            if points.last() != Some(&pos) {
                points.push(pos);
            }
        }
    }

    (points.len() >= 3).then(|| Polygon2::new(points))
}
