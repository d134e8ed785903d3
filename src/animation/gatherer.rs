//! Bracketing keyframe lookup around a queried frame.
//!
//! A gather collects up to four keys: two at or before the frame and two
//! after it, addressed as points `-1..=2`. Point 0 and point 1 bracket the
//! frame; the outer points only shape position splines. With looping on
//! and more than one key, the search wraps around the timeline ends and
//! the wrapped keys are measured against a shifted base frame.

use std::ops::Bound::{Excluded, Unbounded};

use super::frame::{Frame, TimeInfo};
use super::keys::{Key, KeyMap};

/// Restricts which keys a gather may pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceParent {
    /// Any key qualifies.
    #[default]
    None,
    /// Every key must belong to the given owner.
    Assigned(Option<i32>),
}

/// A key picked up by a gather.
#[derive(Debug)]
pub struct GatherPoint<'a, T> {
    pub frame: i32,
    /// Distance from the queried frame, negative before it.
    pub relative: f32,
    pub key: &'a Key<T>,
}

impl<T> Clone for GatherPoint<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GatherPoint<'_, T> {}

impl<'a, T> GatherPoint<'a, T> {
    fn new(frame: i32, key: &'a Key<T>, base: Frame) -> Self {
        Self { frame, relative: frame as f32 - base.decimal(), key }
    }
}

/// Result of one gather over a channel.
#[derive(Debug)]
pub struct KeyGatherer<'a, T> {
    points: [Option<GatherPoint<'a, T>>; 4],
    frame: Frame,
    parent: Option<i32>,
}

impl<'a, T> KeyGatherer<'a, T> {
    #[must_use]
    pub fn gather(map: &'a KeyMap<T>, time: &TimeInfo, force: ForceParent) -> Self {
        let frame = time.frame;
        let whole = frame.get();
        let mut result = Self { points: [None; 4], frame, parent: None };

        if !frame.has_fraction()
            && let Some(key) = map.get(&whole)
            && !matches!(force, ForceParent::Assigned(p) if key.parent != p)
        {
            result.points[1] = Some(GatherPoint::new(whole, key, frame));
            result.parent = key.parent;
            return result;
        }

        let wrap = time.looped && map.len() > 1;
        let owner = match force {
            ForceParent::Assigned(p) => Some(p),
            ForceParent::None => None,
        };
        let accepts = |key: &Key<T>| owner.is_none_or(|p| key.parent == p);

        // backward
        let mut back = map.range(..=whole);
        let mut back_base = frame;
        if wrap && back.clone().next_back().is_none() {
            back = map.range(..);
            back_base = frame.offset(time.frame_max + 1);
        }
        let mut back = back.rev();
        if let Some((&f, key)) = back.next()
            && accepts(key)
        {
            result.parent = key.parent;
            result.points[1] = Some(GatherPoint::new(f, key, back_base));
            if let Some((&f, key)) = back.next()
                && accepts(key)
            {
                result.points[0] = Some(GatherPoint::new(f, key, back_base));
            }
        }

        // forward
        let mut fwd = map.range((Excluded(whole), Unbounded));
        let mut fwd_base = frame;
        if wrap && fwd.clone().next().is_none() {
            fwd = map.range(..);
            fwd_base = frame.offset(-time.frame_max - 1);
        }
        for slot in 2..4 {
            let Some((&f, key)) = fwd.next() else {
                break;
            };
            if !accepts(key) {
                break;
            }
            if result.points[1].is_none() && slot == 2 {
                result.parent = key.parent;
            }
            result.points[slot] = Some(GatherPoint::new(f, key, fwd_base));
        }

        result
    }

    /// Point `index` in `-1..=2`.
    #[must_use]
    pub fn point(&self, index: i32) -> Option<&GatherPoint<'a, T>> {
        let slot = usize::try_from(index + 1).ok()?;
        self.points.get(slot)?.as_ref()
    }

    /// Owner of the gathered keys.
    #[must_use]
    pub fn parent(&self) -> Option<i32> {
        self.parent
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points[1].is_none() && self.points[2].is_none()
    }

    /// True when point 0 sits exactly on the queried frame.
    #[must_use]
    pub fn has_same_frame(&self) -> bool {
        !self.frame.has_fraction() && self.points[1].is_some_and(|p| p.frame == self.frame.get())
    }

    /// True when only one side of the bracket was found.
    #[must_use]
    pub fn is_single(&self) -> bool {
        !self.is_empty() && !(self.points[1].is_some() && self.points[2].is_some())
    }

    /// The only bracketing key of a single gather.
    #[must_use]
    pub fn single_point(&self) -> Option<&GatherPoint<'a, T>> {
        self.points[1].as_ref().or(self.points[2].as_ref())
    }

    /// Eased blend ratio from point 0 toward point 1, using point 0's curve.
    #[must_use]
    pub fn blend_ratio(&self) -> Option<f32> {
        let p0 = self.points[1].as_ref()?;
        let p1 = self.points[2].as_ref()?;
        let span = p1.relative - p0.relative;
        if span <= 0.0 {
            return Some(0.0);
        }
        Some(p0.key.easing.calculate(-p0.relative, 0.0, 1.0, span))
    }
}

/// Frame of the last key at or before the whole part of `frame`.
#[must_use]
pub fn find_last_key<T>(map: &KeyMap<T>, frame: Frame) -> Option<i32> {
    map.range(..=frame.get()).next_back().map(|(&f, _)| f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(frames: &[i32]) -> KeyMap<f32> {
        frames.iter().map(|&f| (f, Key::new(f as f32))).collect()
    }

    #[test]
    fn brackets_between_keys() {
        let map = keys(&[0, 10, 20, 30]);
        let g = KeyGatherer::gather(&map, &TimeInfo::at(15), ForceParent::None);
        assert_eq!(g.point(-1).map(|p| p.frame), Some(0));
        assert_eq!(g.point(0).map(|p| p.frame), Some(10));
        assert_eq!(g.point(1).map(|p| p.frame), Some(20));
        assert_eq!(g.point(2).map(|p| p.frame), Some(30));
        assert!((g.point(0).map_or(0.0, |p| p.relative) + 5.0).abs() < 1e-6);
        assert!((g.blend_ratio().unwrap_or(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn exact_frame_short_circuits() {
        let map = keys(&[0, 10]);
        let g = KeyGatherer::gather(&map, &TimeInfo::at(10), ForceParent::None);
        assert!(g.has_same_frame());
        assert!(g.is_single());
        assert!(g.point(1).is_none());
    }

    #[test]
    fn looped_gather_wraps_past_the_end() {
        let map = keys(&[0, 10]);
        let g = KeyGatherer::gather(&map, &TimeInfo::new(15, 19, true), ForceParent::None);
        let next = g.point(1).expect("wrapped key");
        assert_eq!(next.frame, 0);
        assert!((next.relative - 5.0).abs() < 1e-6);
    }

    #[test]
    fn assigned_parent_filters_foreign_keys() {
        let mut map = keys(&[0, 10]);
        if let Some(k) = map.get_mut(&10) {
            k.parent = Some(5);
        }
        let g = KeyGatherer::gather(&map, &TimeInfo::at(5), ForceParent::Assigned(None));
        assert!(g.is_single());
        assert_eq!(g.single_point().map(|p| p.frame), Some(0));
    }

    #[test]
    fn forward_only_gather_reports_its_owner() {
        let mut map = keys(&[0, 10, 20]);
        for (f, owner) in [(0, 1), (10, 2), (20, 2)] {
            if let Some(k) = map.get_mut(&f) {
                k.parent = Some(owner);
            }
        }
        let g = KeyGatherer::gather(&map, &TimeInfo::at(5), ForceParent::Assigned(Some(2)));
        assert!(g.is_single());
        assert_eq!(g.single_point().map(|p| p.frame), Some(10));
        assert_eq!(g.point(2).map(|p| p.frame), Some(20));
        assert_eq!(g.parent(), Some(2));

        let unfiltered = KeyGatherer::gather(&map, &TimeInfo::at(5), ForceParent::None);
        assert_eq!(unfiltered.parent(), Some(1));
        assert!(!unfiltered.is_single());
    }
}
