use serde::{Deserialize, Serialize};

/// A timeline position: whole frame plus thousandths of a frame.
///
/// Ordering compares the whole part first, then the thousandths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frame {
    value: i32,
    milli: i32,
}

impl Frame {
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self { value, milli: 0 }
    }

    /// Splits a fractional frame. Truncates toward zero like an integer cast.
    #[must_use]
    pub fn from_decimal(value: f32) -> Self {
        let whole = value as i32;
        Self { value: whole, milli: (1000.0 * (value - whole as f32)) as i32 }
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> i32 {
        self.value
    }

    #[inline]
    #[must_use]
    pub fn decimal(&self) -> f32 {
        self.value as f32 + self.milli as f32 * 0.001
    }

    #[inline]
    #[must_use]
    pub fn has_fraction(&self) -> bool {
        self.milli != 0
    }

    /// Shifts the whole part only.
    #[must_use]
    pub fn offset(self, frames: i32) -> Self {
        Self { value: self.value + frames, milli: self.milli }
    }

    /// True for frames usable as cache stamps.
    #[inline]
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.value >= 0
    }
}

impl From<i32> for Frame {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

/// The queried point in time and the timeline's playback range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeInfo {
    pub frame: Frame,
    /// Last frame of the timeline (inclusive).
    pub frame_max: i32,
    pub looped: bool,
}

impl TimeInfo {
    #[must_use]
    pub fn new(frame: impl Into<Frame>, frame_max: i32, looped: bool) -> Self {
        Self { frame: frame.into(), frame_max, looped }
    }

    #[must_use]
    pub fn at(frame: impl Into<Frame>) -> Self {
        Self { frame: frame.into(), frame_max: i32::MAX - 1, looped: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_split() {
        let f = Frame::from_decimal(3.25);
        assert_eq!(f.get(), 3);
        assert!(f.has_fraction());
        assert!((f.decimal() - 3.25).abs() < 1e-3);
        assert!(!Frame::new(7).has_fraction());
        assert!(Frame::from_decimal(2.5) < Frame::new(3));
    }
}
