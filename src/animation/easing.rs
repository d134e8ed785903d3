//! Easing curves applied to the blend ratio between two keyframes.
//!
//! All curves use the classic `(t, b, c, d)` signature: elapsed time `t`,
//! start value `b`, change `c` and duration `d`. Key blending always calls
//! them with `b = 0`, `c = 1` so the result is a ratio.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum EasingType {
    /// Holds the start value for the whole interval.
    None,
    #[default]
    Linear,
    Sine,
    Quad,
    Cubic,
    Quart,
    Quint,
    Expo,
    Circ,
    Back,
    Elastic,
    Bounce,
}

/// Which end of the interval the curve acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EasingRange {
    In,
    Out,
    #[default]
    InOut,
}

/// Easing configuration carried by each keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Easing {
    pub kind: EasingType,
    pub range: EasingRange,
    /// Blend between the curve (1.0) and plain linear (0.0).
    pub weight: f32,
}

impl Default for Easing {
    fn default() -> Self {
        Self { kind: EasingType::Linear, range: EasingRange::InOut, weight: 1.0 }
    }
}

impl Easing {
    #[must_use]
    pub fn new(kind: EasingType, range: EasingRange) -> Self {
        Self { kind, range, weight: 1.0 }
    }

    #[must_use]
    pub fn linear() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.weight)
    }

    /// Evaluates the curve, blending with linear by `weight` for curved types.
    #[must_use]
    pub fn calculate(&self, t: f32, b: f32, c: f32, d: f32) -> f32 {
        let result = evaluate(self.kind, self.range, t, b, c, d);
        if self.kind > EasingType::Linear {
            result * self.weight + linear(t, b, c, d) * (1.0 - self.weight)
        } else {
            result
        }
    }

    /// Blend ratio in `[0, 1]` (overshooting for `Back`/`Elastic`) for
    /// `elapsed` frames out of `duration`.
    #[inline]
    #[must_use]
    pub fn ratio(&self, elapsed: f32, duration: f32) -> f32 {
        self.calculate(elapsed, 0.0, 1.0, duration)
    }
}

#[inline]
fn linear(t: f32, b: f32, c: f32, d: f32) -> f32 {
    c * (t / d) + b
}

fn evaluate(kind: EasingType, range: EasingRange, t: f32, b: f32, c: f32, d: f32) -> f32 {
    macro_rules! by_range {
        ($in:ident, $out:ident, $in_out:ident) => {
            match range {
                EasingRange::In => $in(t, b, c, d),
                EasingRange::Out => $out(t, b, c, d),
                EasingRange::InOut => $in_out(t, b, c, d),
            }
        };
    }

    match kind {
        EasingType::None => b,
        EasingType::Linear => linear(t, b, c, d),
        EasingType::Sine => by_range!(sine_in, sine_out, sine_in_out),
        EasingType::Quad => by_range!(quad_in, quad_out, quad_in_out),
        EasingType::Cubic => by_range!(cubic_in, cubic_out, cubic_in_out),
        EasingType::Quart => by_range!(quart_in, quart_out, quart_in_out),
        EasingType::Quint => by_range!(quint_in, quint_out, quint_in_out),
        EasingType::Expo => by_range!(expo_in, expo_out, expo_in_out),
        EasingType::Circ => by_range!(circ_in, circ_out, circ_in_out),
        EasingType::Back => by_range!(back_in, back_out, back_in_out),
        EasingType::Elastic => by_range!(elastic_in, elastic_out, elastic_in_out),
        EasingType::Bounce => by_range!(bounce_in, bounce_out, bounce_in_out),
    }
}

// ============================================================================
// Sine
// ============================================================================

fn sine_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    -c * (t / d * FRAC_PI_2).cos() + c + b
}

fn sine_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    c * (t / d * FRAC_PI_2).sin() + b
}

fn sine_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    -c / 2.0 * ((PI * t / d).cos() - 1.0) + b
}

// ============================================================================
// Polynomial
// ============================================================================

fn quad_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d;
    c * t * t + b
}

fn quad_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d;
    -c * t * (t - 2.0) + b
}

fn quad_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / (d / 2.0);
    if t < 1.0 {
        c / 2.0 * t * t + b
    } else {
        let t = t - 1.0;
        -c / 2.0 * ((t - 2.0) * t - 1.0) + b
    }
}

fn cubic_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d;
    c * t * t * t + b
}

fn cubic_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d - 1.0;
    c * (t * t * t + 1.0) + b
}

fn cubic_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / (d / 2.0);
    if t < 1.0 {
        c / 2.0 * t * t * t + b
    } else {
        let t = t - 2.0;
        c / 2.0 * (t * t * t + 2.0) + b
    }
}

fn quart_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d;
    c * t.powi(4) + b
}

fn quart_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d - 1.0;
    -c * (t.powi(4) - 1.0) + b
}

fn quart_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / (d / 2.0);
    if t < 1.0 {
        c / 2.0 * t.powi(4) + b
    } else {
        let t = t - 2.0;
        -c / 2.0 * (t.powi(4) - 2.0) + b
    }
}

fn quint_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d;
    c * t.powi(5) + b
}

fn quint_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d - 1.0;
    c * (t.powi(5) + 1.0) + b
}

fn quint_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / (d / 2.0);
    if t < 1.0 {
        c / 2.0 * t.powi(5) + b
    } else {
        let t = t - 2.0;
        c / 2.0 * (t.powi(5) + 2.0) + b
    }
}

// ============================================================================
// Exponential & Circular
// ============================================================================

fn expo_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    if t == 0.0 { b } else { c * 2f32.powf(10.0 * (t / d - 1.0)) + b }
}

fn expo_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    if t == d { b + c } else { c * (1.0 - 2f32.powf(-10.0 * t / d)) + b }
}

fn expo_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    if t == 0.0 {
        return b;
    }
    if t == d {
        return b + c;
    }
    let t = t / (d / 2.0);
    if t < 1.0 {
        c / 2.0 * 2f32.powf(10.0 * (t - 1.0)) + b
    } else {
        c / 2.0 * (2.0 - 2f32.powf(-10.0 * (t - 1.0))) + b
    }
}

fn circ_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d;
    -c * ((1.0 - t * t).sqrt() - 1.0) + b
}

fn circ_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d - 1.0;
    c * (1.0 - t * t).sqrt() + b
}

fn circ_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / (d / 2.0);
    if t < 1.0 {
        -c / 2.0 * ((1.0 - t * t).sqrt() - 1.0) + b
    } else {
        let t = t - 2.0;
        c / 2.0 * ((1.0 - t * t).sqrt() + 1.0) + b
    }
}

// ============================================================================
// Overshooting
// ============================================================================

const BACK_OVERSHOOT: f32 = 1.701_58;

fn back_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let s = BACK_OVERSHOOT;
    let t = t / d;
    c * t * t * ((s + 1.0) * t - s) + b
}

fn back_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let s = BACK_OVERSHOOT;
    let t = t / d - 1.0;
    c * (t * t * ((s + 1.0) * t + s) + 1.0) + b
}

fn back_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let s = BACK_OVERSHOOT * 1.525;
    let t = t / (d / 2.0);
    if t < 1.0 {
        c / 2.0 * (t * t * ((s + 1.0) * t - s)) + b
    } else {
        let t = t - 2.0;
        c / 2.0 * (t * t * ((s + 1.0) * t + s) + 2.0) + b
    }
}

fn elastic_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    if t == 0.0 {
        return b;
    }
    let t = t / d;
    if t == 1.0 {
        return b + c;
    }
    let p = d * 0.3;
    let s = p / 4.0;
    let t = t - 1.0;
    let post = c * 2f32.powf(10.0 * t);
    -(post * ((t * d - s) * TAU / p).sin()) + b
}

fn elastic_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    if t == 0.0 {
        return b;
    }
    let t = t / d;
    if t == 1.0 {
        return b + c;
    }
    let p = d * 0.3;
    let s = p / 4.0;
    c * 2f32.powf(-10.0 * t) * ((t * d - s) * TAU / p).sin() + c + b
}

fn elastic_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    if t == 0.0 {
        return b;
    }
    let t = t / (d / 2.0);
    if t == 2.0 {
        return b + c;
    }
    let p = d * (0.3 * 1.5);
    let s = p / 4.0;
    let t = t - 1.0;
    if t < 0.0 {
        let post = c * 2f32.powf(10.0 * t);
        -0.5 * (post * ((t * d - s) * TAU / p).sin()) + b
    } else {
        let post = c * 2f32.powf(-10.0 * t);
        post * ((t * d - s) * TAU / p).sin() * 0.5 + c + b
    }
}

// ============================================================================
// Bounce
// ============================================================================

fn bounce_in(t: f32, b: f32, c: f32, d: f32) -> f32 {
    c - bounce_out(d - t, 0.0, c, d) + b
}

fn bounce_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d;
    if t < 1.0 / 2.75 {
        c * (7.5625 * t * t) + b
    } else if t < 2.0 / 2.75 {
        let t = t - 1.5 / 2.75;
        c * (7.5625 * t * t + 0.75) + b
    } else if t < 2.5 / 2.75 {
        let t = t - 2.25 / 2.75;
        c * (7.5625 * t * t + 0.9375) + b
    } else {
        let t = t - 2.625 / 2.75;
        c * (7.5625 * t * t + 0.984_375) + b
    }
}

fn bounce_in_out(t: f32, b: f32, c: f32, d: f32) -> f32 {
    if t < d / 2.0 {
        bounce_in(t * 2.0, 0.0, c, d) * 0.5 + b
    } else {
        bounce_out(t * 2.0 - d, 0.0, c, d) * 0.5 + c * 0.5 + b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EasingType; 12] = [
        EasingType::None,
        EasingType::Linear,
        EasingType::Sine,
        EasingType::Quad,
        EasingType::Cubic,
        EasingType::Quart,
        EasingType::Quint,
        EasingType::Expo,
        EasingType::Circ,
        EasingType::Back,
        EasingType::Elastic,
        EasingType::Bounce,
    ];

    #[test]
    fn curves_hit_their_endpoints() {
        for kind in ALL.into_iter().skip(1) {
            for range in [EasingRange::In, EasingRange::Out, EasingRange::InOut] {
                let e = Easing::new(kind, range);
                let start = e.ratio(0.0, 10.0);
                let end = e.ratio(10.0, 10.0);
                assert!(start.abs() < 1e-3, "{kind:?}/{range:?} start {start}");
                assert!((end - 1.0).abs() < 1e-3, "{kind:?}/{range:?} end {end}");
            }
        }
    }

    #[test]
    fn weight_zero_is_linear() {
        let e = Easing { kind: EasingType::Quad, range: EasingRange::In, weight: 0.0 };
        assert!((e.ratio(3.0, 10.0) - 0.3).abs() < 1e-6);
    }
}
