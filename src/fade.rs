//! Gain curves for blending two sources.
//!
//! `position` runs from 0.0 (start of the blend) to 1.0 (end). Fade-in curves
//! rise from 0 to 1, fade-out curves fall from 1 to 0.

use crate::planner::{Transition, TransitionType};
use std::f64::consts::{FRAC_PI_2, PI};

/// Shape of a single fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeCurve {
    /// Constant rate of change.
    Linear,
    /// `sin`/`cos` pair keeping perceived loudness constant.
    EqualPower,
    /// Raised cosine: slow at both ends.
    SCurve,
    /// Fast start, slow finish.
    SquareRoot,
    /// Slow start, fast finish.
    Quadratic,
}

impl FadeCurve {
    #[must_use]
    pub fn fade_in(self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::SquareRoot => t.sqrt(),
            FadeCurve::Quadratic => t * t,
        }
    }

    #[must_use]
    pub fn fade_out(self, position: f64) -> f64 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::SquareRoot => (1.0 - t).sqrt(),
            FadeCurve::Quadratic => (1.0 - t) * (1.0 - t),
        }
    }
}

/// Outgoing and incoming curves used together for one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainCurve {
    pub fade_out: FadeCurve,
    pub fade_in: FadeCurve,
}

impl GainCurve {
    #[must_use]
    pub const fn symmetric(curve: FadeCurve) -> Self {
        Self { fade_out: curve, fade_in: curve }
    }

    /// Curve pair for a planned transition.
    #[must_use]
    pub fn for_transition(transition: &Transition) -> Self {
        match transition.transition_type {
            TransitionType::Crossfade => Self::symmetric(FadeCurve::Linear),
            TransitionType::Beatmatch => Self::symmetric(FadeCurve::EqualPower),
            TransitionType::Harmonic => Self::symmetric(harmonic_curve(transition.key_compatibility)),
            // Get out of the way quickly, let the bigger track arrive gradually.
            TransitionType::EnergyBuild => Self { fade_out: FadeCurve::Quadratic, fade_in: FadeCurve::SquareRoot },
            TransitionType::EnergyDrop => Self { fade_out: FadeCurve::SquareRoot, fade_in: FadeCurve::Quadratic },
        }
    }

    /// `(outgoing, incoming)` gains at `position`.
    #[must_use]
    pub fn gains(self, position: f64) -> (f64, f64) {
        (self.fade_out.fade_out(position), self.fade_in.fade_in(position))
    }
}

fn harmonic_curve(key_compatibility: f64) -> FadeCurve {
    if key_compatibility > 0.8 {
        FadeCurve::Linear
    } else if key_compatibility > 0.5 {
        FadeCurve::SCurve
    } else {
        FadeCurve::SquareRoot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVES: [FadeCurve; 5] = [
        FadeCurve::Linear,
        FadeCurve::EqualPower,
        FadeCurve::SCurve,
        FadeCurve::SquareRoot,
        FadeCurve::Quadratic,
    ];

    #[test]
    fn test_endpoints() {
        for curve in CURVES {
            assert!(curve.fade_in(0.0).abs() < 1e-9, "{curve:?}");
            assert!((curve.fade_in(1.0) - 1.0).abs() < 1e-9, "{curve:?}");
            assert!((curve.fade_out(0.0) - 1.0).abs() < 1e-9, "{curve:?}");
            assert!(curve.fade_out(1.0).abs() < 1e-9, "{curve:?}");
        }
    }

    #[test]
    fn test_curves_are_monotonic_and_bounded() {
        for curve in CURVES {
            let mut last_in = -1.0;
            let mut last_out = 2.0;
            for step in 0..=100 {
                let p = f64::from(step) / 100.0;
                let (i, o) = (curve.fade_in(p), curve.fade_out(p));
                assert!((0.0..=1.0).contains(&i) && (0.0..=1.0).contains(&o));
                assert!(i >= last_in && o <= last_out, "{curve:?} at {p}");
                last_in = i;
                last_out = o;
            }
        }
    }

    #[test]
    fn test_equal_power_keeps_constant_power() {
        for step in 0..=20 {
            let (o, i) = GainCurve::symmetric(FadeCurve::EqualPower).gains(f64::from(step) / 20.0);
            assert!((o * o + i * i - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_out_of_range_positions_are_clamped() {
        assert_eq!(FadeCurve::Linear.fade_in(1.5), 1.0);
        assert_eq!(FadeCurve::Linear.fade_out(-0.5), 1.0);
    }

    #[test]
    fn test_harmonic_curve_selection() {
        assert_eq!(harmonic_curve(1.0), FadeCurve::Linear);
        assert_eq!(harmonic_curve(0.83), FadeCurve::Linear);
        assert_eq!(harmonic_curve(0.67), FadeCurve::SCurve);
        assert_eq!(harmonic_curve(0.5), FadeCurve::SquareRoot);
    }
}
