// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the gain policies of the visual-servo control law.

/// Adaptive gain: a smooth interpolation between a gain for small errors and
/// a gain for large ones.
///
/// `value(x)` follows `(l0 - linf) * exp(-s0 * x / (l0 - linf)) + linf`, so it
/// equals `gain_at_zero` at zero error, approaches `gain_at_infinity` for
/// large errors, and starts with slope `-slope_at_zero`. Large gains near the
/// goal speed up the final approach without making the far-field aggressive.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveGain {
    gain_at_zero: f64,
    gain_at_infinity: f64,
    slope_at_zero: f64,
}

impl AdaptiveGain {
    /// Creates an adaptive gain from its two asymptotic gains and the slope at
    /// zero error.
    pub fn new(gain_at_zero: f64, gain_at_infinity: f64, slope_at_zero: f64) -> Self {
        AdaptiveGain {
            gain_at_zero,
            gain_at_infinity,
            slope_at_zero,
        }
    }

    /// Evaluates the gain for an error norm.
    pub fn value(&self, error_norm: f64) -> f64 {
        let spread = self.gain_at_zero - self.gain_at_infinity;
        if spread.abs() < f64::EPSILON {
            return self.gain_at_infinity;
        }
        spread * (-self.slope_at_zero * error_norm / spread).exp() + self.gain_at_infinity
    }
}

/// Gain policy of the control law: a constant scalar or an adaptive
/// functional of the error norm.
#[derive(Debug, Clone, Copy)]
pub enum Gain {
    /// The same gain for every error.
    Constant(f64),
    /// Error-dependent gain.
    Adaptive(AdaptiveGain),
}

impl Gain {
    /// Evaluates the gain for an error norm.
    pub fn value(&self, error_norm: f64) -> f64 {
        match self {
            Gain::Constant(gain) => *gain,
            Gain::Adaptive(adaptive) => adaptive.value(error_norm),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constant_gain_ignores_the_error() {
        let gain = Gain::Constant(0.8);
        assert_eq!(gain.value(0.), 0.8);
        assert_eq!(gain.value(10.), 0.8);
    }

    #[test]
    fn adaptive_gain_hits_both_asymptotes() {
        let gain = AdaptiveGain::new(3., 0.4, 30.);
        assert!((gain.value(0.) - 3.).abs() < 1e-12);
        assert!((gain.value(1e3) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn adaptive_gain_decreases_monotonically() {
        let gain = AdaptiveGain::new(3., 0.4, 30.);
        let mut previous = gain.value(0.);
        for step in 1..100 {
            let current = gain.value(step as f64 * 0.01);
            assert!(current < previous);
            previous = current;
        }
    }
}
