#![forbid(unsafe_code)]

//! Closed-form damped harmonic oscillator.
//!
//! Evaluates the released-spring curve directly from elapsed time instead of
//! integrating step by step, so the same parameters always produce the same
//! trajectory regardless of frame pacing.
//!
//! The curve describes fractional travel from `0.0` (release) toward `1.0`
//! (rest):
//!
//!   ω0 = √(stiffness / mass)
//!   ζ  = damping / (2·√(stiffness·mass))
//!
//! - Underdamped (ζ < 1): `1 − e^(−ζ·ω0·t)·(cos(ωd·t) + B·sin(ωd·t))`
//!   with `ωd = ω0·√(1 − ζ²)`.
//! - Critically/over-damped (ζ ≥ 1): `1 − (1 + B·t)·e^(−ω0·t)`.
//!
//! `B` is fixed by `progress(0) = 0` and `progress'(0) = initial_velocity`.
//!
//! # Invariants
//!
//! 1. `progress(0.0) == 0.0` for every valid parameter set.
//! 2. `progress(t) → 1.0` as `t → ∞` whenever `damping > 0`.
//! 3. The solver holds no state; evaluation order does not matter.
//!
//! # Failure Modes
//!
//! - Non-positive mass or stiffness, negative damping, or non-finite values
//!   are caller bugs and panic in [`SpringSolver::new`].
//! - Zero damping oscillates forever and never settles.

use std::time::Duration;

/// Default settle threshold: `|1 − progress|` below which a frame counts
/// toward settling.
pub const DEFAULT_SETTLE_THRESHOLD: f64 = 0.01;

/// Physical parameters of a released spring.
///
/// Immutable once a driver starts; drivers copy the parameters they run with.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SpringParams {
    /// Mass of the moving body. Must be positive.
    pub mass: f64,
    /// Restoring force strength. Must be positive.
    pub stiffness: f64,
    /// Velocity drag. Must be non-negative.
    pub damping: f64,
    /// Velocity at release, in progress units per second.
    pub initial_velocity: f64,
    /// Settle threshold on `|1 − progress|`.
    pub threshold: f64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            stiffness: 100.0,
            damping: 10.0,
            initial_velocity: 0.0,
            threshold: DEFAULT_SETTLE_THRESHOLD,
        }
    }
}

impl SpringParams {
    /// Create parameters with zero initial velocity and the default threshold.
    #[must_use]
    pub fn new(mass: f64, stiffness: f64, damping: f64) -> Self {
        Self {
            mass,
            stiffness,
            damping,
            ..Self::default()
        }
    }

    /// Set the release velocity (builder pattern).
    #[must_use]
    pub fn with_initial_velocity(mut self, velocity: f64) -> Self {
        self.initial_velocity = velocity;
        self
    }

    /// Set the settle threshold (builder pattern).
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Natural angular frequency ω0.
    #[inline]
    #[must_use]
    pub fn natural_frequency(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }

    /// Damping ratio ζ.
    #[inline]
    #[must_use]
    pub fn damping_ratio(&self) -> f64 {
        self.damping / (2.0 * (self.stiffness * self.mass).sqrt())
    }

    /// Damping coefficient at which ζ = 1.
    #[must_use]
    pub fn critical_damping(&self) -> f64 {
        2.0 * (self.stiffness * self.mass).sqrt()
    }

    /// Whether the curve oscillates around the rest position.
    #[must_use]
    pub fn is_underdamped(&self) -> bool {
        self.damping_ratio() < 1.0
    }

    /// Whether damping sits at the critical value (within 0.01).
    #[must_use]
    pub fn is_critically_damped(&self) -> bool {
        (self.damping - self.critical_damping()).abs() < 0.01
    }

    /// Whether the curve creeps toward rest without crossing it.
    #[must_use]
    pub fn is_overdamped(&self) -> bool {
        self.damping > self.critical_damping()
    }

    /// List parameter problems. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.mass.is_finite() && self.mass > 0.0) {
            errors.push(format!("spring mass must be positive, got {}", self.mass));
        }
        if !(self.stiffness.is_finite() && self.stiffness > 0.0) {
            errors.push(format!(
                "spring stiffness must be positive, got {}",
                self.stiffness
            ));
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            errors.push(format!(
                "spring damping must be non-negative, got {}",
                self.damping
            ));
        }
        if !self.initial_velocity.is_finite() {
            errors.push(format!(
                "spring initial velocity must be finite, got {}",
                self.initial_velocity
            ));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            errors.push(format!(
                "spring threshold must be positive, got {}",
                self.threshold
            ));
        }
        errors
    }

    /// Build the solver for these parameters.
    ///
    /// # Panics
    ///
    /// Panics if the parameters violate the caller contract (see
    /// [`validate`](Self::validate)).
    #[must_use]
    pub fn solver(&self) -> SpringSolver {
        SpringSolver::new(self)
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Precomputed closed-form curve for one parameter set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringSolver {
    w0: f64,
    zeta: f64,
    wd: f64,
    b: f64,
}

impl SpringSolver {
    /// Precompute ω0, ζ, ωd and the velocity coefficient `B`.
    ///
    /// # Panics
    ///
    /// Panics on non-positive mass or stiffness, negative damping, or
    /// non-finite values.
    #[must_use]
    pub fn new(params: &SpringParams) -> Self {
        assert!(
            params.mass.is_finite() && params.mass > 0.0,
            "spring mass must be positive, got {}",
            params.mass
        );
        assert!(
            params.stiffness.is_finite() && params.stiffness > 0.0,
            "spring stiffness must be positive, got {}",
            params.stiffness
        );
        assert!(
            params.damping.is_finite() && params.damping >= 0.0,
            "spring damping must be non-negative, got {}",
            params.damping
        );
        assert!(
            params.initial_velocity.is_finite(),
            "spring initial velocity must be finite, got {}",
            params.initial_velocity
        );

        let w0 = params.natural_frequency();
        let zeta = params.damping_ratio();
        let v0 = params.initial_velocity;
        let (wd, b) = if zeta < 1.0 {
            let wd = w0 * (1.0 - zeta * zeta).sqrt();
            (wd, (zeta * w0 - v0) / wd)
        } else {
            (0.0, w0 - v0)
        };

        Self { w0, zeta, wd, b }
    }

    /// Natural angular frequency ω0.
    #[inline]
    #[must_use]
    pub fn natural_frequency(&self) -> f64 {
        self.w0
    }

    /// Damping ratio ζ.
    #[inline]
    #[must_use]
    pub fn damping_ratio(&self) -> f64 {
        self.zeta
    }

    /// Progress `t` seconds after release. Negative `t` is treated as zero.
    #[must_use]
    pub fn progress(&self, t: f64) -> f64 {
        let t = t.max(0.0);
        let delta = if self.zeta < 1.0 {
            (-t * self.zeta * self.w0).exp() * ((self.wd * t).cos() + self.b * (self.wd * t).sin())
        } else {
            (1.0 + self.b * t) * (-t * self.w0).exp()
        };
        1.0 - delta
    }

    /// Progress after `elapsed` wall time.
    #[inline]
    #[must_use]
    pub fn at(&self, elapsed: Duration) -> f64 {
        self.progress(elapsed.as_secs_f64())
    }
}

/// Map a unit proportion onto the interval `from → to`.
///
/// Proportions outside `[0, 1]` extrapolate, which is how spring overshoot
/// reaches the consumer.
#[inline]
#[must_use]
pub fn lerp(from: f64, to: f64, proportion: f64) -> f64 {
    from + (to - from) * proportion
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Common spring configurations for UI motion.
pub mod presets {
    use super::SpringParams;

    /// Gentle spring: slow, with a soft bounce.
    #[must_use]
    pub fn gentle() -> SpringParams {
        SpringParams::new(1.0, 120.0, 14.0)
    }

    /// Wobbly spring: visible overshoot.
    #[must_use]
    pub fn wobbly() -> SpringParams {
        SpringParams::new(1.0, 180.0, 12.0)
    }

    /// Stiff spring: snappy with a slight bounce.
    #[must_use]
    pub fn stiff() -> SpringParams {
        SpringParams::new(1.0, 400.0, 30.0)
    }

    /// Slow spring: low stiffness for background motion.
    #[must_use]
    pub fn slow() -> SpringParams {
        SpringParams::new(1.0, 50.0, 14.0)
    }

    /// Molasses: critically damped, no overshoot.
    #[must_use]
    pub fn molasses() -> SpringParams {
        SpringParams::new(1.0, 100.0, 20.0)
    }

    /// Critically damped spring at stiffness 170.
    #[must_use]
    pub fn critical() -> SpringParams {
        let k: f64 = 170.0;
        SpringParams::new(1.0, k, 2.0 * k.sqrt())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
