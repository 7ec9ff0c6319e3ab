#![forbid(unsafe_code)]

//! Settle detection for sampled spring curves.
//!
//! A run is settled once `|1 − progress|` stays within the threshold for
//! [`SETTLE_QUORUM`] consecutive frames. A single frame outside the threshold
//! resets the count, so a curve that grazes the threshold near a turning
//! point and then swings back out keeps animating.

use crate::solver::DEFAULT_SETTLE_THRESHOLD;

/// Consecutive in-threshold frames required before a run settles.
pub const SETTLE_QUORUM: u32 = 10;

/// Outcome of observing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleVerdict {
    /// Keep sampling; report this frame's progress.
    Running,
    /// Quorum reached; stop sampling and snap to the target.
    Settled,
}

/// Debounced convergence detector.
#[derive(Debug, Clone, PartialEq)]
pub struct SettleDetector {
    threshold: f64,
    quorum: u32,
    consecutive: u32,
}

impl Default for SettleDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_THRESHOLD)
    }
}

impl SettleDetector {
    /// Create a detector with the standard quorum.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is not a positive finite number.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        assert!(
            threshold.is_finite() && threshold > 0.0,
            "settle threshold must be positive, got {threshold}"
        );
        Self {
            threshold,
            quorum: SETTLE_QUORUM,
            consecutive: 0,
        }
    }

    /// Threshold on `|1 − progress|`.
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Current run of consecutive in-threshold frames.
    #[inline]
    #[must_use]
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Feed one sampled progress value.
    pub fn observe(&mut self, progress: f64) -> SettleVerdict {
        if (1.0 - progress).abs() <= self.threshold {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }

        if self.consecutive >= self.quorum {
            SettleVerdict::Settled
        } else {
            SettleVerdict::Running
        }
    }

    /// Forget any partial run.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SpringParams;

    #[test]
    fn settles_after_quorum() {
        let mut detector = SettleDetector::default();
        for _ in 0..SETTLE_QUORUM - 1 {
            assert_eq!(detector.observe(1.0), SettleVerdict::Running);
        }
        assert_eq!(detector.observe(1.0), SettleVerdict::Settled);
    }

    #[test]
    fn excursion_after_nine_resets() {
        let mut detector = SettleDetector::default();
        for _ in 0..9 {
            detector.observe(0.995);
        }
        assert_eq!(detector.consecutive(), 9);
        assert_eq!(detector.observe(0.9), SettleVerdict::Running);
        assert_eq!(detector.consecutive(), 0);

        for _ in 0..9 {
            assert_eq!(detector.observe(1.004), SettleVerdict::Running);
        }
        assert_eq!(detector.observe(1.0), SettleVerdict::Settled);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut detector = SettleDetector::new(0.5);
        detector.observe(0.5);
        assert_eq!(detector.consecutive(), 1);
    }

    #[test]
    fn overshoot_counts_symmetrically() {
        let mut detector = SettleDetector::new(0.01);
        detector.observe(1.009);
        detector.observe(0.991);
        assert_eq!(detector.consecutive(), 2);
        detector.observe(1.02);
        assert_eq!(detector.consecutive(), 0);
    }

    #[test]
    fn reset_clears_run() {
        let mut detector = SettleDetector::default();
        detector.observe(1.0);
        detector.reset();
        assert_eq!(detector.consecutive(), 0);
    }

    #[test]
    #[should_panic(expected = "settle threshold must be positive")]
    fn zero_threshold_panics() {
        let _ = SettleDetector::new(0.0);
    }

    #[test]
    fn default_spring_settles_within_two_seconds_at_60fps() {
        let solver = SpringParams::default().solver();
        let mut detector = SettleDetector::default();
        let settled_at = (1..=120).find(|frame| {
            let t = *frame as f64 / 60.0;
            detector.observe(solver.progress(t)) == SettleVerdict::Settled
        });
        let frame = settled_at.expect("default spring should settle within 120 frames");
        assert!(frame > SETTLE_QUORUM as usize);
    }
}
