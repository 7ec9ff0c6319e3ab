#![forbid(unsafe_code)]

//! Driver planning for one generation.
//!
//! When the opening and closing motions are equal, a single `Shared`
//! driver animates every record of the generation and each record maps the
//! common progress stream onto its own anchor and target. Otherwise each
//! direction that has records gets its own driver.
//!
//! # Invariants
//!
//! 1. At most one plan per `(generation, lane)`.
//! 2. A `Shared` plan never coexists with a directional plan.
//! 3. No records moving means no plan.

use std::fmt;

use smallvec::SmallVec;

use crate::config::{Directional, Motion};
use crate::record::GenerationId;
use crate::stage::Direction;

/// Which records of a generation a driver feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DriverLane {
    /// Both directions.
    Shared,
    /// Opening records only.
    Open,
    /// Closing records only.
    Close,
}

impl DriverLane {
    /// Lane dedicated to `direction`.
    #[inline]
    #[must_use]
    pub const fn of(direction: Direction) -> Self {
        match direction {
            Direction::Open => Self::Open,
            Direction::Close => Self::Close,
        }
    }

    /// Directions this lane feeds.
    #[must_use]
    pub const fn directions(self) -> &'static [Direction] {
        match self {
            Self::Shared => &[Direction::Open, Direction::Close],
            Self::Open => &[Direction::Open],
            Self::Close => &[Direction::Close],
        }
    }

    /// Whether this lane feeds records travelling in `direction`.
    #[inline]
    #[must_use]
    pub const fn covers(self, direction: Direction) -> bool {
        match self {
            Self::Shared => true,
            Self::Open => matches!(direction, Direction::Open),
            Self::Close => matches!(direction, Direction::Close),
        }
    }
}

impl fmt::Display for DriverLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shared => "shared",
            Self::Open => "open",
            Self::Close => "close",
        })
    }
}

/// Identity of a live driver. The engine keeps at most one per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriverKey {
    /// Generation the driver animates.
    pub generation: GenerationId,
    /// Records it feeds.
    pub lane: DriverLane,
}

impl DriverKey {
    /// Create a key.
    #[must_use]
    pub const fn new(generation: GenerationId, lane: DriverLane) -> Self {
        Self { generation, lane }
    }
}

impl fmt::Display for DriverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.generation, self.lane)
    }
}

/// A driver to launch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverPlan {
    /// Key the driver is registered under.
    pub key: DriverKey,
    /// Motion it runs.
    pub motion: Motion,
}

/// Decide which drivers `generation` needs.
///
/// `opening`/`closing` say whether any record of the generation entered
/// that direction's animating stage. A moving generation gets one `Shared`
/// driver when the motion is shared, otherwise one driver per direction
/// even if one direction has no records; that lane settles with nothing to
/// snap.
#[must_use]
pub fn plan_drivers(
    generation: GenerationId,
    motion: &Directional<Motion>,
    opening: bool,
    closing: bool,
) -> SmallVec<[DriverPlan; 2]> {
    let mut plans = SmallVec::new();
    if !opening && !closing {
        return plans;
    }

    if motion.is_shared() {
        plans.push(DriverPlan {
            key: DriverKey::new(generation, DriverLane::Shared),
            motion: *motion.open(),
        });
        return plans;
    }

    for direction in [Direction::Open, Direction::Close] {
        plans.push(DriverPlan {
            key: DriverKey::new(generation, DriverLane::of(direction)),
            motion: *motion.get(direction),
        });
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SpringParams;
    use std::time::Duration;

    fn split() -> Directional<Motion> {
        Directional::Split {
            open: Motion::Spring(SpringParams::default()),
            close: Motion::Fixed(Duration::from_millis(200)),
        }
    }

    #[test]
    fn shared_motion_yields_single_plan() {
        let g = GenerationId::new(3);
        let plans = plan_drivers(g, &Directional::default(), true, true);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].key, DriverKey::new(g, DriverLane::Shared));
    }

    #[test]
    fn split_motion_yields_one_plan_per_direction() {
        let g = GenerationId::new(3);
        let plans = plan_drivers(g, &split(), true, true);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].key.lane, DriverLane::Open);
        assert_eq!(plans[1].key.lane, DriverLane::Close);
        assert_eq!(plans[1].motion, Motion::fixed_millis(200));
    }

    #[test]
    fn split_motion_plans_idle_direction_too() {
        for (opening, closing) in [(false, true), (true, false)] {
            let plans = plan_drivers(GenerationId::new(1), &split(), opening, closing);
            let lanes: Vec<_> = plans.iter().map(|p| p.key.lane).collect();
            assert_eq!(lanes, vec![DriverLane::Open, DriverLane::Close]);
        }
    }

    #[test]
    fn equal_split_halves_share() {
        let motion = Directional::Split {
            open: Motion::fixed_millis(120),
            close: Motion::fixed_millis(120),
        };
        let plans = plan_drivers(GenerationId::new(1), &motion, true, false);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].key.lane, DriverLane::Shared);
    }

    #[test]
    fn idle_generation_has_no_plan() {
        assert!(plan_drivers(GenerationId::new(1), &split(), false, false).is_empty());
        assert!(plan_drivers(GenerationId::new(1), &Directional::default(), false, false).is_empty());
    }

    #[test]
    fn lane_coverage() {
        assert!(DriverLane::Shared.covers(Direction::Close));
        assert!(!DriverLane::Open.covers(Direction::Close));
        assert_eq!(DriverLane::Shared.directions().len(), 2);
        assert_eq!(DriverLane::of(Direction::Open), DriverLane::Open);
        assert_eq!(
            DriverKey::new(GenerationId::new(2), DriverLane::Close).to_string(),
            "gen#2/close"
        );
    }
}
