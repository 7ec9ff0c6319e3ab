#![forbid(unsafe_code)]

//! Per-item transition lifecycle.
//!
//! ```text
//!            appear                 begin            settle
//!   absent ─────────▶ open ─────────▶ opening ───────▶ opened
//!     ▲                ▲ │               │                │
//!     │        reappear│ │vanish  vanish │         vanish │
//!     │                │ ▼               ▼                ▼
//!   (drop) ◀── closed ◀─── closing ◀───────────────── close
//!            settle          begin
//! ```
//!
//! `open` and `close` are staging stages: they last exactly one scheduling
//! tick so consumers observe the pre-animation value before motion begins.
//!
//! # Invariants
//!
//! 1. Every stage belongs to exactly one [`Direction`] family.
//! 2. Redirection always lands on a staging stage, never on a rest stage.
//! 3. A stage never transitions to itself.

use std::fmt;

/// Direction a record travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward the open target.
    Open,
    /// Toward the close target.
    Close,
}

impl Direction {
    /// The other direction.
    #[inline]
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Open => Self::Close,
            Self::Close => Self::Open,
        }
    }

    /// Staging stage that starts travel in this direction.
    #[inline]
    #[must_use]
    pub const fn staging(self) -> Stage {
        match self {
            Self::Open => Stage::Open,
            Self::Close => Stage::Close,
        }
    }

    /// Animating stage for this direction.
    #[inline]
    #[must_use]
    pub const fn animating(self) -> Stage {
        match self {
            Self::Open => Stage::Opening,
            Self::Close => Stage::Closing,
        }
    }

    /// Rest stage at the end of this direction.
    #[inline]
    #[must_use]
    pub const fn rest(self) -> Stage {
        match self {
            Self::Open => Stage::Opened,
            Self::Close => Stage::Closed,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Close => "close",
        })
    }
}

/// One of the six lifecycle stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Appeared; motion starts next tick.
    Open,
    /// Travelling toward the open target.
    Opening,
    /// At rest at the open target.
    Opened,
    /// Vanished; motion starts next tick.
    Close,
    /// Travelling toward the close target.
    Closing,
    /// At rest at the close target.
    Closed,
}

impl Stage {
    /// Family this stage belongs to.
    #[inline]
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Open | Self::Opening | Self::Opened => Direction::Open,
            Self::Close | Self::Closing | Self::Closed => Direction::Close,
        }
    }

    /// `open`, `opening` or `opened`.
    #[inline]
    #[must_use]
    pub const fn is_open_family(self) -> bool {
        matches!(self.direction(), Direction::Open)
    }

    /// `close`, `closing` or `closed`.
    #[inline]
    #[must_use]
    pub const fn is_close_family(self) -> bool {
        matches!(self.direction(), Direction::Close)
    }

    /// One-tick staging stage (`open` or `close`).
    #[inline]
    #[must_use]
    pub const fn is_staging(self) -> bool {
        matches!(self, Self::Open | Self::Close)
    }

    /// Driver-bound stage (`opening` or `closing`).
    #[inline]
    #[must_use]
    pub const fn is_animating(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    /// Rest stage (`opened` or `closed`).
    #[inline]
    #[must_use]
    pub const fn is_at_rest(self) -> bool {
        matches!(self, Self::Opened | Self::Closed)
    }

    /// Staging → animating. `None` for any other stage.
    #[must_use]
    pub const fn begin(self) -> Option<Self> {
        match self {
            Self::Open => Some(Self::Opening),
            Self::Close => Some(Self::Closing),
            _ => None,
        }
    }

    /// Animating → rest. `None` for any other stage.
    #[must_use]
    pub const fn settle(self) -> Option<Self> {
        match self {
            Self::Opening => Some(Self::Opened),
            Self::Closing => Some(Self::Closed),
            _ => None,
        }
    }

    /// Interrupt toward `direction`.
    ///
    /// Returns the staging stage of `direction` when this stage belongs to
    /// the other family, or `None` when already travelling that way.
    #[must_use]
    pub const fn redirect(self, direction: Direction) -> Option<Self> {
        match (self.direction(), direction) {
            (Direction::Open, Direction::Close) => Some(Self::Close),
            (Direction::Close, Direction::Open) => Some(Self::Open),
            _ => None,
        }
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.begin() == Some(next)
            || self.settle() == Some(next)
            || self.redirect(next.direction()) == Some(next)
    }

    /// Lowercase stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Opening => "opening",
            Self::Opened => "opened",
            Self::Close => "close",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Stage; 6] = [
        Stage::Open,
        Stage::Opening,
        Stage::Opened,
        Stage::Close,
        Stage::Closing,
        Stage::Closed,
    ];

    #[test]
    fn families_partition_stages() {
        for stage in ALL {
            assert_ne!(stage.is_open_family(), stage.is_close_family(), "{stage}");
            let kinds = [stage.is_staging(), stage.is_animating(), stage.is_at_rest()];
            assert_eq!(kinds.iter().filter(|k| **k).count(), 1, "{stage}");
        }
    }

    #[test]
    fn forward_path() {
        assert_eq!(Stage::Open.begin(), Some(Stage::Opening));
        assert_eq!(Stage::Opening.settle(), Some(Stage::Opened));
        assert_eq!(Stage::Close.begin(), Some(Stage::Closing));
        assert_eq!(Stage::Closing.settle(), Some(Stage::Closed));
        assert_eq!(Stage::Opened.begin(), None);
        assert_eq!(Stage::Open.settle(), None);
    }

    #[test]
    fn redirect_lands_on_staging() {
        for stage in ALL {
            for direction in [Direction::Open, Direction::Close] {
                match stage.redirect(direction) {
                    Some(next) => {
                        assert!(next.is_staging());
                        assert_eq!(next.direction(), direction);
                        assert_ne!(stage.direction(), direction);
                    }
                    None => assert_eq!(stage.direction(), direction),
                }
            }
        }
    }

    #[test]
    fn graph_edges() {
        let edges = [
            (Stage::Open, Stage::Opening),
            (Stage::Open, Stage::Close),
            (Stage::Opening, Stage::Opened),
            (Stage::Opening, Stage::Close),
            (Stage::Opened, Stage::Close),
            (Stage::Close, Stage::Closing),
            (Stage::Close, Stage::Open),
            (Stage::Closing, Stage::Closed),
            (Stage::Closing, Stage::Open),
            (Stage::Closed, Stage::Open),
        ];
        for from in ALL {
            for to in ALL {
                let expected = edges.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn interruption_never_reaches_rest_directly() {
        assert!(!Stage::Opening.can_transition_to(Stage::Closed));
        assert!(!Stage::Closing.can_transition_to(Stage::Opened));
    }

    #[test]
    fn direction_helpers() {
        assert_eq!(Direction::Open.reversed(), Direction::Close);
        assert_eq!(Direction::Close.staging(), Stage::Close);
        assert_eq!(Direction::Open.animating(), Stage::Opening);
        assert_eq!(Direction::Close.rest(), Stage::Closed);
        assert_eq!(Stage::Closing.to_string(), "closing");
    }
}
