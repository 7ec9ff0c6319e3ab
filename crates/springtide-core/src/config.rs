#![forbid(unsafe_code)]

//! Transition configuration: motion, value range, and lifecycle policy.
//!
//! All tunables for one transition set live in [`TransitionConfig`], which
//! can be built in code or, with the `config` feature, loaded from TOML or
//! JSON.
//!
//! # Loading
//!
//! ```toml
//! [motion.open.spring]
//! stiffness = 170.0
//! damping = 26.0
//!
//! [motion.close]
//! fixed = 150
//!
//! [range]
//! from = 0.0
//! to = { open = 1.0, close = -1.0 }
//!
//! [policy]
//! keep_closed = true
//! ```
//!
//! ```rust,ignore
//! let config = TransitionConfig::load_toml_file("transitions.toml")?;
//! ```
//!
//! # Defaults
//!
//! `TransitionConfig::default()` is a single spring (mass 1, stiffness 100,
//! damping 10) shared by both directions, travelling `0.0 → 1.0`, dropping
//! records once closed, and mounting initial items at rest.

#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::solver::SpringParams;
use crate::stage::Direction;

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// How one direction of a transition moves.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum Motion {
    /// Physically simulated spring, settled by the settle detector.
    Spring(SpringParams),
    /// Jump to the target on the next frame, then complete after the
    /// duration (serialized as integer milliseconds).
    Fixed(#[cfg_attr(feature = "config", serde(with = "duration_millis"))] Duration),
}

impl Default for Motion {
    fn default() -> Self {
        Self::Spring(SpringParams::default())
    }
}

impl From<SpringParams> for Motion {
    fn from(params: SpringParams) -> Self {
        Self::Spring(params)
    }
}

impl From<Duration> for Motion {
    fn from(duration: Duration) -> Self {
        Self::Fixed(duration)
    }
}

impl Motion {
    /// Fixed-duration motion of `ms` milliseconds.
    #[must_use]
    pub fn fixed_millis(ms: u64) -> Self {
        Self::Fixed(Duration::from_millis(ms))
    }

    /// List parameter problems. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        match self {
            Self::Spring(params) => params.validate(),
            Self::Fixed(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Directional
// ---------------------------------------------------------------------------

/// A setting that is either shared by both directions or split per direction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum Directional<T> {
    /// Separate settings for opening and closing.
    Split {
        /// Used while opening.
        open: T,
        /// Used while closing.
        close: T,
    },
    /// One setting for both directions.
    Both(T),
}

impl<T: Default> Default for Directional<T> {
    fn default() -> Self {
        Self::Both(T::default())
    }
}

impl<T> From<T> for Directional<T> {
    fn from(value: T) -> Self {
        Self::Both(value)
    }
}

impl<T> Directional<T> {
    /// Setting used while opening.
    #[inline]
    pub fn open(&self) -> &T {
        match self {
            Self::Both(value) => value,
            Self::Split { open, .. } => open,
        }
    }

    /// Setting used while closing.
    #[inline]
    pub fn close(&self) -> &T {
        match self {
            Self::Both(value) => value,
            Self::Split { close, .. } => close,
        }
    }

    /// Setting used for `direction`.
    #[inline]
    pub fn get(&self, direction: Direction) -> &T {
        match direction {
            Direction::Open => self.open(),
            Direction::Close => self.close(),
        }
    }
}

impl<T: PartialEq> Directional<T> {
    /// Whether both directions resolve to equal settings.
    pub fn is_shared(&self) -> bool {
        match self {
            Self::Both(_) => true,
            Self::Split { open, close } => open == close,
        }
    }
}

// ---------------------------------------------------------------------------
// Value range
// ---------------------------------------------------------------------------

/// Where progress ends up when an item settles.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum RangeTarget {
    /// Open at the value; close back to `from`.
    Symmetric(f64),
    /// Open and close toward different values.
    Asymmetric {
        /// Rest value once opened.
        open: f64,
        /// Rest value once closed.
        close: f64,
    },
}

/// The numeric interval a transition's progress travels across.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct ValueRange {
    /// Progress of a freshly appeared item.
    pub from: f64,
    /// Rest targets.
    pub to: RangeTarget,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

impl ValueRange {
    /// Symmetric range `from → to → from`.
    #[must_use]
    pub fn new(from: f64, to: f64) -> Self {
        Self {
            from,
            to: RangeTarget::Symmetric(to),
        }
    }

    /// Asymmetric range `from → open`, then `→ close`.
    #[must_use]
    pub fn asymmetric(from: f64, open: f64, close: f64) -> Self {
        Self {
            from,
            to: RangeTarget::Asymmetric { open, close },
        }
    }

    /// Rest value once opened.
    #[inline]
    #[must_use]
    pub fn open_target(&self) -> f64 {
        match self.to {
            RangeTarget::Symmetric(to) => to,
            RangeTarget::Asymmetric { open, .. } => open,
        }
    }

    /// Rest value once closed.
    #[inline]
    #[must_use]
    pub fn close_target(&self) -> f64 {
        match self.to {
            RangeTarget::Symmetric(_) => self.from,
            RangeTarget::Asymmetric { close, .. } => close,
        }
    }

    /// Rest value at the end of `direction`.
    #[inline]
    #[must_use]
    pub fn target(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Open => self.open_target(),
            Direction::Close => self.close_target(),
        }
    }

    /// List range problems. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("from", self.from),
            ("open target", self.open_target()),
            ("close target", self.close_target()),
        ] {
            if !value.is_finite() {
                errors.push(format!("range {name} must be finite, got {value}"));
            }
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How items present when a transition set starts are mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum InitialMount {
    /// Mount at rest in `opened`, progress at the open target.
    #[default]
    Opened,
    /// Mount through `open` and animate in like any new item.
    Animate,
}

/// Lifecycle policy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TransitionPolicy {
    /// Retain records at `closed` instead of dropping them.
    pub keep_closed: bool,
    /// Mounting of the initial live list.
    pub initial: InitialMount,
}

// ---------------------------------------------------------------------------
// TransitionConfig
// ---------------------------------------------------------------------------

/// Complete configuration of one transition set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TransitionConfig {
    /// Motion per direction.
    pub motion: Directional<Motion>,
    /// Travelled interval.
    pub range: ValueRange,
    /// Lifecycle policy.
    pub policy: TransitionPolicy,
}

impl TransitionConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one spring for both directions.
    #[must_use]
    pub fn with_spring(mut self, params: SpringParams) -> Self {
        self.motion = Directional::Both(Motion::Spring(params));
        self
    }

    /// Use one fixed duration for both directions.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.motion = Directional::Both(Motion::Fixed(duration));
        self
    }

    /// Use separate motions for opening and closing.
    #[must_use]
    pub fn with_split_motion(mut self, open: impl Into<Motion>, close: impl Into<Motion>) -> Self {
        self.motion = Directional::Split {
            open: open.into(),
            close: close.into(),
        };
        self
    }

    /// Set the directional motion directly.
    #[must_use]
    pub fn with_motion(mut self, motion: impl Into<Directional<Motion>>) -> Self {
        self.motion = motion.into();
        self
    }

    /// Set the travelled interval.
    #[must_use]
    pub fn with_range(mut self, range: ValueRange) -> Self {
        self.range = range;
        self
    }

    /// Set the whole policy.
    #[must_use]
    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retain records at `closed`.
    #[must_use]
    pub fn keep_closed(mut self, keep: bool) -> Self {
        self.policy.keep_closed = keep;
        self
    }

    /// Set initial mounting.
    #[must_use]
    pub fn initial(mut self, initial: InitialMount) -> Self {
        self.policy.initial = initial;
        self
    }

    /// Validate all parameters.
    ///
    /// Returns a list of problems, each prefixed with where it was found.
    /// An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match &self.motion {
            Directional::Both(motion) => {
                errors.extend(motion.validate().into_iter().map(|e| format!("motion: {e}")));
            }
            Directional::Split { open, close } => {
                errors.extend(open.validate().into_iter().map(|e| format!("motion.open: {e}")));
                errors.extend(
                    close
                        .validate()
                        .into_iter()
                        .map(|e| format!("motion.close: {e}")),
                );
            }
        }
        errors.extend(self.range.validate());
        errors
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load from a TOML string and reject invalid parameters.
    #[cfg(feature = "config")]
    pub fn load_toml_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_toml_str(s)?.validated()
    }

    /// Load from a TOML file and reject invalid parameters.
    #[cfg(feature = "config")]
    pub fn load_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)?.validated()
    }

    /// Load from a JSON string and reject invalid parameters.
    #[cfg(feature = "config")]
    pub fn load_json_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_json_str(s)?.validated()
    }

    /// Return `self` if valid, otherwise every problem found.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File system error.
    #[cfg(feature = "config")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[cfg(feature = "config")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parse error.
    #[cfg(feature = "config")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parsed parameters violate the caller contract.
    #[error("invalid transition config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[cfg(feature = "config")]
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
