#![forbid(unsafe_code)]

//! Transition records and generation ids.

use std::fmt;

use crate::stage::Stage;

/// Identifier of one reconciliation batch.
///
/// Every stage change produced by a single update shares one id, which is
/// how drivers are correlated with the records they animate and how stale
/// drivers are detected after an interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationId(u64);

impl GenerationId {
    /// Generation of records mounted at rest when a set starts.
    pub const INITIAL: Self = Self(0);

    /// Wrap a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Monotonic source of [`GenerationId`]s, starting after `INITIAL`.
#[derive(Debug, Clone)]
pub struct GenerationCounter {
    next: u64,
}

impl Default for GenerationCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationCounter {
    /// Create a counter whose first id is `1`.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Id the next [`advance`](Self::advance) will return.
    #[inline]
    #[must_use]
    pub const fn peek(&self) -> GenerationId {
        GenerationId(self.next)
    }

    /// Consume and return the next id.
    pub fn advance(&mut self) -> GenerationId {
        let id = GenerationId(self.next);
        self.next += 1;
        id
    }
}

/// Lifecycle state of one keyed item.
///
/// Records are only mutated by the reconciler (stage, generation, anchor)
/// and by generation-scoped driver callbacks (progress).
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord<K, T> {
    pub(crate) key: K,
    pub(crate) value: T,
    pub(crate) stage: Stage,
    pub(crate) progress: f64,
    pub(crate) generation: GenerationId,
    pub(crate) anchor: f64,
}

impl<K, T> TransitionRecord<K, T> {
    pub(crate) fn new(key: K, value: T, stage: Stage, progress: f64, generation: GenerationId) -> Self {
        Self {
            key,
            value,
            stage,
            progress,
            generation,
            anchor: progress,
        }
    }

    /// Identity extracted from the value.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Most recent value seen for this key.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Current lifecycle stage.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Externally observed progress.
    #[inline]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Generation that last redirected this record.
    #[inline]
    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    /// Progress when the current generation began; drivers interpolate
    /// from here toward the direction's target.
    #[inline]
    pub fn anchor(&self) -> f64 {
        self.anchor
    }

    /// Consume the record, keeping only its value.
    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_monotonic() {
        let mut counter = GenerationCounter::new();
        assert_eq!(counter.peek(), GenerationId::new(1));
        let a = counter.advance();
        let b = counter.advance();
        assert!(a < b);
        assert!(GenerationId::INITIAL < a);
        assert_eq!(counter.peek(), GenerationId::new(3));
    }

    #[test]
    fn new_record_anchors_at_progress() {
        let record = TransitionRecord::new("a", 1, Stage::Open, 0.25, GenerationId::new(4));
        assert_eq!(record.anchor(), 0.25);
        assert_eq!(record.generation().to_string(), "gen#4");
        assert_eq!(record.into_value(), 1);
    }
}
