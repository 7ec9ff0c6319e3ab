#![forbid(unsafe_code)]

//! Reconciliation of a live item list against the current transition records.
//!
//! [`reconcile`] is a pure reducer: it reads the previous records and the
//! authoritative live list and returns the next records without mutating
//! anything. [`RecordSet`] owns the result and exposes the generation-scoped
//! mutations that drivers perform afterwards.
//!
//! # Rules per update
//!
//! | previous record | key live? | outcome |
//! |---|---|---|
//! | close family | yes | redirect to `open`, new generation, anchor = progress |
//! | open family | yes | keep; refresh value if it changed |
//! | open family | no | redirect to `close`, new generation, anchor = progress |
//! | close family | no | keep (let it finish) |
//! | none | yes | new record at `open`, progress = `from`, new generation |
//!
//! All changes produced by one update share one generation id. Output order
//! is first-appearance order; new keys are appended in live-list order.
//!
//! # Invariants
//!
//! 1. Reconciling an unchanged live list twice yields no generation.
//! 2. Redirection never touches progress.
//! 3. Only records whose stage changed carry the new generation id.
//!
//! # Failure Modes
//!
//! - Duplicate keys in the live list are a caller bug and panic.

use std::collections::HashMap;
use std::hash::Hash;

use crate::config::{TransitionPolicy, ValueRange};
use crate::multiplex::DriverLane;
use crate::record::{GenerationId, TransitionRecord};
use crate::solver::lerp;
use crate::stage::{Direction, Stage};

/// Result of one [`reconcile`] pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<K, T> {
    /// Next record sequence.
    pub records: Vec<TransitionRecord<K, T>>,
    /// The generation id, if any record changed stage.
    pub generation: Option<GenerationId>,
    /// New keys appended at `open`.
    pub entered: usize,
    /// Close-family records redirected to `open`.
    pub reopened: usize,
    /// Open-family records redirected to `close`.
    pub closed: usize,
    /// Open-family records whose value changed in place.
    pub refreshed: usize,
}

impl<K, T> Reconciliation<K, T> {
    /// Whether the pass changed any stage.
    #[inline]
    #[must_use]
    pub fn started_generation(&self) -> bool {
        self.generation.is_some()
    }

    /// Whether the pass changed nothing observable.
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.generation.is_none() && self.refreshed == 0
    }
}

fn index_live<K, T, F>(live: &[T], key_of: &F) -> HashMap<K, usize>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut index = HashMap::with_capacity(live.len());
    for (i, item) in live.iter().enumerate() {
        let previous = index.insert(key_of(item), i);
        assert!(
            previous.is_none(),
            "duplicate key in live list at indices {} and {i}",
            previous.unwrap_or_default()
        );
    }
    index
}

/// Compute the next record sequence for `live`.
///
/// `next_generation` is stamped on every record whose stage changes; the
/// caller only consumes it when [`Reconciliation::generation`] is `Some`.
///
/// # Panics
///
/// Panics if two live items share a key.
pub fn reconcile<K, T, F>(
    prev: &[TransitionRecord<K, T>],
    live: &[T],
    key_of: F,
    next_generation: GenerationId,
    range: &ValueRange,
) -> Reconciliation<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + PartialEq,
    F: Fn(&T) -> K,
{
    let index = index_live(live, &key_of);
    let mut matched = vec![false; live.len()];
    let mut records = Vec::with_capacity(prev.len().max(live.len()));
    let (mut entered, mut reopened, mut closed, mut refreshed) = (0, 0, 0, 0);

    for record in prev {
        let mut next = record.clone();
        match (index.get(&record.key), record.stage.direction()) {
            (Some(&i), Direction::Close) => {
                matched[i] = true;
                next.value = live[i].clone();
                next.stage = Stage::Open;
                next.generation = next_generation;
                next.anchor = record.progress;
                reopened += 1;
            }
            (Some(&i), Direction::Open) => {
                matched[i] = true;
                if live[i] != record.value {
                    next.value = live[i].clone();
                    refreshed += 1;
                }
            }
            (None, Direction::Open) => {
                next.stage = Stage::Close;
                next.generation = next_generation;
                next.anchor = record.progress;
                closed += 1;
            }
            (None, Direction::Close) => {}
        }
        records.push(next);
    }

    for (i, item) in live.iter().enumerate() {
        if !matched[i] {
            records.push(TransitionRecord::new(
                key_of(item),
                item.clone(),
                Stage::Open,
                range.from,
                next_generation,
            ));
            entered += 1;
        }
    }

    let generation = (entered + reopened + closed > 0).then_some(next_generation);

    #[cfg(feature = "tracing")]
    tracing::trace!(
        generation = generation.map(GenerationId::get),
        entered,
        reopened,
        closed,
        refreshed,
        "reconciled live list"
    );

    Reconciliation {
        records,
        generation,
        entered,
        reopened,
        closed,
        refreshed,
    }
}

/// Counts of records moved to `opening`/`closing` by
/// [`RecordSet::begin_generation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStart {
    /// Records now `opening`.
    pub opening: usize,
    /// Records now `closing`.
    pub closing: usize,
}

impl GenerationStart {
    /// Whether nothing started moving.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opening == 0 && self.closing == 0
    }
}

/// Counts of records affected by [`RecordSet::settle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleOutcome {
    /// Records now `opened`.
    pub opened: usize,
    /// Records now `closed` and retained.
    pub closed: usize,
    /// Records that finished closing and were dropped.
    pub dropped: usize,
}

impl SettleOutcome {
    /// Whether the settle touched no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opened == 0 && self.closed == 0
    }
}

/// The managed record sequence of one transition set.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet<K, T> {
    records: Vec<TransitionRecord<K, T>>,
}

impl<K, T> Default for RecordSet<K, T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<K, T> RecordSet<K, T> {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `live` at rest in `opened`, at the open target.
    ///
    /// # Panics
    ///
    /// Panics if two live items share a key.
    pub fn mount<F>(live: &[T], key_of: F, range: &ValueRange) -> Self
    where
        K: Eq + Hash,
        T: Clone,
        F: Fn(&T) -> K,
    {
        index_live(live, &key_of);
        let records = live
            .iter()
            .map(|item| {
                TransitionRecord::new(
                    key_of(item),
                    item.clone(),
                    Stage::Opened,
                    range.open_target(),
                    GenerationId::INITIAL,
                )
            })
            .collect();
        Self { records }
    }

    /// Current records in output order.
    #[inline]
    pub fn records(&self) -> &[TransitionRecord<K, T>] {
        &self.records
    }

    /// Number of managed records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record is managed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for `key`, if managed.
    pub fn get(&self, key: &K) -> Option<&TransitionRecord<K, T>>
    where
        K: PartialEq,
    {
        self.records.iter().find(|r| &r.key == key)
    }

    /// Consume the set.
    pub fn into_records(self) -> Vec<TransitionRecord<K, T>> {
        self.records
    }

    /// Reconcile against `live` without applying.
    pub fn reconcile<F>(
        &self,
        live: &[T],
        key_of: F,
        next_generation: GenerationId,
        range: &ValueRange,
    ) -> Reconciliation<K, T>
    where
        K: Eq + Hash + Clone,
        T: Clone + PartialEq,
        F: Fn(&T) -> K,
    {
        reconcile(&self.records, live, key_of, next_generation, range)
    }

    /// Replace the records with a reconciliation result in one assignment.
    /// Returns the generation it started, if any.
    pub fn apply(&mut self, reconciliation: Reconciliation<K, T>) -> Option<GenerationId> {
        self.records = reconciliation.records;
        reconciliation.generation
    }

    /// Move every staged record of `generation` to its animating stage and
    /// snapshot its anchor.
    pub fn begin_generation(&mut self, generation: GenerationId) -> GenerationStart {
        let mut start = GenerationStart::default();
        for record in self.records.iter_mut().filter(|r| r.generation == generation) {
            if let Some(next) = record.stage.begin() {
                record.stage = next;
                record.anchor = record.progress;
                match next.direction() {
                    Direction::Open => start.opening += 1,
                    Direction::Close => start.closing += 1,
                }
            }
        }
        start
    }

    /// Write one driver frame: every animating record of `generation` in
    /// `lane` moves to `lerp(anchor, target, proportion)`.
    ///
    /// Returns the number of records written.
    pub fn apply_frame(
        &mut self,
        generation: GenerationId,
        lane: DriverLane,
        proportion: f64,
        range: &ValueRange,
    ) -> usize {
        let mut written = 0;
        for record in self.bound_mut(generation, lane) {
            let target = range.target(record.stage.direction());
            record.progress = lerp(record.anchor, target, proportion);
            written += 1;
        }
        written
    }

    /// Complete `generation` in `lane`: snap every animating record to its
    /// target and rest stage, dropping finished closes unless the policy
    /// keeps them.
    pub fn settle(
        &mut self,
        generation: GenerationId,
        lane: DriverLane,
        range: &ValueRange,
        policy: &TransitionPolicy,
    ) -> SettleOutcome {
        let mut outcome = SettleOutcome::default();
        for record in self.bound_mut(generation, lane) {
            let direction = record.stage.direction();
            record.stage = direction.rest();
            record.progress = range.target(direction);
            record.anchor = record.progress;
            match direction {
                Direction::Open => outcome.opened += 1,
                Direction::Close => outcome.closed += 1,
            }
        }
        if !policy.keep_closed && outcome.closed > 0 {
            let before = self.records.len();
            self.records
                .retain(|r| !(r.generation == generation && r.stage == Stage::Closed));
            outcome.dropped = before - self.records.len();
            outcome.closed -= outcome.dropped;
        }
        outcome
    }

    /// Whether `generation` still has records waiting at a staging stage.
    pub fn is_staged(&self, generation: GenerationId) -> bool {
        self.records
            .iter()
            .any(|r| r.generation == generation && r.stage.is_staging())
    }

    /// Whether `generation` still has animating records in `lane`.
    pub fn is_animating(&self, generation: GenerationId, lane: DriverLane) -> bool {
        self.records
            .iter()
            .any(|r| Self::is_bound(r, generation, lane))
    }

    /// Whether any record of `generation` is still animating, in either
    /// direction.
    pub fn is_moving(&self, generation: GenerationId) -> bool {
        self.is_animating(generation, DriverLane::Shared)
    }

    fn is_bound(record: &TransitionRecord<K, T>, generation: GenerationId, lane: DriverLane) -> bool {
        record.generation == generation
            && record.stage.is_animating()
            && lane.covers(record.stage.direction())
    }

    fn bound_mut(
        &mut self,
        generation: GenerationId,
        lane: DriverLane,
    ) -> impl Iterator<Item = &mut TransitionRecord<K, T>> {
        self.records
            .iter_mut()
            .filter(move |r| Self::is_bound(r, generation, lane))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &&'static str) -> &'static str {
        *s
    }

    fn range() -> ValueRange {
        ValueRange::new(0.0, 1.0)
    }

    fn stages(set: &RecordSet<&'static str, &'static str>) -> Vec<(&'static str, Stage)> {
        set.records().iter().map(|r| (*r.key(), r.stage())).collect()
    }

    fn step(
        set: &mut RecordSet<&'static str, &'static str>,
        live: &[&'static str],
        generation: u64,
    ) -> Option<GenerationId> {
        let result = set.reconcile(live, key, GenerationId::new(generation), &range());
        set.apply(result)
    }

    #[test]
    fn new_items_enter_at_from() {
        let mut set = RecordSet::new();
        let generation = step(&mut set, &["a", "b"], 1);
        assert_eq!(generation, Some(GenerationId::new(1)));
        assert_eq!(stages(&set), vec![("a", Stage::Open), ("b", Stage::Open)]);
        assert!(set.records().iter().all(|r| r.progress() == 0.0));
    }

    #[test]
    fn mount_is_opened_at_rest() {
        let set: RecordSet<&str, &str> = RecordSet::mount(&["a"], key, &range());
        let record = &set.records()[0];
        assert_eq!(record.stage(), Stage::Opened);
        assert_eq!(record.progress(), 1.0);
        assert_eq!(record.generation(), GenerationId::INITIAL);
        assert!(!set.is_staged(GenerationId::INITIAL));
    }

    #[test]
    fn unchanged_list_is_noop() {
        let mut set = RecordSet::mount(&["a", "b"], key, &range());
        let result = set.reconcile(&["a", "b"], key, GenerationId::new(1), &range());
        assert!(result.is_noop());
        assert_eq!(set.apply(result), None);
    }

    #[test]
    fn vanished_item_closes_and_new_item_appends() {
        let mut set = RecordSet::mount(&["a", "b"], key, &range());
        let result = set.reconcile(&["b", "c"], key, GenerationId::new(1), &range());
        assert_eq!((result.entered, result.closed, result.reopened), (1, 1, 0));
        set.apply(result);
        assert_eq!(
            stages(&set),
            vec![("a", Stage::Close), ("b", Stage::Opened), ("c", Stage::Open)]
        );
        assert_eq!(set.get(&"a").unwrap().anchor(), 1.0);
        assert_eq!(set.get(&"b").unwrap().generation(), GenerationId::INITIAL);
    }

    #[test]
    fn value_change_refreshes_without_restart() {
        #[derive(Clone, PartialEq, Debug)]
        struct Item(u32, &'static str);

        let mut set = RecordSet::mount(&[Item(1, "x")], |i: &Item| i.0, &range());
        let result = set.reconcile(&[Item(1, "y")], |i: &Item| i.0, GenerationId::new(1), &range());
        assert_eq!(result.refreshed, 1);
        assert!(!result.started_generation());
        set.apply(result);
        let record = &set.records()[0];
        assert_eq!(record.value().1, "y");
        assert_eq!(record.stage(), Stage::Opened);
        assert_eq!(record.progress(), 1.0);
    }

    #[test]
    fn reopen_keeps_progress_as_anchor() {
        let mut set = RecordSet::mount(&["a"], key, &range());
        let g1 = step(&mut set, &[], 1).unwrap();
        set.begin_generation(g1);
        set.apply_frame(g1, DriverLane::Shared, 0.4, &range());
        let closing = set.get(&"a").unwrap().progress();
        assert!((closing - 0.6).abs() < 1e-12);

        let g2 = step(&mut set, &["a"], 2).unwrap();
        let record = set.get(&"a").unwrap();
        assert_eq!(record.stage(), Stage::Open);
        assert_eq!(record.generation(), g2);
        assert_eq!(record.anchor(), closing);
        assert_eq!(record.progress(), closing);
        assert!(!set.is_animating(g1, DriverLane::Shared));
    }

    #[test]
    fn frames_only_touch_their_generation_and_lane() {
        let mut set = RecordSet::mount(&["a"], key, &range());
        let g1 = step(&mut set, &["b"], 1).unwrap();
        let start = set.begin_generation(g1);
        assert_eq!(start, GenerationStart { opening: 1, closing: 1 });

        assert_eq!(set.apply_frame(g1, DriverLane::Open, 0.5, &range()), 1);
        assert_eq!(set.get(&"b").unwrap().progress(), 0.5);
        assert_eq!(set.get(&"a").unwrap().progress(), 1.0);

        assert_eq!(set.apply_frame(GenerationId::new(9), DriverLane::Shared, 0.9, &range()), 0);
    }

    #[test]
    fn idle_lane_settles_nothing_while_generation_moves() {
        let policy = TransitionPolicy::default();
        let mut set = RecordSet::mount(&["a"], key, &range());
        let g1 = step(&mut set, &["a", "b"], 1).unwrap();
        set.begin_generation(g1);

        let outcome = set.settle(g1, DriverLane::Close, &range(), &policy);
        assert!(outcome.is_empty());
        assert!(set.is_moving(g1));

        let outcome = set.settle(g1, DriverLane::Open, &range(), &policy);
        assert_eq!(outcome.opened, 1);
        assert!(!set.is_moving(g1));
    }

    #[test]
    fn settle_drops_closed_unless_kept() {
        let mut set = RecordSet::mount(&["a"], key, &range());
        let g1 = step(&mut set, &[], 1).unwrap();
        set.begin_generation(g1);
        let outcome = set.settle(g1, DriverLane::Shared, &range(), &TransitionPolicy::default());
        assert_eq!(outcome, SettleOutcome { opened: 0, closed: 0, dropped: 1 });
        assert!(set.is_empty());

        let mut kept = RecordSet::mount(&["a"], key, &range());
        let g1 = step(&mut kept, &[], 1).unwrap();
        kept.begin_generation(g1);
        let policy = TransitionPolicy {
            keep_closed: true,
            ..TransitionPolicy::default()
        };
        let outcome = kept.settle(g1, DriverLane::Close, &range(), &policy);
        assert_eq!(outcome.closed, 1);
        let record = &kept.records()[0];
        assert_eq!(record.stage(), Stage::Closed);
        assert_eq!(record.progress(), 0.0);
    }

    #[test]
    fn asymmetric_settle_targets() {
        let range = ValueRange::asymmetric(0.0, 1.0, -1.0);
        let policy = TransitionPolicy {
            keep_closed: true,
            ..TransitionPolicy::default()
        };
        let mut set = RecordSet::mount(&["a"], key, &range);
        let g1 = set.apply(set.reconcile(&[], key, GenerationId::new(1), &range)).unwrap();
        set.begin_generation(g1);
        set.apply_frame(g1, DriverLane::Close, 0.5, &range);
        assert_eq!(set.records()[0].progress(), 0.0);
        set.settle(g1, DriverLane::Close, &range, &policy);
        assert_eq!(set.records()[0].progress(), -1.0);
    }

    #[test]
    fn absent_closing_record_is_left_alone() {
        let mut set = RecordSet::mount(&["a"], key, &range());
        let g1 = step(&mut set, &[], 1).unwrap();
        set.begin_generation(g1);
        assert_eq!(step(&mut set, &[], 2), None);
        assert_eq!(set.get(&"a").unwrap().generation(), g1);
    }

    #[test]
    #[should_panic(expected = "duplicate key in live list")]
    fn duplicate_keys_panic() {
        let set: RecordSet<&str, &str> = RecordSet::new();
        let _ = set.reconcile(&["a", "a"], key, GenerationId::new(1), &range());
    }
}
