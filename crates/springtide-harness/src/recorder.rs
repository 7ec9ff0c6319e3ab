#![forbid(unsafe_code)]

//! Recording of published snapshots.

use std::cell::RefCell;
use std::rc::Rc;

use springtide_core::{Stage, TransitionRecord};

/// Collects every snapshot a transition set publishes.
///
/// Clones share the same log.
pub struct PublishRecorder<K, T> {
    log: Rc<RefCell<Vec<Vec<TransitionRecord<K, T>>>>>,
}

impl<K, T> Clone for PublishRecorder<K, T> {
    fn clone(&self) -> Self {
        Self {
            log: Rc::clone(&self.log),
        }
    }
}

impl<K, T> Default for PublishRecorder<K, T> {
    fn default() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<K, T> PublishRecorder<K, T>
where
    K: Clone + PartialEq + 'static,
    T: Clone + 'static,
{
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A publish callback that appends to this recorder.
    pub fn sink(&self) -> impl Fn(&[TransitionRecord<K, T>]) + 'static {
        let log = Rc::clone(&self.log);
        move |records| log.borrow_mut().push(records.to_vec())
    }

    /// Number of snapshots published.
    #[must_use]
    pub fn count(&self) -> usize {
        self.log.borrow().len()
    }

    /// Most recent snapshot.
    #[must_use]
    pub fn last(&self) -> Option<Vec<TransitionRecord<K, T>>> {
        self.log.borrow().last().cloned()
    }

    /// Every snapshot so far.
    #[must_use]
    pub fn snapshots(&self) -> Vec<Vec<TransitionRecord<K, T>>> {
        self.log.borrow().clone()
    }

    /// Distinct consecutive stages `key` passed through, in order.
    /// Snapshots where the key is absent are skipped.
    #[must_use]
    pub fn stage_history(&self, key: &K) -> Vec<Stage> {
        let mut history: Vec<Stage> = Vec::new();
        for snapshot in self.log.borrow().iter() {
            if let Some(record) = snapshot.iter().find(|r| r.key() == key) {
                if history.last() != Some(&record.stage()) {
                    history.push(record.stage());
                }
            }
        }
        history
    }

    /// Progress of `key` in every snapshot that contains it.
    #[must_use]
    pub fn progress_history(&self, key: &K) -> Vec<f64> {
        self.log
            .borrow()
            .iter()
            .filter_map(|snapshot| snapshot.iter().find(|r| r.key() == key))
            .map(TransitionRecord::progress)
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}
