//! Dependency edges of the per-thread lock trees.

use crate::core::lock_state::LockState;
use std::sync::Arc;

/// One edge bundle of a lock tree: a lock together with the set of locks the
/// acquiring thread already held at that moment.
///
/// The holding set is a snapshot taken at acquisition time; later changes to
/// the thread's live holding set do not affect it. A dependency is immutable
/// after construction and shared as `Arc<Dependency>`, so the detectors can
/// use pointer identity to keep a DFS path free of repeats.
pub(crate) struct Dependency {
    lock: Arc<LockState>,
    holding_set: Vec<Arc<LockState>>,
}

impl Dependency {
    /// Build a dependency for acquiring `lock` while holding exactly
    /// `holding_set`. The slice is copied, not referenced.
    pub(crate) fn new(lock: Arc<LockState>, holding_set: &[Arc<LockState>]) -> Self {
        Dependency {
            lock,
            holding_set: holding_set.to_vec(),
        }
    }

    pub(crate) fn lock(&self) -> &Arc<LockState> {
        &self.lock
    }

    pub(crate) fn holding_set(&self) -> &[Arc<LockState>] {
        &self.holding_set
    }

    pub(crate) fn holding_count(&self) -> usize {
        self.holding_set.len()
    }

    /// Dedup equality: same acquired lock and pointwise identical holding
    /// set. Used when deciding whether an acquisition adds a new edge to the
    /// thread's tree.
    pub(crate) fn matches(&self, lock: &Arc<LockState>, holding_set: &[Arc<LockState>]) -> bool {
        self.lock.id() == lock.id()
            && self.holding_set.len() == holding_set.len()
            && self
                .holding_set
                .iter()
                .zip(holding_set)
                .all(|(a, b)| a.id() == b.id())
    }
}
