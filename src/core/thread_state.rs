//! Per-thread lock trees.
//!
//! Each registered thread owns a `ThreadState` holding its live holding set
//! and the flattened lock tree of dependencies recorded so far. The owning
//! thread is the only writer; the detector threads read the state through the
//! uncontended interior mutex, and the holding count and top-of-holding-set
//! identity are additionally published through atomics so the periodical
//! pre-scan can poll them without locking.

use crate::core::caller_info::{self, CallerInfo};
use crate::core::dependency::Dependency;
use crate::core::lock_state::LockState;
use crate::core::options::Options;
use crate::core::types::{LockId, ThreadIndex};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct ThreadInner {
    /// Locks currently held, most recent last.
    holding_set: Vec<Arc<LockState>>,
    /// The flattened lock tree.
    dependencies: Vec<Arc<Dependency>>,
    /// Dedup index: XOR of the acquired lock's id and the id of the lock at
    /// the top of the holding set, mapping to the dependencies recorded with
    /// that key.
    dependency_index: FxHashMap<usize, Vec<Arc<Dependency>>>,
    /// Most recently added dependency, consumed by the periodical detector.
    current_dep: Option<Arc<Dependency>>,
    /// Deduplication of recorded first-level acquisition sites, file to
    /// lines.
    single_level_sites: FxHashMap<&'static str, Vec<u32>>,
}

/// State of one registered thread.
pub(crate) struct ThreadState {
    index: ThreadIndex,
    /// Mirror of `holding_set.len()`, published for lock-free polling.
    holding_count: AtomicUsize,
    /// Id of the top of the holding set, 0 when empty.
    holding_top: AtomicUsize,
    inner: Mutex<ThreadInner>,
}

impl ThreadState {
    pub(crate) fn new(index: ThreadIndex) -> Self {
        ThreadState {
            index,
            holding_count: AtomicUsize::new(0),
            holding_top: AtomicUsize::new(0),
            inner: Mutex::new(ThreadInner {
                holding_set: Vec::new(),
                dependencies: Vec::new(),
                dependency_index: FxHashMap::default(),
                current_dep: None,
                single_level_sites: FxHashMap::default(),
            }),
        }
    }

    pub(crate) fn index(&self) -> ThreadIndex {
        self.index
    }

    pub(crate) fn holding_count(&self) -> usize {
        self.holding_count.load(Ordering::Acquire)
    }

    /// Id of the lock on top of the holding set, 0 when nothing is held.
    pub(crate) fn holding_top(&self) -> LockId {
        self.holding_top.load(Ordering::Acquire)
    }

    pub(crate) fn current_dep(&self) -> Option<Arc<Dependency>> {
        self.inner.lock().current_dep.clone()
    }

    /// Clear the current dependency after the periodical detector has
    /// examined it.
    pub(crate) fn take_current_dep(&self) {
        self.inner.lock().current_dep = None;
    }

    pub(crate) fn dependencies_snapshot(&self) -> Vec<Arc<Dependency>> {
        self.inner.lock().dependencies.clone()
    }

    #[cfg(test)]
    pub(crate) fn dependency_count(&self) -> usize {
        self.inner.lock().dependencies.len()
    }

    #[cfg(test)]
    pub(crate) fn holding_set_ids(&self) -> Vec<LockId> {
        self.inner.lock().holding_set.iter().map(|l| l.id()).collect()
    }

    /// Record a blocking acquisition of `m`.
    ///
    /// A nested acquisition (something already held) adds a dependency edge
    /// to the lock tree unless an identical one exists; a first-level
    /// acquisition optionally records its call site. In both cases `m` is
    /// pushed onto the holding set.
    pub(crate) fn update_lock(
        &self,
        m: &Arc<LockState>,
        reader: bool,
        site: &'static Location<'static>,
        opts: &Options,
    ) {
        m.set_reader(self.index, reader);

        let mut inner = self.inner.lock();
        let hc = inner.holding_set.len();
        let mut novel = false;

        if hc > 0 {
            let key = m.id() ^ inner.holding_set[hc - 1].id();
            let exists = inner
                .dependency_index
                .get(&key)
                .is_some_and(|bucket| bucket.iter().any(|d| d.matches(m, &inner.holding_set)));

            if !exists {
                if inner.dependencies.len() >= opts.max_dependencies {
                    panic!(
                        "thread {} exceeded {} recorded dependencies. \
                         Increase the max_dependencies option.",
                        self.index, opts.max_dependencies
                    );
                }
                let dep = Arc::new(Dependency::new(Arc::clone(m), &inner.holding_set));
                inner.dependencies.push(Arc::clone(&dep));
                inner
                    .dependency_index
                    .entry(key)
                    .or_default()
                    .push(Arc::clone(&dep));
                inner.current_dep = Some(dep);
                novel = true;
            }
        } else if opts.collect_single_level_lock_stack {
            let lines = inner.single_level_sites.entry(site.file()).or_default();
            if !lines.contains(&site.line()) {
                lines.push(site.line());
                novel = true;
            }
        }

        if novel {
            let stack = opts
                .collect_call_stack
                .then(|| caller_info::capture_call_stack(opts.max_call_stack_size));
            m.record_site(CallerInfo::acquisition(site, stack));
        }

        if hc >= opts.max_dependent_locks {
            panic!(
                "thread {} exceeded a holding-set depth of {}. \
                 Increase the max_dependent_locks option.",
                self.index, opts.max_dependent_locks
            );
        }

        inner.holding_set.push(Arc::clone(m));
        self.publish_holding(&inner);
    }

    /// Record a successful try-lock of `m`.
    ///
    /// Only the holding set and reader flag are updated. A try-lock that
    /// succeeds never waits, so it expresses no ordering intent and adds no
    /// dependency edge.
    pub(crate) fn update_try_lock(&self, m: &Arc<LockState>, reader: bool, opts: &Options) {
        m.set_reader(self.index, reader);

        let mut inner = self.inner.lock();
        if inner.holding_set.len() >= opts.max_dependent_locks {
            panic!(
                "thread {} exceeded a holding-set depth of {}. \
                 Increase the max_dependent_locks option.",
                self.index, opts.max_dependent_locks
            );
        }
        inner.holding_set.push(Arc::clone(m));
        self.publish_holding(&inner);
    }

    /// Remove the topmost occurrence of `m` from the holding set. Releasing
    /// a lock this state never saw leaves it unchanged; the underlying
    /// primitive diagnoses such misuse itself.
    pub(crate) fn update_unlock(&self, m: &LockState) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.holding_set.iter().rposition(|l| l.id() == m.id()) {
            inner.holding_set.remove(pos);
            self.publish_holding(&inner);
        }
    }

    fn publish_holding(&self, inner: &ThreadInner) {
        let top = inner.holding_set.last().map(|l| l.id()).unwrap_or(0);
        self.holding_top.store(top, Ordering::Release);
        self.holding_count
            .store(inner.holding_set.len(), Ordering::Release);
    }
}
