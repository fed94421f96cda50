//! Shared bookkeeping record behind every wrapped lock.
//!
//! The generic `Mutex<T>` and `RwLock<T>` wrappers each own an
//! `Arc<LockState>` next to their parking_lot primitive. Dependencies and
//! reports reference the `Arc`, so the record survives wrapper moves and the
//! monotonically assigned id gives every lock a stable identity.

use crate::core::caller_info::CallerInfo;
use crate::core::types::{LockId, LockKind, ThreadIndex};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_LOCK_ID: AtomicUsize = AtomicUsize::new(1);

/// Per-thread hold depths and reader flags of one lock.
///
/// `held_by` entries are removed when a thread's depth drops to zero.
/// `reader_flag` entries are never removed: the chain predicates consult them
/// after the holds are long gone, and the last acquisition mode is exactly
/// what the reader/writer witness rule needs.
#[derive(Default)]
struct HoldState {
    held_by: FxHashMap<ThreadIndex, usize>,
    reader_flag: FxHashMap<ThreadIndex, bool>,
}

/// Identity, history and hold bookkeeping of one wrapped lock.
pub(crate) struct LockState {
    id: LockId,
    kind: LockKind,
    initialized: bool,
    /// Creation site followed by every distinct acquisition site.
    context: Mutex<Vec<CallerInfo>>,
    /// Number of threads currently holding the lock (each reader counts).
    hold_count: AtomicUsize,
    holds: Mutex<HoldState>,
}

impl LockState {
    pub(crate) fn new(kind: LockKind, site: &'static Location<'static>) -> Arc<Self> {
        Arc::new(LockState {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::SeqCst),
            kind,
            initialized: true,
            context: Mutex::new(vec![CallerInfo::creation(site)]),
            hold_count: AtomicUsize::new(0),
            holds: Mutex::new(HoldState::default()),
        })
    }

    pub(crate) fn id(&self) -> LockId {
        self.id
    }

    pub(crate) fn kind(&self) -> LockKind {
        self.kind
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// How many threads currently hold this lock.
    pub(crate) fn hold_count(&self) -> usize {
        self.hold_count.load(Ordering::Acquire)
    }

    pub(crate) fn increment_hold_count(&self) {
        self.hold_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn decrement_hold_count(&self) {
        self.hold_count.fetch_sub(1, Ordering::AcqRel);
    }

    /// Current hold depth of `thread` on this lock.
    pub(crate) fn hold_depth(&self, thread: ThreadIndex) -> usize {
        self.holds.lock().held_by.get(&thread).copied().unwrap_or(0)
    }

    pub(crate) fn acquire_by(&self, thread: ThreadIndex) {
        *self.holds.lock().held_by.entry(thread).or_insert(0) += 1;
    }

    pub(crate) fn release_by(&self, thread: ThreadIndex) {
        let mut holds = self.holds.lock();
        if let Some(depth) = holds.held_by.get_mut(&thread) {
            *depth -= 1;
            if *depth == 0 {
                holds.held_by.remove(&thread);
            }
        }
    }

    /// Whether the most recent acquisition of this lock by `thread` was a
    /// reader acquisition. Always false for exclusive locks.
    pub(crate) fn is_reader_hold(&self, thread: ThreadIndex) -> bool {
        match self.kind {
            LockKind::Exclusive => false,
            LockKind::ReadWrite => self
                .holds
                .lock()
                .reader_flag
                .get(&thread)
                .copied()
                .unwrap_or(false),
        }
    }

    /// Remember the acquisition mode of `thread`'s latest hold. A no-op for
    /// exclusive locks, which report `false` unconditionally.
    pub(crate) fn set_reader(&self, thread: ThreadIndex, reader: bool) {
        if self.kind == LockKind::ReadWrite {
            self.holds.lock().reader_flag.insert(thread, reader);
        }
    }

    /// Whether `thread` re-acquiring this lock would be a double-lock
    /// violation. Reader-over-reader re-entry on a reader/writer lock is
    /// allowed; everything else is not.
    pub(crate) fn double_lock_violation(&self, thread: ThreadIndex, reader: bool) -> bool {
        if self.hold_depth(thread) == 0 {
            return false;
        }
        !(reader && self.is_reader_hold(thread))
    }

    pub(crate) fn record_site(&self, info: CallerInfo) {
        self.context.lock().push(info);
    }

    /// Snapshot of the creation and acquisition history for reporting.
    pub(crate) fn context_snapshot(&self) -> Vec<CallerInfo> {
        self.context.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_nonzero() {
        let a = LockState::new(LockKind::Exclusive, Location::caller());
        let b = LockState::new(LockKind::ReadWrite, Location::caller());
        assert_ne!(a.id(), 0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn exclusive_lock_never_reports_reader_hold() {
        let m = LockState::new(LockKind::Exclusive, Location::caller());
        m.set_reader(0, true);
        assert!(!m.is_reader_hold(0));
    }

    #[test]
    fn hold_depth_tracks_per_thread_reentry() {
        let m = LockState::new(LockKind::Exclusive, Location::caller());
        m.acquire_by(3);
        m.acquire_by(3);
        assert_eq!(m.hold_depth(3), 2);
        assert_eq!(m.hold_depth(0), 0);
        m.release_by(3);
        m.release_by(3);
        assert_eq!(m.hold_depth(3), 0);
    }

    #[test]
    fn double_lock_ignores_other_threads_and_reader_reentry() {
        let m = LockState::new(LockKind::ReadWrite, Location::caller());
        m.acquire_by(0);
        m.set_reader(0, true);
        // Another thread acquiring is never double locking.
        assert!(!m.double_lock_violation(1, false));
        // Reader over reader is allowed.
        assert!(m.double_lock_violation(0, false));
        assert!(!m.double_lock_violation(0, true));
    }

    #[test]
    fn reader_flag_survives_release() {
        let m = LockState::new(LockKind::ReadWrite, Location::caller());
        m.acquire_by(2);
        m.set_reader(2, true);
        m.release_by(2);
        assert!(m.is_reader_hold(2));
    }
}
