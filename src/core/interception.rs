//! Bookkeeping entry points wired into every wrapped lock operation.
//!
//! The wrappers call in here around their delegation to the underlying
//! parking_lot primitive. For a blocking acquisition all bookkeeping runs
//! *before* the primitive call, so the dependency on the pending lock is on
//! record while the thread may be about to block on it; a try-lock calls the
//! primitive first and its outcome gates the bookkeeping; a release is
//! booked before the primitive is released.

use crate::core::detector::{self, Detector};
use crate::core::lock_state::LockState;
use crate::core::logger;
use crate::core::reporter;
use crate::core::types::{DeadlockInfo, DeadlockKind, LockEvent};
use chrono::Utc;
use std::panic::Location;
use std::process;
use std::sync::Arc;

fn ensure_usable(m: &LockState) {
    if !m.is_initialized() {
        panic!("operation on a lock that was never constructed; create locks with Mutex::new or RwLock::new");
    }
}

/// Bookkeeping for a blocking acquisition, run before delegating to the
/// primitive.
#[track_caller]
pub(crate) fn on_lock(m: &Arc<LockState>, reader: bool) {
    let detector = detector::global();
    let opts = detector.options();
    if !opts.activated {
        return;
    }
    ensure_usable(m);
    if !opts.periodic_detection && !opts.comprehensive_detection {
        return;
    }

    let index = detector.register_current();

    if opts.check_double_locking && m.double_lock_violation(index, reader) {
        report_double_lock(detector, m, index);
    }

    m.acquire_by(index);
    detector
        .thread(index)
        .update_lock(m, reader, Location::caller(), opts);
}

/// Bookkeeping after the primitive acquisition completed (blocking or try).
pub(crate) fn on_acquired(m: &Arc<LockState>) {
    let detector = detector::global();
    if !detector.options().activated {
        return;
    }
    m.increment_hold_count();
    logger::log_event(detector.index_of_current(), m.id(), LockEvent::Acquired);
}

/// Bookkeeping for a try-lock whose primitive call already returned
/// `acquired`. A failed try-lock touches no detector state.
pub(crate) fn on_try_lock(m: &Arc<LockState>, reader: bool, acquired: bool) {
    let detector = detector::global();
    let opts = detector.options();
    if !opts.activated || !acquired {
        return;
    }
    ensure_usable(m);
    if !opts.periodic_detection && !opts.comprehensive_detection {
        return;
    }

    let index = detector.register_current();
    m.acquire_by(index);
    detector.thread(index).update_try_lock(m, reader, opts);
}

/// Bookkeeping for a release, run before the primitive is released.
pub(crate) fn on_unlock(m: &Arc<LockState>) {
    let detector = detector::global();
    let opts = detector.options();
    if !opts.activated {
        return;
    }
    ensure_usable(m);
    if m.hold_count() == 0 {
        panic!("tried to unlock a lock that is not locked");
    }

    if let Some(index) = detector.index_of_current() {
        m.release_by(index);
        if opts.periodic_detection || opts.comprehensive_detection {
            detector.thread(index).update_unlock(m);
        }
    }
    m.decrement_hold_count();
    logger::log_event(detector.index_of_current(), m.id(), LockEvent::Released);
}

/// Report a same-thread re-acquisition, run the comprehensive pass for
/// anything else this run has shown, and terminate.
#[track_caller]
fn report_double_lock(detector: &Detector, m: &Arc<LockState>, index: usize) -> ! {
    reporter::report_double_locking(m, Location::caller());
    detector::notify_info(DeadlockInfo {
        kind: DeadlockKind::DoubleLock,
        locks: vec![m.id()],
        threads: vec![index],
        timestamp: Utc::now().to_rfc3339(),
    });
    detector::comprehensive::run(detector);
    process::exit(2);
}
