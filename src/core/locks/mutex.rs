//! The tracked exclusive mutex.

use crate::core::detector;
use crate::core::interception;
use crate::core::lock_state::LockState;
use crate::core::logger;
use crate::core::types::{LockEvent, LockId, LockKind};
use parking_lot::{Mutex as ParkingLotMutex, MutexGuard as ParkingLotMutexGuard};
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::sync::Arc;

/// A mutual-exclusion lock whose acquisitions feed the deadlock detector.
///
/// `Mutex` is a drop-in replacement for a `parking_lot::Mutex`: locking
/// returns a guard and the lock is released when the guard drops. Every
/// acquisition and release is additionally recorded in the calling thread's
/// lock tree, from which the detector flags cyclic and double locking.
///
/// The wrapper may be moved freely before and after use; the identity the
/// detector tracks lives behind an internal `Arc` and is assigned once at
/// construction.
///
/// # Example
///
/// ```rust
/// use locktree::Mutex;
/// use std::sync::Arc;
/// use std::thread;
///
/// let counter = Arc::new(Mutex::new(0));
/// let clone = Arc::clone(&counter);
///
/// let handle = thread::spawn(move || {
///     *clone.lock() += 1;
/// });
///
/// handle.join().unwrap();
/// *counter.lock() += 1;
/// ```
pub struct Mutex<T> {
    state: Arc<LockState>,
    inner: ParkingLotMutex<T>,
}

/// Guard of a [`Mutex`]; releases the lock and books the release when
/// dropped.
pub struct MutexGuard<'a, T> {
    state: &'a Arc<LockState>,
    guard: ParkingLotMutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    /// Create a new tracked mutex holding `value`.
    ///
    /// The first lock construction in a process initializes the detector:
    /// options are frozen and the periodic detection thread is started if
    /// enabled.
    #[track_caller]
    pub fn new(value: T) -> Self {
        detector::global();
        let state = LockState::new(LockKind::Exclusive, Location::caller());
        logger::log_event(None, state.id(), LockEvent::Created);
        Mutex {
            state,
            inner: ParkingLotMutex::new(value),
        }
    }

    /// The identity under which this lock appears in reports.
    pub fn id(&self) -> LockId {
        self.state.id()
    }

    /// Acquire the lock, blocking until it is available.
    ///
    /// The acquisition is booked in the calling thread's lock tree before
    /// the underlying primitive is taken, and double locking is checked
    /// first when enabled.
    #[track_caller]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        interception::on_lock(&self.state, false);
        let guard = self.inner.lock();
        interception::on_acquired(&self.state);
        MutexGuard {
            state: &self.state,
            guard,
        }
    }

    /// Acquire the lock only if it is free right now.
    ///
    /// A successful try-lock updates the holding set but records no
    /// dependency: not waiting expresses no ordering intent. A failed
    /// try-lock touches no detector state at all.
    #[track_caller]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Some(guard) => {
                interception::on_try_lock(&self.state, false, true);
                interception::on_acquired(&self.state);
                Some(MutexGuard {
                    state: &self.state,
                    guard,
                })
            }
            None => {
                interception::on_try_lock(&self.state, false, false);
                None
            }
        }
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.deref_mut()
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // Booked before the primitive itself is released when the inner
        // guard drops right after.
        interception::on_unlock(self.state);
    }
}
