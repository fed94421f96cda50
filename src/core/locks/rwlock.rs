//! The tracked reader/writer lock.

use crate::core::detector;
use crate::core::interception;
use crate::core::lock_state::LockState;
use crate::core::logger;
use crate::core::types::{LockEvent, LockId, LockKind};
use parking_lot::{
    RwLock as ParkingLotRwLock, RwLockReadGuard as ParkingLotReadGuard,
    RwLockWriteGuard as ParkingLotWriteGuard,
};
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::sync::Arc;

/// A reader/writer lock whose acquisitions feed the deadlock detector.
///
/// Shared (`read`) and exclusive (`write`) acquisitions are both recorded in
/// the calling thread's lock tree. The detector knows which holds were
/// reader acquisitions and applies the reader/writer rules during cycle
/// search: two reader holds of the same lock neither link a chain nor act as
/// a gate, since shared readers cannot block one another.
///
/// # Example
///
/// ```rust
/// use locktree::RwLock;
///
/// let lock = RwLock::new(5);
///
/// {
///     let r1 = lock.read();
///     let r2 = lock.read();
///     assert_eq!(*r1 + *r2, 10);
/// }
///
/// *lock.write() += 1;
/// assert_eq!(*lock.read(), 6);
/// ```
pub struct RwLock<T> {
    state: Arc<LockState>,
    inner: ParkingLotRwLock<T>,
}

/// Shared guard of an [`RwLock`]; books the release when dropped.
pub struct RwLockReadGuard<'a, T> {
    state: &'a Arc<LockState>,
    guard: ParkingLotReadGuard<'a, T>,
}

/// Exclusive guard of an [`RwLock`]; books the release when dropped.
pub struct RwLockWriteGuard<'a, T> {
    state: &'a Arc<LockState>,
    guard: ParkingLotWriteGuard<'a, T>,
}

impl<T> RwLock<T> {
    /// Create a new tracked reader/writer lock holding `value`.
    #[track_caller]
    pub fn new(value: T) -> Self {
        detector::global();
        let state = LockState::new(LockKind::ReadWrite, Location::caller());
        logger::log_event(None, state.id(), LockEvent::Created);
        RwLock {
            state,
            inner: ParkingLotRwLock::new(value),
        }
    }

    /// The identity under which this lock appears in reports.
    pub fn id(&self) -> LockId {
        self.state.id()
    }

    /// Acquire the lock exclusively, blocking until no readers or writer
    /// hold it.
    #[track_caller]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        interception::on_lock(&self.state, false);
        let guard = self.inner.write();
        interception::on_acquired(&self.state);
        RwLockWriteGuard {
            state: &self.state,
            guard,
        }
    }

    /// Acquire the lock exclusively only if that is possible right now.
    #[track_caller]
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        match self.inner.try_write() {
            Some(guard) => {
                interception::on_try_lock(&self.state, false, true);
                interception::on_acquired(&self.state);
                Some(RwLockWriteGuard {
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

    /// Acquire the lock shared, blocking while a writer holds it.
    ///
    /// Reader re-entry by the same thread is tolerated by the double-lock
    /// check; mixing a held read with a write attempt is not.
    #[track_caller]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        interception::on_lock(&self.state, true);
        let guard = self.inner.read();
        interception::on_acquired(&self.state);
        RwLockReadGuard {
            state: &self.state,
            guard,
        }
    }

    /// Acquire the lock shared only if that is possible right now.
    #[track_caller]
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        match self.inner.try_read() {
            Some(guard) => {
                interception::on_try_lock(&self.state, true, true);
                interception::on_acquired(&self.state);
                Some(RwLockReadGuard {
                    state: &self.state,
                    guard,
                })
            }
            None => {
                interception::on_try_lock(&self.state, true, false);
                None
            }
        }
    }
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.deref_mut()
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        interception::on_unlock(self.state);
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        interception::on_unlock(self.state);
    }
}
