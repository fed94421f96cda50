//! # locktree
//!
//! Dynamic deadlock detection for multithreaded programs, built on per-thread
//! lock-acquisition-order trees.
//!
//! locktree provides drop-in replacements for the exclusive and
//! reader/writer mutexes of `parking_lot`. Every acquisition and release is
//! intercepted and recorded as a dependency edge "this lock was taken while
//! those were held". Two analyses run over the recorded trees:
//!
//! - a **periodical detector** polls the most recent dependency of every
//!   thread at a fixed cadence and searches for a stable cycle among them. A
//!   confirmed cycle is a live local deadlock: it is reported to standard
//!   error and the process is terminated with exit status 2, since nothing
//!   sound can run after a confirmed deadlock.
//! - a **comprehensive detector**, run via [`find_potential_deadlocks`] when
//!   the program finishes, searches the union of all recorded dependencies
//!   and reports *potential* deadlocks: acquisition orders that did not
//!   deadlock this run but could under a different schedule.
//!
//! The analysis understands reader/writer semantics: two reader holds of the
//! same lock can neither link a cycle nor serialize one as a gate lock.
//! Same-thread re-acquisition of a held lock (double locking) is caught at
//! the acquisition site, except for reader-over-reader re-entry.
//!
//! ## Usage
//!
//! ```rust
//! use locktree::{Mutex, find_potential_deadlocks};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let a = Arc::new(Mutex::new(0u32));
//! let b = Arc::new(Mutex::new(0u32));
//!
//! let (a2, b2) = (Arc::clone(&a), Arc::clone(&b));
//! let worker = thread::spawn(move || {
//!     let _a = a2.lock();
//!     let _b = b2.lock();
//! });
//! worker.join().unwrap();
//!
//! {
//!     let _b = b.lock();
//!     let _a = a.lock();
//! }
//!
//! // Reports the a/b ordering inversion recorded above.
//! find_potential_deadlocks();
//! ```
//!
//! ## Configuration
//!
//! Options are process-global and must be set before the first lock is
//! created; afterwards every setter returns `false`:
//!
//! ```rust
//! use std::time::Duration;
//!
//! locktree::set_periodic_detection_time(Duration::from_secs(5));
//! locktree::set_collect_call_stack(true);
//! ```
//!
//! A callback can be registered to observe findings programmatically:
//!
//! ```rust
//! locktree::set_deadlock_callback(|info| {
//!     eprintln!("deadlock finding: {:?}", info.kind);
//! });
//! ```

mod core;

pub use core::{
    DeadlockInfo, DeadlockKind, LockEvent, LockId, Mutex, MutexGuard, RwLock, RwLockReadGuard,
    RwLockWriteGuard, ThreadIndex, find_potential_deadlocks, set_deadlock_callback,
};

pub use core::logger::set_event_log;
pub use core::options::{
    set_activated, set_check_double_locking, set_collect_call_stack,
    set_collect_single_level_lock_stack, set_comprehensive_detection, set_max_call_stack_size,
    set_max_dependencies, set_max_dependent_locks, set_max_threads, set_periodic_detection,
    set_periodic_detection_time,
};
