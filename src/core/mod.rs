mod caller_info;
mod chain;
mod dep_stack;
mod dependency;
mod detector;
mod interception;
mod lock_state;
pub mod logger;
pub mod options;
mod reporter;
mod thread_state;
mod types;

mod locks;

pub use detector::comprehensive::find_potential_deadlocks;
pub use detector::set_deadlock_callback;
pub use locks::mutex::{Mutex, MutexGuard};
pub use locks::rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use types::{DeadlockInfo, DeadlockKind, LockEvent, LockId, ThreadIndex};
