//! Detector configuration.
//!
//! Options may only be changed before the first wrapped lock is created; the
//! coordinator snapshots them at initialization and the snapshot is immutable
//! afterwards. Every setter reports whether it took effect.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// The option bag controlling detection behavior.
#[derive(Debug, Clone)]
pub(crate) struct Options {
    /// Master switch. When false, lock operations delegate straight to the
    /// underlying primitive with no bookkeeping.
    pub activated: bool,
    /// Run the background cycle search during execution.
    pub periodic_detection: bool,
    /// Run the depth-first cycle search over all recorded dependencies at
    /// program end.
    pub comprehensive_detection: bool,
    /// Interval of the periodic detection.
    pub periodic_detection_time: Duration,
    /// Capture a full call stack at each novel acquisition site instead of
    /// only file and line.
    pub collect_call_stack: bool,
    /// Record caller information for acquisitions made while holding no
    /// other lock.
    pub collect_single_level_lock_stack: bool,
    /// Check for same-thread re-acquisition of a held lock.
    pub check_double_locking: bool,
    /// Cap on recorded dependencies per thread.
    pub max_dependencies: usize,
    /// Cap on the size of a thread's holding set.
    pub max_dependent_locks: usize,
    /// Cap on registered threads.
    pub max_threads: usize,
    /// Byte budget for captured call stacks.
    pub max_call_stack_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            activated: true,
            periodic_detection: true,
            comprehensive_detection: true,
            periodic_detection_time: Duration::from_secs(2),
            collect_call_stack: false,
            collect_single_level_lock_stack: true,
            check_double_locking: true,
            max_dependencies: 4096,
            max_dependent_locks: 128,
            max_threads: 1024,
            max_call_stack_size: 2048,
        }
    }
}

lazy_static! {
    static ref OPTIONS: Mutex<Options> = Mutex::new(Options::default());
}

static FROZEN: AtomicBool = AtomicBool::new(false);

/// Freeze the options; called once by detector initialization. Afterwards
/// every setter fails.
pub(crate) fn freeze() -> Options {
    FROZEN.store(true, Ordering::SeqCst);
    OPTIONS.lock().clone()
}

pub(crate) fn is_frozen() -> bool {
    FROZEN.load(Ordering::SeqCst)
}

fn set<F: FnOnce(&mut Options)>(apply: F) -> bool {
    if is_frozen() {
        return false;
    }
    let mut opts = OPTIONS.lock();
    apply(&mut opts);
    true
}

// Deactivate automatically once every analysis is switched off; re-arm when
// one comes back.
fn sync_activated(opts: &mut Options) {
    opts.activated =
        opts.periodic_detection || opts.comprehensive_detection || opts.check_double_locking;
}

/// Enable or disable the detector as a whole. Enabling re-arms all analyses.
/// Fails after the first lock has been created.
pub fn set_activated(enable: bool) -> bool {
    set(|o| {
        o.activated = enable;
        o.periodic_detection = true;
        o.comprehensive_detection = true;
        o.check_double_locking = true;
    })
}

/// Enable or disable the periodic background detection.
pub fn set_periodic_detection(enable: bool) -> bool {
    set(|o| {
        o.periodic_detection = enable;
        sync_activated(o);
    })
}

/// Enable or disable the end-of-program comprehensive detection.
pub fn set_comprehensive_detection(enable: bool) -> bool {
    set(|o| {
        o.comprehensive_detection = enable;
        sync_activated(o);
    })
}

/// Set the interval between periodic detection passes.
pub fn set_periodic_detection_time(interval: Duration) -> bool {
    set(|o| o.periodic_detection_time = interval)
}

/// Collect full call stacks at novel acquisition sites instead of file and
/// line only.
pub fn set_collect_call_stack(enable: bool) -> bool {
    set(|o| o.collect_call_stack = enable)
}

/// Record caller information for first-level acquisitions.
pub fn set_collect_single_level_lock_stack(enable: bool) -> bool {
    set(|o| o.collect_single_level_lock_stack = enable)
}

/// Enable or disable double-lock checking.
pub fn set_check_double_locking(enable: bool) -> bool {
    set(|o| {
        o.check_double_locking = enable;
        sync_activated(o);
    })
}

/// Set the per-thread cap on recorded dependencies. Exceeding it at runtime
/// is fatal.
pub fn set_max_dependencies(count: usize) -> bool {
    set(|o| o.max_dependencies = count)
}

/// Set the cap on how many locks a thread may hold at once. Exceeding it at
/// runtime is fatal.
pub fn set_max_dependent_locks(count: usize) -> bool {
    set(|o| o.max_dependent_locks = count)
}

/// Set the cap on registered threads. Exceeding it at runtime is fatal.
pub fn set_max_threads(count: usize) -> bool {
    set(|o| o.max_threads = count)
}

/// Set the byte budget for captured call stacks.
pub fn set_max_call_stack_size(bytes: usize) -> bool {
    set(|o| o.max_call_stack_size = bytes)
}
