//! Detector state, thread registry and global coordination.
//!
//! A `Detector` bundles the frozen option snapshot with the registry of
//! per-thread lock trees. The process-wide instance is created lazily by the
//! first wrapped-lock construction; creating it freezes the options and, if
//! periodic detection is enabled, starts the background ticker thread that
//! drives the periodical cycle search.

pub(crate) mod comprehensive;
pub(crate) mod periodical;

use crate::core::dep_stack::PathEntry;
use crate::core::options::{self, Options};
use crate::core::thread_state::ThreadState;
use crate::core::types::{DeadlockInfo, DeadlockKind, ThreadIndex};
use chrono::Utc;
use crossbeam_channel::{Sender, tick, unbounded};
use fxhash::FxHashMap;
use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Once, OnceLock};
use std::thread;

/// Options snapshot plus the registry of all per-thread lock trees.
pub(crate) struct Detector {
    opts: Options,
    /// Registered threads, dense by registration order. Append-only.
    threads: RwLock<Vec<Arc<ThreadState>>>,
    /// Platform thread id to registry index.
    thread_index: Mutex<FxHashMap<thread::ThreadId, ThreadIndex>>,
}

impl Detector {
    pub(crate) fn new(opts: Options) -> Self {
        let capacity = opts.max_threads;
        Detector {
            opts,
            threads: RwLock::new(Vec::with_capacity(capacity)),
            thread_index: Mutex::new(FxHashMap::default()),
        }
    }

    pub(crate) fn options(&self) -> &Options {
        &self.opts
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.threads.read().len()
    }

    /// Snapshot of the registered threads, dense by index.
    pub(crate) fn threads(&self) -> Vec<Arc<ThreadState>> {
        self.threads.read().clone()
    }

    pub(crate) fn thread(&self, index: ThreadIndex) -> Arc<ThreadState> {
        Arc::clone(&self.threads.read()[index])
    }

    /// Index of the calling thread, if it has ever acquired a wrapped lock.
    pub(crate) fn index_of_current(&self) -> Option<ThreadIndex> {
        self.thread_index
            .lock()
            .get(&thread::current().id())
            .copied()
    }

    /// Index of the calling thread, registering it first if needed.
    pub(crate) fn register_current(&self) -> ThreadIndex {
        let mut map = self.thread_index.lock();
        if let Some(&index) = map.get(&thread::current().id()) {
            return index;
        }
        let state = self.push_thread_state();
        map.insert(thread::current().id(), state.index());
        state.index()
    }

    /// Append a fresh thread state to the registry.
    pub(crate) fn push_thread_state(&self) -> Arc<ThreadState> {
        let mut threads = self.threads.write();
        if threads.len() >= self.opts.max_threads {
            panic!(
                "more than {} threads acquired wrapped locks. \
                 Increase the max_threads option.",
                self.opts.max_threads
            );
        }
        let state = Arc::new(ThreadState::new(threads.len()));
        threads.push(Arc::clone(&state));
        state
    }
}

static DETECTOR: OnceLock<Detector> = OnceLock::new();
static TICKER: Once = Once::new();

/// The process-wide detector, created on first use. Creation freezes the
/// options and starts the periodical ticker when configured.
pub(crate) fn global() -> &'static Detector {
    let detector = DETECTOR.get_or_init(|| Detector::new(options::freeze()));
    TICKER.call_once(|| {
        let opts = detector.options();
        if opts.activated && opts.periodic_detection {
            let interval = opts.periodic_detection_time;
            let capacity = opts.max_threads;
            let _ = thread::Builder::new()
                .name("locktree-periodical".into())
                .spawn(move || {
                    let ticker = tick(interval);
                    let mut last_holding = vec![0usize; capacity];
                    for _ in ticker.iter() {
                        periodical::run(global(), &mut last_holding);
                    }
                });
        }
    });
    detector
}

/// The global detector, if any wrapped lock has been created yet.
pub(crate) fn try_global() -> Option<&'static Detector> {
    DETECTOR.get()
}

/// User-provided callback receiving every finding.
static CALLBACK: OnceLock<Arc<dyn Fn(DeadlockInfo) + Send + Sync>> = OnceLock::new();

// Findings are dispatched to the callback from a dedicated thread so that a
// wedged application thread can never block delivery.
lazy_static! {
    static ref DISPATCHER: Dispatcher = Dispatcher::new();
}

struct Dispatcher {
    sender: Sender<DeadlockInfo>,
}

impl Dispatcher {
    fn new() -> Self {
        let (sender, receiver) = unbounded::<DeadlockInfo>();
        let _ = thread::Builder::new()
            .name("locktree-dispatch".into())
            .spawn(move || {
                while let Ok(info) = receiver.recv() {
                    if let Some(callback) = CALLBACK.get() {
                        callback(info);
                    }
                }
            });
        Dispatcher { sender }
    }
}

/// Register a callback invoked for every finding. May be set once, at any
/// time; returns false if a callback was already registered.
pub fn set_deadlock_callback<F>(callback: F) -> bool
where
    F: Fn(DeadlockInfo) + Send + Sync + 'static,
{
    CALLBACK.set(Arc::new(callback)).is_ok()
}

/// Send a finding to the registered callback, if any.
pub(crate) fn notify(kind: DeadlockKind, cycle: &[PathEntry]) {
    notify_info(DeadlockInfo {
        kind,
        locks: cycle.iter().map(|e| e.dep.lock().id()).collect(),
        threads: cycle.iter().map(|e| e.thread).collect(),
        timestamp: Utc::now().to_rfc3339(),
    });
}

pub(crate) fn notify_info(info: DeadlockInfo) {
    let _ = DISPATCHER.sender.send(info);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_dense_and_idempotent_per_thread() {
        let detector = Detector::new(Options::default());
        assert_eq!(detector.register_current(), 0);
        assert_eq!(detector.register_current(), 0);
        assert_eq!(detector.thread_count(), 1);

        let extra = detector.push_thread_state();
        assert_eq!(extra.index(), 1);
        assert_eq!(detector.thread_count(), 2);
        assert_eq!(detector.thread(1).index(), 1);
    }

    #[test]
    fn unregistered_thread_has_no_index() {
        let detector = Detector::new(Options::default());
        assert!(detector.index_of_current().is_none());
    }

    #[test]
    #[should_panic(expected = "max_threads")]
    fn thread_overflow_names_the_option() {
        let opts = Options {
            max_threads: 1,
            ..Options::default()
        };
        let detector = Detector::new(opts);
        detector.push_thread_state();
        detector.push_thread_state();
    }
}
