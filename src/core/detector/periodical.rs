//! Periodic search for live local deadlocks.
//!
//! The background ticker calls into this module at a fixed cadence. The scan
//! restricts each thread's candidate set to its most recently added
//! dependency: threads wedged in a cycle sit on exactly those dependencies,
//! while everything older is noise here. Before an alarm fires, each thread
//! on the found cycle is re-checked against the tick's snapshot; a thread
//! that advanced in the meantime proves the cycle was a stale read, and the
//! alarm is discarded.

use crate::core::chain::{is_chain, is_cycle_chain};
use crate::core::dep_stack::{DepStack, PathEntry};
use crate::core::dependency::Dependency;
use crate::core::detector::{self, Detector, comprehensive};
use crate::core::reporter;
use crate::core::thread_state::ThreadState;
use crate::core::types::{DeadlockKind, LockId};
use std::process;
use std::sync::Arc;

/// One tick of the periodical detection. On a confirmed cycle the deadlock
/// is reported, a comprehensive pass collects everything else the run has
/// shown, and the process exits with status 2: after a confirmed deadlock
/// there is nothing sound left to resume.
pub(crate) fn run(detector: &Detector, last_holding: &mut [LockId]) {
    if let Some(cycle) = scan(detector, last_holding) {
        reporter::report_local_deadlock();
        detector::notify(DeadlockKind::Confirmed, &cycle);
        comprehensive::run(detector);
        process::exit(2);
    }
}

/// Poll the registered threads and search for a stable cycle among their
/// most recent dependencies. Returns the cycle if one is confirmed.
pub(crate) fn scan(detector: &Detector, last_holding: &mut [LockId]) -> Option<Vec<PathEntry>> {
    let threads = detector.threads();

    // Cheap pre-scan over the published atomics: only search when the
    // situation changed since the last tick and at least two threads hold
    // more than one lock.
    let mut changed = false;
    let mut multi_holders = 0;
    for state in &threads {
        let index = state.index();
        let count = state.holding_count();
        if count > 1 {
            multi_holders += 1;
        }
        if count > 0 {
            let top = state.holding_top();
            if last_holding[index] != top {
                last_holding[index] = top;
                changed = true;
            }
        } else if last_holding[index] != 0 {
            last_holding[index] = 0;
            changed = true;
        }
    }
    if !changed || multi_holders <= 1 {
        return None;
    }

    detect(&threads, last_holding)
}

fn detect(threads: &[Arc<ThreadState>], last_holding: &[LockId]) -> Option<Vec<PathEntry>> {
    let current: Vec<Option<Arc<Dependency>>> =
        threads.iter().map(|t| t.current_dep()).collect();

    let mut stack = DepStack::new();
    let mut traversed = vec![false; threads.len()];

    for (visiting, state) in threads.iter().enumerate() {
        let Some(dep) = current[visiting].clone() else {
            continue;
        };
        traversed[visiting] = true;
        stack.push(dep, visiting);
        let found = dfs(threads, &current, &mut stack, visiting, &mut traversed, last_holding);
        stack.pop();
        // The seed has been examined; the owning thread republishes on its
        // next novel acquisition.
        state.take_current_dep();
        if found.is_some() {
            return found;
        }
    }
    None
}

fn dfs(
    threads: &[Arc<ThreadState>],
    current: &[Option<Arc<Dependency>>],
    stack: &mut DepStack,
    visiting: usize,
    traversed: &mut [bool],
    last_holding: &[LockId],
) -> Option<Vec<PathEntry>> {
    for i in visiting + 1..threads.len() {
        if traversed[i] {
            continue;
        }
        let Some(dep) = current[i].as_ref() else {
            continue;
        };
        if !is_chain(stack, dep, i) {
            continue;
        }
        if is_cycle_chain(stack, dep, i) {
            stack.push(Arc::clone(dep), i);
            if is_stable(threads, stack, last_holding) {
                return Some(stack.snapshot());
            }
            // A thread on the cycle moved on since the tick began; the
            // alarm is stale.
            stack.pop();
        } else {
            traversed[i] = true;
            stack.push(Arc::clone(dep), i);
            let found = dfs(threads, current, stack, visiting, traversed, last_holding);
            if found.is_some() {
                return found;
            }
            stack.pop();
            traversed[i] = false;
        }
    }
    None
}

/// Whether every thread on the path still sits where the tick's pre-scan
/// saw it.
fn is_stable(threads: &[Arc<ThreadState>], stack: &DepStack, last_holding: &[LockId]) -> bool {
    stack.iter().all(|entry| {
        let state = &threads[entry.thread];
        if state.holding_count() > 0 {
            last_holding[entry.thread] == state.holding_top()
        } else {
            last_holding[entry.thread] == 0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lock_state::LockState;
    use crate::core::options::Options;
    use crate::core::types::LockKind;
    use std::panic::Location;

    fn exclusive() -> Arc<LockState> {
        LockState::new(LockKind::Exclusive, Location::caller())
    }

    /// Two threads each holding one lock and blocked acquiring the other:
    /// bookkeeping records the pending lock before the primitive call, so
    /// both holding sets have depth two.
    fn wedged_pair(detector: &Detector) -> (Arc<LockState>, Arc<LockState>) {
        detector.push_thread_state();
        detector.push_thread_state();
        let a = exclusive();
        let b = exclusive();

        let t0 = detector.thread(0);
        t0.update_lock(&a, false, Location::caller(), detector.options());
        t0.update_lock(&b, false, Location::caller(), detector.options());

        let t1 = detector.thread(1);
        t1.update_lock(&b, false, Location::caller(), detector.options());
        t1.update_lock(&a, false, Location::caller(), detector.options());

        (a, b)
    }

    #[test]
    fn wedged_pair_is_confirmed_on_first_tick() {
        let det = Detector::new(Options::default());
        let (a, b) = wedged_pair(&det);

        let mut last_holding = vec![0; det.options().max_threads];
        let cycle = scan(&det, &mut last_holding).expect("cycle should be confirmed");
        assert_eq!(cycle.len(), 2);
        let locks: Vec<_> = cycle.iter().map(|e| e.dep.lock().id()).collect();
        assert!(locks.contains(&a.id()));
        assert!(locks.contains(&b.id()));
    }

    #[test]
    fn unchanged_situation_is_not_rescanned() {
        let det = Detector::new(Options::default());
        wedged_pair(&det);

        let mut last_holding = vec![0; det.options().max_threads];
        assert!(scan(&det, &mut last_holding).is_some());
        // Nothing moved since the previous tick, and the seeds were
        // consumed: the next tick must stay quiet.
        assert!(scan(&det, &mut last_holding).is_none());
    }

    #[test]
    fn single_multi_holder_is_not_searched() {
        let det = Detector::new(Options::default());
        det.push_thread_state();
        det.push_thread_state();
        let a = exclusive();
        let b = exclusive();
        let c = exclusive();

        let t0 = det.thread(0);
        t0.update_lock(&a, false, Location::caller(), det.options());
        t0.update_lock(&b, false, Location::caller(), det.options());
        // Thread 1 holds a single lock; no cycle can involve it.
        let t1 = det.thread(1);
        t1.update_lock(&c, false, Location::caller(), det.options());

        let mut last_holding = vec![0; det.options().max_threads];
        assert!(scan(&det, &mut last_holding).is_none());
    }

    #[test]
    fn advanced_thread_makes_the_alarm_stale() {
        let det = Detector::new(Options::default());
        let (a, _) = wedged_pair(&det);
        let threads = det.threads();

        // Snapshot claims thread 0 still sat on top of `a`; it has since
        // acquired more, so the cycle must be treated as stale.
        let mut last_holding = vec![0; det.options().max_threads];
        last_holding[0] = a.id();
        last_holding[1] = threads[1].holding_top();

        assert!(detect(&threads, &last_holding).is_none());
    }
}
