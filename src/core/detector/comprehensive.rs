//! End-of-program cycle search over the union of all recorded dependencies.
//!
//! Depth-first search over the per-thread lock trees, seeded from every
//! (thread, dependency) pair. Canonical ordering keeps each cycle from being
//! reported once per rotation: the recursion only considers threads with a
//! higher index than the seed's, so the rotation whose minimum-index thread
//! sits at the bottom of the path is the one that gets reported.

use crate::core::chain::{is_chain, is_cycle_chain};
use crate::core::dep_stack::{DepStack, PathEntry};
use crate::core::dependency::Dependency;
use crate::core::detector::{self, Detector};
use crate::core::reporter;
use crate::core::types::DeadlockKind;
use fxhash::FxHashSet;
use std::sync::Arc;

/// Search all recorded acquisition orders for cycles and report each one as
/// a potential deadlock.
///
/// Intended to run once the program is finishing, typically arranged at the
/// start of `main`. Findings are written to standard error and handed to the
/// deadlock callback; the process is not terminated.
pub fn find_potential_deadlocks() {
    if let Some(detector) = detector::try_global() {
        run(detector);
    }
}

pub(crate) fn run(detector: &Detector) {
    if !detector.options().comprehensive_detection {
        return;
    }
    for cycle in scan(detector) {
        reporter::report_potential_deadlock(&cycle, detector.options());
        detector::notify(DeadlockKind::Potential, &cycle);
    }
}

/// Collect every canonical cycle in the recorded dependency sets.
pub(crate) fn scan(detector: &Detector) -> Vec<Vec<PathEntry>> {
    let threads = detector.threads();
    if threads.len() < 2 {
        return Vec::new();
    }

    let dependencies: Vec<Vec<Arc<Dependency>>> = threads
        .iter()
        .map(|t| t.dependencies_snapshot())
        .collect();

    // A cycle needs at least two distinct (acquired, holding set)
    // signatures; skip the whole search otherwise.
    if !has_two_unique_dependencies(&dependencies) {
        return Vec::new();
    }

    let mut cycles = Vec::new();
    let mut stack = DepStack::new();
    let mut traversed = vec![false; threads.len()];

    for (visiting, deps) in dependencies.iter().enumerate() {
        for dep in deps {
            traversed[visiting] = true;
            stack.push(Arc::clone(dep), visiting);
            dfs(&dependencies, &mut stack, visiting, &mut traversed, &mut cycles);
            stack.pop();
        }
    }

    cycles
}

fn dfs(
    dependencies: &[Vec<Arc<Dependency>>],
    stack: &mut DepStack,
    visiting: usize,
    traversed: &mut [bool],
    cycles: &mut Vec<Vec<PathEntry>>,
) {
    // Threads with index <= visiting were already exhausted as seeds.
    for i in visiting + 1..dependencies.len() {
        if traversed[i] {
            continue;
        }
        for dep in &dependencies[i] {
            if !is_chain(stack, dep, i) {
                continue;
            }
            if is_cycle_chain(stack, dep, i) {
                stack.push(Arc::clone(dep), i);
                cycles.push(stack.snapshot());
                stack.pop();
            } else {
                stack.push(Arc::clone(dep), i);
                traversed[i] = true;
                dfs(dependencies, stack, visiting, traversed, cycles);
                stack.pop();
                traversed[i] = false;
            }
        }
    }
}

/// Whether at least two distinct (acquired, holding set) signatures exist
/// across all threads.
fn has_two_unique_dependencies(dependencies: &[Vec<Arc<Dependency>>]) -> bool {
    let mut seen = FxHashSet::default();
    for deps in dependencies {
        for dep in deps {
            let mut signature = Vec::with_capacity(1 + dep.holding_count());
            signature.push(dep.lock().id());
            signature.extend(dep.holding_set().iter().map(|l| l.id()));
            seen.insert(fxhash::hash64(&signature));
            if seen.len() >= 2 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lock_state::LockState;
    use crate::core::options::Options;
    use crate::core::types::LockKind;
    use std::panic::Location;

    fn detector() -> Detector {
        Detector::new(Options::default())
    }

    fn exclusive() -> Arc<LockState> {
        LockState::new(LockKind::Exclusive, Location::caller())
    }

    fn acquire(
        detector: &Detector,
        thread: usize,
        m: &Arc<LockState>,
        reader: bool,
    ) {
        detector
            .thread(thread)
            .update_lock(m, reader, Location::caller(), detector.options());
    }

    fn release(detector: &Detector, thread: usize, m: &Arc<LockState>) {
        detector.thread(thread).update_unlock(m);
    }

    #[test]
    fn two_thread_inversion_is_one_cycle() {
        let det = detector();
        det.push_thread_state();
        det.push_thread_state();
        let a = exclusive();
        let b = exclusive();

        acquire(&det, 0, &a, false);
        acquire(&det, 0, &b, false);
        release(&det, 0, &b);
        release(&det, 0, &a);

        acquire(&det, 1, &b, false);
        acquire(&det, 1, &a, false);
        release(&det, 1, &a);
        release(&det, 1, &b);

        let cycles = scan(&det);
        assert_eq!(cycles.len(), 1);
        let locks: Vec<_> = cycles[0].iter().map(|e| e.dep.lock().id()).collect();
        assert!(locks.contains(&a.id()));
        assert!(locks.contains(&b.id()));
    }

    #[test]
    fn three_thread_triangle_is_one_cycle() {
        let det = detector();
        for _ in 0..3 {
            det.push_thread_state();
        }
        let a = exclusive();
        let b = exclusive();
        let c = exclusive();

        for (thread, (first, second)) in [(&a, &b), (&b, &c), (&c, &a)].iter().enumerate() {
            acquire(&det, thread, first, false);
            acquire(&det, thread, second, false);
            release(&det, thread, second);
            release(&det, thread, first);
        }

        let cycles = scan(&det);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
    }

    #[test]
    fn consistent_order_has_no_cycle() {
        let det = detector();
        det.push_thread_state();
        det.push_thread_state();
        let a = exclusive();
        let b = exclusive();

        for thread in 0..2 {
            acquire(&det, thread, &a, false);
            acquire(&det, thread, &b, false);
            release(&det, thread, &b);
            release(&det, thread, &a);
        }
        assert!(scan(&det).is_empty());
    }

    #[test]
    fn gate_lock_suppresses_the_inversion() {
        let det = detector();
        det.push_thread_state();
        det.push_thread_state();
        let g = exclusive();
        let a = exclusive();
        let b = exclusive();

        for (thread, (first, second)) in [(&a, &b), (&b, &a)].iter().enumerate() {
            acquire(&det, thread, &g, false);
            acquire(&det, thread, first, false);
            acquire(&det, thread, second, false);
            release(&det, thread, second);
            release(&det, thread, first);
            release(&det, thread, &g);
        }
        assert!(scan(&det).is_empty());
    }

    #[test]
    fn reader_reader_gate_is_rescued() {
        let det = detector();
        det.push_thread_state();
        det.push_thread_state();
        let a = LockState::new(LockKind::ReadWrite, Location::caller());
        let b = exclusive();

        // Thread 0: read A, lock B. Thread 1: lock B, read A.
        acquire(&det, 0, &a, true);
        acquire(&det, 0, &b, false);
        release(&det, 0, &b);
        release(&det, 0, &a);

        acquire(&det, 1, &b, false);
        acquire(&det, 1, &a, true);
        release(&det, 1, &a);
        release(&det, 1, &b);

        assert!(scan(&det).is_empty());
    }

    #[test]
    fn single_thread_inversion_is_not_reported() {
        let det = detector();
        det.push_thread_state();
        det.push_thread_state();
        let a = exclusive();
        let b = exclusive();

        // Both orders observed, but by the same thread.
        acquire(&det, 0, &a, false);
        acquire(&det, 0, &b, false);
        release(&det, 0, &b);
        release(&det, 0, &a);
        acquire(&det, 0, &b, false);
        acquire(&det, 0, &a, false);
        release(&det, 0, &a);
        release(&det, 0, &b);

        assert!(scan(&det).is_empty());
    }
}
