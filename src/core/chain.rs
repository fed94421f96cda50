//! Validity and closure tests for dependency chains.
//!
//! A chain is a sequence of dependencies, one per thread, where each link's
//! acquired lock reappears in the next dependency's holding set. Two rules
//! keep the search sound for reader/writer locks:
//!
//! * two reader acquisitions of the same lock never form a link or close a
//!   cycle, since shared readers cannot block each other, and
//! * a lock held in the holding sets of two different path dependencies is a
//!   gate lock that serializes the two acquisition orders, unless both holds
//!   are reader acquisitions.

use crate::core::dep_stack::DepStack;
use crate::core::dependency::Dependency;
use crate::core::types::ThreadIndex;
use std::sync::Arc;

/// Whether extending `path` with `cand` (recorded by thread `cand_thread`)
/// still forms a valid dependency chain.
///
/// Must only be called on a non-empty path.
pub(crate) fn is_chain(path: &DepStack, cand: &Arc<Dependency>, cand_thread: ThreadIndex) -> bool {
    let top = path.top().expect("chain test on empty path");

    // Link condition: the lock acquired at the top of the path must be held
    // by cand, with at least one witness that is not reader over reader.
    let mut linked = false;
    for held in cand.holding_set() {
        if held.id() == top.dep.lock().id()
            && !(held.is_reader_hold(cand_thread) && top.dep.lock().is_reader_hold(top.thread))
        {
            linked = true;
            break;
        }
    }
    if !linked {
        return false;
    }

    for entry in path.iter() {
        // The same dependency may appear only once on the path.
        if Arc::ptr_eq(&entry.dep, cand) {
            return false;
        }

        // Gate-lock freedom: a lock shared between two holding sets on the
        // path serializes the orders unless both holds are reader holds.
        for held in cand.holding_set() {
            for other in entry.dep.holding_set() {
                if held.id() == other.id()
                    && !(other.is_reader_hold(entry.thread) && held.is_reader_hold(cand_thread))
                {
                    return false;
                }
            }
        }
    }

    true
}

/// Whether `cand` closes `path` into a cycle: its acquired lock must appear
/// in the holding set of the path's bottom dependency, under the same
/// reader/writer witness rule as the link condition.
///
/// Assumes `is_chain(path, cand, cand_thread)` already holds.
pub(crate) fn is_cycle_chain(
    path: &DepStack,
    cand: &Arc<Dependency>,
    cand_thread: ThreadIndex,
) -> bool {
    let bottom = path.bottom().expect("cycle test on empty path");
    bottom.dep.holding_set().iter().any(|held| {
        held.id() == cand.lock().id()
            && !(held.is_reader_hold(bottom.thread) && cand.lock().is_reader_hold(cand_thread))
    })
}
