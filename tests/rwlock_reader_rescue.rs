//! The inversion from the AB/BA scenario, but the shared lock is a reader/
//! writer lock and both threads take it shared. Two reader holds cannot
//! block each other, so no cycle may be reported.

mod common;

use locktree::{Mutex, RwLock, find_potential_deadlocks};
use std::sync::Arc;
use std::thread;

#[test]
fn reader_acquisitions_do_not_close_a_cycle() {
    let findings = common::finding_channel();

    let a = Arc::new(RwLock::new(()));
    let b = Arc::new(Mutex::new(()));

    let (a1, b1) = (Arc::clone(&a), Arc::clone(&b));
    thread::spawn(move || {
        let _a = a1.read();
        let _b = b1.lock();
    })
    .join()
    .unwrap();

    let (a2, b2) = (Arc::clone(&a), Arc::clone(&b));
    thread::spawn(move || {
        let _b = b2.lock();
        let _a = a2.read();
    })
    .join()
    .unwrap();

    find_potential_deadlocks();
    common::expect_no_finding(&findings);
}
