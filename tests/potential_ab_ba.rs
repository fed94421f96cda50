//! Two threads acquire two locks in opposite orders without ever blocking
//! each other. The comprehensive pass must still report the inversion as a
//! potential deadlock.

mod common;

use locktree::{DeadlockKind, Mutex, find_potential_deadlocks};
use std::sync::Arc;
use std::thread;

#[test]
fn inverted_acquisition_order_is_a_potential_deadlock() {
    let findings = common::finding_channel();

    let a = Arc::new(Mutex::new(()));
    let b = Arc::new(Mutex::new(()));
    let a_id = a.id();
    let b_id = b.id();

    // The threads run strictly one after the other, so no deadlock can
    // manifest at runtime.
    let (a1, b1) = (Arc::clone(&a), Arc::clone(&b));
    thread::spawn(move || {
        let _a = a1.lock();
        let _b = b1.lock();
    })
    .join()
    .unwrap();

    let (a2, b2) = (Arc::clone(&a), Arc::clone(&b));
    thread::spawn(move || {
        let _b = b2.lock();
        let _a = a2.lock();
    })
    .join()
    .unwrap();

    find_potential_deadlocks();

    let info = common::expect_finding(&findings);
    assert_eq!(info.kind, DeadlockKind::Potential);
    assert!(info.locks.contains(&a_id));
    assert!(info.locks.contains(&b_id));
    common::expect_no_finding(&findings);
}
