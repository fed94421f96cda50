use locktree::DeadlockInfo;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

/// Register a deadlock callback that forwards every finding into a channel.
///
/// Must be called before the scenario runs; the callback is process-global
/// and can only be registered once, so each scenario lives in its own test
/// binary.
pub fn finding_channel() -> Receiver<DeadlockInfo> {
    let (tx, rx) = mpsc::channel::<DeadlockInfo>();
    assert!(
        locktree::set_deadlock_callback(move |info| {
            let _ = tx.send(info);
        }),
        "callback was already registered"
    );
    rx
}

/// Wait for one finding, panicking if none arrives in time.
#[allow(dead_code)]
pub fn expect_finding(rx: &Receiver<DeadlockInfo>) -> DeadlockInfo {
    rx.recv_timeout(Duration::from_secs(2))
        .expect("expected a deadlock finding, got none")
}

/// Assert that no finding arrives within a grace period.
#[allow(dead_code)]
pub fn expect_no_finding(rx: &Receiver<DeadlockInfo>) {
    assert!(
        rx.recv_timeout(Duration::from_millis(500)).is_err(),
        "expected no deadlock finding"
    );
}
