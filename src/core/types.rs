use serde::{Deserialize, Serialize};

/// Identifier of a wrapped lock, assigned at creation and stable for the
/// lifetime of the process. `0` is reserved and never assigned.
pub type LockId = usize;

/// Dense index of a registered thread in the thread registry.
pub type ThreadIndex = usize;

/// The flavor of a wrapped lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Plain mutual exclusion, one holder at a time.
    Exclusive,
    /// Reader/writer lock, shared readers or one writer.
    ReadWrite,
}

/// Which analysis produced a finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeadlockKind {
    /// A cyclic acquisition order that could deadlock under another schedule.
    Potential,
    /// A live cycle confirmed by the periodical detector; the process is
    /// terminated after reporting.
    Confirmed,
    /// A thread re-acquired an exclusive lock it already holds.
    DoubleLock,
}

/// Lock lifecycle events recorded by the optional event log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LockEvent {
    /// The lock was constructed.
    Created,
    /// A thread finished acquiring the lock.
    Acquired,
    /// A thread released the lock.
    Released,
}

/// Description of a finding, handed to the registered deadlock callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockInfo {
    /// Which analysis produced the finding.
    pub kind: DeadlockKind,
    /// Locks involved, in cycle order where applicable.
    pub locks: Vec<LockId>,
    /// Registered indices of the threads involved.
    pub threads: Vec<ThreadIndex>,
    /// RFC 3339 timestamp of the finding.
    pub timestamp: String,
}
