//! The DFS path over dependency chains.

use crate::core::dependency::Dependency;
use crate::core::types::ThreadIndex;
use std::sync::Arc;

/// One step of the path: a dependency and the thread it was recorded by.
#[derive(Clone)]
pub(crate) struct PathEntry {
    pub dep: Arc<Dependency>,
    pub thread: ThreadIndex,
}

/// The currently explored chain of dependencies, bottom to top.
///
/// Extending and backtracking the path maps to push and pop; the chain
/// predicates walk it front to back.
#[derive(Default)]
pub(crate) struct DepStack {
    entries: Vec<PathEntry>,
}

impl DepStack {
    pub(crate) fn new() -> Self {
        DepStack::default()
    }

    pub(crate) fn push(&mut self, dep: Arc<Dependency>, thread: ThreadIndex) {
        self.entries.push(PathEntry { dep, thread });
    }

    pub(crate) fn pop(&mut self) {
        self.entries.pop();
    }

    /// First real element of the path, the seed of the search.
    pub(crate) fn bottom(&self) -> Option<&PathEntry> {
        self.entries.first()
    }

    /// Most recently pushed element.
    pub(crate) fn top(&self) -> Option<&PathEntry> {
        self.entries.last()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.iter()
    }

    /// Clone of the path contents, bottom to top, for reporting.
    pub(crate) fn snapshot(&self) -> Vec<PathEntry> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lock_state::LockState;
    use crate::core::types::LockKind;
    use std::panic::Location;

    fn dep() -> Arc<Dependency> {
        let a = LockState::new(LockKind::Exclusive, Location::caller());
        let b = LockState::new(LockKind::Exclusive, Location::caller());
        Arc::new(Dependency::new(b, &[a]))
    }

    #[test]
    fn push_pop_track_bottom_and_top() {
        let mut stack = DepStack::new();
        assert!(stack.bottom().is_none());

        let first = dep();
        let second = dep();
        stack.push(first.clone(), 0);
        stack.push(second.clone(), 1);

        assert!(Arc::ptr_eq(&stack.bottom().unwrap().dep, &first));
        assert!(Arc::ptr_eq(&stack.top().unwrap().dep, &second));
        assert_eq!(stack.iter().count(), 2);

        stack.pop();
        assert!(Arc::ptr_eq(&stack.top().unwrap().dep, &first));
        stack.pop();
        assert!(stack.top().is_none());
        // Popping an empty path stays empty.
        stack.pop();
        assert!(stack.bottom().is_none());
    }
}
