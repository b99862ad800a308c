//! Snapshot-based optimistic mutation helper.
//!
//! Every optimistic call site (reorder, delete, upload) goes through this
//! one audited path instead of hand-rolling its own snapshot variable.

use std::future::Future;

/// An in-flight optimistic mutation over `target`.
///
/// `begin` captures the state exactly as it was before this operation;
/// `rollback` restores that snapshot (never a refetch or an older cached
/// state), so rapid sequential operations each restore their own baseline.
#[must_use = "an optimistic mutation must be committed or rolled back"]
pub struct OptimisticMutation<'a, T: Clone> {
    target: &'a mut T,
    snapshot: T,
}

impl<'a, T: Clone> OptimisticMutation<'a, T> {
    /// Starts a mutation, snapshotting the current state.
    pub fn begin(target: &'a mut T) -> Self {
        let snapshot = target.clone();
        Self { target, snapshot }
    }

    /// Read access to the optimistically mutated state.
    pub fn state(&self) -> &T {
        self.target
    }

    /// Applies optimistic changes to the live state.
    pub fn state_mut(&mut self) -> &mut T {
        self.target
    }

    /// Keeps the optimistic changes.
    pub fn commit(self) {}

    /// Restores the pre-operation snapshot.
    pub fn rollback(self) {
        *self.target = self.snapshot;
    }

    /// Runs the persistence call and commits on success, rolls back on
    /// failure. The error is handed back unchanged for the caller to
    /// surface.
    pub async fn persist<F, Fut, E>(self, persist: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        match persist().await {
            Ok(()) => {
                self.commit();
                Ok(())
            }
            Err(error) => {
                self.rollback();
                Err(error)
            }
        }
    }
}
