//! Shared read handle over committed state.
//!
//! # Invariants
//! - Readers only ever see a snapshot that was fully committed.
//! - Publishing swaps one `Arc` under the write lock; readers clone the `Arc`
//!   and release the lock before doing any work.

use crate::store::snapshot::Snapshot;
use std::sync::{Arc, PoisonError, RwLock};

/// Cloneable, thread-safe handle to the latest committed snapshot.
#[derive(Debug, Clone)]
pub struct CommittedView {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl CommittedView {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Returns the latest committed snapshot.
    ///
    /// The returned value is unaffected by later commits.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        // Poisoning cannot leave a half-written snapshot: the guarded value is
        // replaced in one assignment.
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn publish(&self, snapshot: Arc<Snapshot>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}
