//! LeaderLock — single-active-scheduler mutual exclusion.
//!
//! A scheduler instance acquires the lock node for its service identity
//! before touching any persisted configuration. A second instance finds
//! the node held and fails fast, having written nothing; the incumbent
//! is unaffected. Dropping the guard releases the node, so a cleanly
//! exiting scheduler hands leadership back.

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StateResult;
use crate::store::StateStore;

/// RAII guard over the store's leadership lock node.
pub struct LeaderLock {
    store: StateStore,
    service: String,
    owner: Uuid,
    held: bool,
}

impl std::fmt::Debug for LeaderLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderLock")
            .field("service", &self.service)
            .field("owner", &self.owner)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

impl LeaderLock {
    /// Acquire the lock for `service` on behalf of `owner`.
    ///
    /// Returns [`crate::StateError::LockContended`] if another instance
    /// holds it; in that case the store is untouched.
    pub fn acquire(store: &StateStore, service: &str, owner: Uuid) -> StateResult<Self> {
        store.try_acquire_lock(service, owner)?;
        info!(%service, %owner, "leadership lock acquired");
        Ok(Self {
            store: store.clone(),
            service: service.to_string(),
            owner,
            held: true,
        })
    }

    /// The instance id holding this lock.
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Release the lock explicitly.
    pub fn release(mut self) -> StateResult<()> {
        self.release_inner().map(|_| ())
    }

    fn release_inner(&mut self) -> StateResult<bool> {
        if !self.held {
            return Ok(false);
        }
        self.held = false;
        let released = self.store.release_lock(&self.service, self.owner)?;
        if released {
            info!(service = %self.service, "leadership lock released");
        }
        Ok(released)
    }
}

impl Drop for LeaderLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(service = %self.service, error = %e, "failed to release leadership lock");
        }
    }
}
