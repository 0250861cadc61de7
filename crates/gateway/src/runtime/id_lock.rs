//! Per-id serialization of registry mutations.
//!
//! Create and delete for the same session id run one at a time; different
//! ids never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

pub struct IdLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for IdLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl IdLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `id`. The permit releases on drop.
    pub async fn acquire(&self, id: &str) -> Result<OwnedSemaphorePermit, AcquireError> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| Arc::strong_count(sem) > 1);
    }
}
