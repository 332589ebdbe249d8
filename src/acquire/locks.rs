use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use super::naming::artifact_root;

/// One async mutex per artifact root.
///
/// Locks are keyed on [`artifact_root`], so `clip` and `clip_processed_video`
/// share a lock: the second one's input file is a derived artifact of the
/// first. Requests on one root run their cleanup, fetch and processing one
/// after another; unrelated roots never wait on each other.
#[derive(Clone, Default)]
pub struct BaseNameLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Exclusive right to the artifacts of one root, released on drop
pub struct BaseNameLease {
    root: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for BaseNameLease {
    fn drop(&mut self) {
        debug!("Released base name lock: {}", self.root);
    }
}

impl fmt::Debug for BaseNameLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseNameLease").field("root", &self.root).finish()
    }
}

impl BaseNameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, base: &str) -> BaseNameLease {
        let root = artifact_root(base).to_string();
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries only referenced by the map are idle
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(root.clone()).or_default().clone()
        };

        debug!("Waiting for base name lock: {} (root {})", base, root);
        let guard = lock.lock_owned().await;
        debug!("Holding base name lock: {}", root);

        BaseNameLease { root, _guard: guard }
    }

    /// Number of artifact roots currently held or awaited
    pub fn active(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}
