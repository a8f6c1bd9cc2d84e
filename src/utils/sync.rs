//! Per-site mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per site key, created on first use.
///
/// Work on different sites never contends; two tasks for the same site run
/// one after the other.
#[derive(Debug, Default)]
pub struct SiteLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SiteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `site`.
    pub async fn acquire(&self, site: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(site.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_site_is_exclusive() {
        let locks = SiteLocks::new();
        let guard = locks.acquire("a").await;

        let lock = {
            let map = locks.locks.lock().unwrap();
            Arc::clone(&map["a"])
        };
        assert!(lock.try_lock().is_err());

        // A different site is independent.
        let _other = locks.acquire("b").await;

        drop(guard);
        assert!(lock.try_lock().is_ok());
    }
}
