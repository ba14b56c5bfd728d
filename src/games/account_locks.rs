use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per account.
///
/// Everything that reads and then changes an account's balance holds that
/// account's guard for the whole read-decide-commit sequence. Different
/// accounts never contend.
pub struct AccountLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `user_id`
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting
        let mutex = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Number of accounts that have ever been locked
    pub fn tracked_accounts(&self) -> usize {
        self.locks.len()
    }
}

impl Default for AccountLocks {
    fn default() -> Self {
        Self::new()
    }
}
