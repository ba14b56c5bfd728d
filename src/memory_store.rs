//! In-process `WagerStore` used by tests and the `memory` backend

use crate::common::traits::{decode_cursor, encode_cursor, StoreResult, WagerStore, MAX_LEDGER_PAGE};
use crate::common::types::{Account, BalanceUpdate, LedgerEntry, LedgerPage, ResolutionId};
use crate::errors::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    entries: HashMap<ResolutionId, LedgerEntry>,
    /// user id -> account version -> resolution id
    history: HashMap<String, BTreeMap<u64, ResolutionId>>,
}

/// Volatile store with the same commit semantics as the RocksDB store
#[derive(Default)]
pub struct MemoryWagerStore {
    state: RwLock<MemoryState>,
    failing_commits: AtomicU32,
}

impl MemoryWagerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a transient write error
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Number of committed ledger entries across all accounts
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

#[async_trait]
impl WagerStore for MemoryWagerStore {
    async fn create_account(&self, user_id: &str, opening_balance: u64) -> StoreResult<Account> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(user_id) {
            return Err(StoreError::AccountExists(user_id.to_string()));
        }
        let account = Account::open(user_id, opening_balance);
        state.accounts.insert(user_id.to_string(), account.clone());
        Ok(account)
    }

    async fn get_account(&self, user_id: &str) -> StoreResult<Option<Account>> {
        Ok(self.state.read().await.accounts.get(user_id).cloned())
    }

    async fn find_entry(&self, resolution_id: &ResolutionId) -> StoreResult<Option<LedgerEntry>> {
        Ok(self.state.read().await.entries.get(resolution_id).cloned())
    }

    async fn account_entries(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<LedgerPage> {
        let limit = limit.clamp(1, MAX_LEDGER_PAGE);
        let before = match cursor {
            Some(c) => decode_cursor(c)?,
            None => u64::MAX,
        };

        let state = self.state.read().await;
        let Some(history) = state.history.get(user_id) else {
            return Ok(LedgerPage::default());
        };

        let entries: Vec<LedgerEntry> = history
            .range(..before)
            .rev()
            .filter_map(|(_, id)| state.entries.get(id).cloned())
            .take(limit)
            .collect();

        let next_cursor = if entries.len() >= limit {
            entries.last().map(|entry| encode_cursor(entry.account_version))
        } else {
            None
        };

        Ok(LedgerPage { entries, next_cursor })
    }

    async fn commit(&self, update: &BalanceUpdate, entry: &LedgerEntry) -> StoreResult<Account> {
        if self.take_injected_failure() {
            tracing::debug!(resolution_id = %entry.resolution_id, "Injected commit failure");
            return Err(StoreError::WriteFailed("injected commit failure".to_string()));
        }

        let mut state = self.state.write().await;

        if state.entries.contains_key(&entry.resolution_id) {
            return Err(StoreError::DuplicateResolution(entry.resolution_id.to_string()));
        }

        let current = state
            .accounts
            .get(&update.user_id)
            .cloned()
            .ok_or_else(|| StoreError::AccountMissing(update.user_id.clone()))?;

        if current.version != update.expected_version {
            return Err(StoreError::VersionConflict {
                user_id: update.user_id.clone(),
                expected: update.expected_version,
                found: current.version,
            });
        }
        if entry.account_version != current.version + 1 {
            return Err(StoreError::CorruptedData(format!(
                "Entry {} carries version {}, account is at {}",
                entry.resolution_id, entry.account_version, current.version
            )));
        }

        let account = Account {
            balance: update.new_balance,
            version: entry.account_version,
            updated_at: entry.recorded_at,
            ..current
        };

        state.accounts.insert(account.user_id.clone(), account.clone());
        state.entries.insert(entry.resolution_id.clone(), entry.clone());
        state
            .history
            .entry(account.user_id.clone())
            .or_default()
            .insert(entry.account_version, entry.resolution_id.clone());

        Ok(account)
    }
}
