//! Accounts and ledger entries persisted in RocksDB.
//!
//! Key layout:
//! - `account:<hex user id>` -> account JSON
//! - `ledger:entry:<resolution id>` -> entry JSON
//! - `ledger:history:<hex user id>:<inverted version, be>` -> resolution id
//!
//! The history index sorts newest first. A commit writes all three keys in
//! one `WriteBatch`.

use crate::common::traits::{decode_cursor, encode_cursor, StoreResult, WagerStore, MAX_LEDGER_PAGE};
use crate::common::types::{Account, BalanceUpdate, LedgerEntry, LedgerPage, ResolutionId};
use crate::errors::StoreError;
use crate::storage::OptimizedStorage;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Mutex;

const ACCOUNT_PREFIX: &[u8] = b"account:";
const ENTRY_PREFIX: &[u8] = b"ledger:entry:";
const HISTORY_PREFIX: &[u8] = b"ledger:history:";

fn account_key(user_id: &str) -> Vec<u8> {
    let mut key = ACCOUNT_PREFIX.to_vec();
    key.extend_from_slice(hex::encode(user_id).as_bytes());
    key
}

fn entry_key(resolution_id: &ResolutionId) -> Vec<u8> {
    let mut key = ENTRY_PREFIX.to_vec();
    key.extend_from_slice(resolution_id.as_str().as_bytes());
    key
}

fn history_prefix(user_id: &str) -> Vec<u8> {
    let mut key = HISTORY_PREFIX.to_vec();
    key.extend_from_slice(hex::encode(user_id).as_bytes());
    key.push(b':');
    key
}

fn history_key(user_id: &str, account_version: u64) -> Vec<u8> {
    let mut key = history_prefix(user_id);
    key.extend_from_slice(&(u64::MAX - account_version).to_be_bytes());
    key
}

fn encode<T: Serialize>(value: &T, what: &str) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| StoreError::WriteFailed(format!("Failed to encode {}: {}", what, e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> StoreResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::CorruptedData(format!("Failed to decode {}: {}", what, e)))
}

/// `WagerStore` over a RocksDB instance
pub struct RocksWagerStore {
    storage: OptimizedStorage,
    // Serializes the read-check-write section of commits
    commit_lock: Mutex<()>,
}

impl RocksWagerStore {
    pub fn new(storage: OptimizedStorage) -> Self {
        Self {
            storage,
            commit_lock: Mutex::new(()),
        }
    }

    fn read(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.storage
            .get(key)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))
    }

    fn load_account(&self, user_id: &str) -> StoreResult<Option<Account>> {
        match self.read(&account_key(user_id))? {
            Some(bytes) => Ok(Some(decode(&bytes, &format!("account {}", user_id))?)),
            None => Ok(None),
        }
    }

    fn load_entry(&self, resolution_id: &ResolutionId) -> StoreResult<Option<LedgerEntry>> {
        match self.read(&entry_key(resolution_id))? {
            Some(bytes) => Ok(Some(decode(&bytes, &format!("ledger entry {}", resolution_id))?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl WagerStore for RocksWagerStore {
    async fn create_account(&self, user_id: &str, opening_balance: u64) -> StoreResult<Account> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| StoreError::WriteFailed("commit lock poisoned".to_string()))?;

        if self.load_account(user_id)?.is_some() {
            return Err(StoreError::AccountExists(user_id.to_string()));
        }

        let account = Account::open(user_id, opening_balance);
        let bytes = encode(&account, "account")?;
        self.storage.put(&account_key(user_id), &bytes)?;

        tracing::debug!(user_id, opening_balance, "Account created");
        Ok(account)
    }

    async fn get_account(&self, user_id: &str) -> StoreResult<Option<Account>> {
        self.load_account(user_id)
    }

    async fn find_entry(&self, resolution_id: &ResolutionId) -> StoreResult<Option<LedgerEntry>> {
        self.load_entry(resolution_id)
    }

    async fn account_entries(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<LedgerPage> {
        let limit = limit.clamp(1, MAX_LEDGER_PAGE);
        let start_after = match cursor {
            Some(c) => Some(history_key(user_id, decode_cursor(c)?)),
            None => None,
        };

        let rows = self
            .storage
            .scan_prefix(&history_prefix(user_id), start_after.as_deref(), limit)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for (_key, value) in rows {
            let raw = String::from_utf8(value)
                .map_err(|e| StoreError::CorruptedData(format!("History value is not UTF-8: {}", e)))?;
            let resolution_id = ResolutionId::new(raw)
                .map_err(|e| StoreError::CorruptedData(e.to_string()))?;

            match self.load_entry(&resolution_id)? {
                Some(entry) => entries.push(entry),
                None => {
                    tracing::warn!(user_id, %resolution_id, "History index points at a missing ledger entry");
                }
            }
        }

        let next_cursor = if entries.len() >= limit {
            entries.last().map(|entry| encode_cursor(entry.account_version))
        } else {
            None
        };

        Ok(LedgerPage { entries, next_cursor })
    }

    async fn commit(&self, update: &BalanceUpdate, entry: &LedgerEntry) -> StoreResult<Account> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| StoreError::WriteFailed("commit lock poisoned".to_string()))?;

        if self.read(&entry_key(&entry.resolution_id))?.is_some() {
            return Err(StoreError::DuplicateResolution(entry.resolution_id.to_string()));
        }

        let current = self
            .load_account(&update.user_id)?
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

        let items: Vec<(Vec<u8>, Vec<u8>)> = vec![
            (account_key(&account.user_id), encode(&account, "account")?),
            (entry_key(&entry.resolution_id), encode(entry, "ledger entry")?),
            (
                history_key(&account.user_id, entry.account_version),
                entry.resolution_id.as_str().as_bytes().to_vec(),
            ),
        ];

        self.storage.batch_write(&items)?;

        tracing::debug!(
            user_id = %account.user_id,
            resolution_id = %entry.resolution_id,
            version = account.version,
            balance = account.balance,
            "Committed ledger entry"
        );
        Ok(account)
    }
}
