//! Storage interface the engine settles against
//!
//! Account balances and the ledger live behind one trait so that a balance
//! change and the entry describing it are written in a single atomic commit.

use crate::common::types::{Account, BalanceUpdate, LedgerEntry, LedgerPage, ResolutionId};
use crate::errors::StoreError;
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

/// Most entries a single ledger page may return
pub const MAX_LEDGER_PAGE: usize = 200;

#[async_trait]
pub trait WagerStore: Send + Sync {
    /// Create an account with an opening balance
    async fn create_account(&self, user_id: &str, opening_balance: u64) -> StoreResult<Account>;

    /// Read the current account state
    async fn get_account(&self, user_id: &str) -> StoreResult<Option<Account>>;

    /// Look up a committed entry by its resolution id
    async fn find_entry(&self, resolution_id: &ResolutionId) -> StoreResult<Option<LedgerEntry>>;

    /// Page through an account's ledger, newest first
    async fn account_entries(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<LedgerPage>;

    /// Apply `update` and append `entry` as one unit.
    ///
    /// Fails with `VersionConflict` if the account moved past
    /// `update.expected_version`, and with `DuplicateResolution` if an entry
    /// with the same resolution id exists. On any error nothing is written.
    async fn commit(&self, update: &BalanceUpdate, entry: &LedgerEntry) -> StoreResult<Account>;
}

/// Cursor encoding shared by the stores: the account version of the last
/// entry on the previous page, hex encoded
pub(crate) fn encode_cursor(account_version: u64) -> String {
    hex::encode(account_version.to_be_bytes())
}

pub(crate) fn decode_cursor(cursor: &str) -> StoreResult<u64> {
    let bytes = hex::decode(cursor)
        .map_err(|e| StoreError::InvalidCursor(format!("not hex: {}", e)))?;
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::InvalidCursor("must be 8 bytes".to_string()))?;
    Ok(u64::from_be_bytes(array))
}
