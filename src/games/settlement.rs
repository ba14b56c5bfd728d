//! Wager engine: validation, draw, payout and atomic settlement
//!
//! Every balance-changing request runs on its own tokio task while holding
//! the account's lock. The caller awaits the task, so a dropped caller cannot
//! abandon a resolution between the draw and the commit.

use crate::common::traits::{WagerStore, MAX_LEDGER_PAGE};
use crate::common::types::{
    Account, BalanceUpdate, EntryKind, LedgerEntry, LedgerPage, OperationKind, ResolutionId,
};
use crate::config::EngineConfig;
use crate::errors::{StoreError, WagerError};
use crate::games::account_locks::AccountLocks;
use crate::games::payout::calculate_payout;
use crate::games::spin::{OsRngSpinResolver, SpinResolver};
use crate::games::types::{SpinReceipt, WinningNumber};
use crate::games::validator::{validate_slip, RawSlip, ValidatedSlip};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Longest user id the engine accepts
pub const MAX_USER_ID_LEN: usize = 128;

/// Result of a committed deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub resolution_id: ResolutionId,
    pub operation: OperationKind,
    pub amount: u64,
    pub new_balance: u64,
}

impl TransferReceipt {
    fn from_entry(entry: &LedgerEntry) -> Option<Self> {
        let amount = match entry.kind {
            EntryKind::Deposit { amount } | EntryKind::Withdrawal { amount } => amount,
            EntryKind::Spin { .. } => return None,
        };
        Some(Self {
            resolution_id: entry.resolution_id.clone(),
            operation: entry.kind.operation(),
            amount,
            new_balance: entry.balance_after,
        })
    }
}

/// A number drawn for a spin whose commit never landed
#[derive(Debug, Clone)]
struct RetainedDraw {
    user_id: String,
    winning_number: WinningNumber,
    /// Insertion order, for eviction
    sequence: u64,
}

struct EngineInner {
    store: Arc<dyn WagerStore>,
    resolver: Arc<dyn SpinResolver>,
    locks: AccountLocks,
    retained: DashMap<ResolutionId, RetainedDraw>,
    retained_sequence: AtomicU64,
    config: EngineConfig,
}

/// Cheaply cloneable handle to the wager engine
#[derive(Clone)]
pub struct WagerEngine {
    inner: Arc<EngineInner>,
}

impl WagerEngine {
    pub fn new(
        store: Arc<dyn WagerStore>,
        resolver: Arc<dyn SpinResolver>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                resolver,
                locks: AccountLocks::new(),
                retained: DashMap::new(),
                retained_sequence: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Engine drawing from the operating system's CSPRNG
    pub fn with_os_rng(store: Arc<dyn WagerStore>, config: EngineConfig) -> Self {
        Self::new(store, Arc::new(OsRngSpinResolver), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Validate the slip, draw, settle and record the spin.
    ///
    /// Replaying a resolution id that already settled returns the recorded
    /// receipt without touching the balance or drawing again.
    pub async fn place_spin(
        &self,
        user_id: &str,
        slip: RawSlip,
        resolution_id: ResolutionId,
    ) -> Result<SpinReceipt, WagerError> {
        check_user_id(user_id)?;
        let user_id = user_id.to_string();
        self.run_detached(move |inner| async move {
            inner.resolve_spin(&user_id, &slip, &resolution_id).await
        })
        .await
    }

    pub async fn deposit(
        &self,
        user_id: &str,
        amount: i64,
        resolution_id: ResolutionId,
    ) -> Result<TransferReceipt, WagerError> {
        self.transfer(user_id, OperationKind::Deposit, amount, resolution_id)
            .await
    }

    pub async fn withdraw(
        &self,
        user_id: &str,
        amount: i64,
        resolution_id: ResolutionId,
    ) -> Result<TransferReceipt, WagerError> {
        self.transfer(user_id, OperationKind::Withdrawal, amount, resolution_id)
            .await
    }

    async fn transfer(
        &self,
        user_id: &str,
        operation: OperationKind,
        amount: i64,
        resolution_id: ResolutionId,
    ) -> Result<TransferReceipt, WagerError> {
        check_user_id(user_id)?;
        let amount = u64::try_from(amount)
            .ok()
            .filter(|a| *a > 0)
            .ok_or(WagerError::InvalidTransferAmount(amount))?;
        let user_id = user_id.to_string();
        self.run_detached(move |inner| async move {
            inner
                .resolve_transfer(&user_id, operation, amount, &resolution_id)
                .await
        })
        .await
    }

    /// Register an account with an opening balance
    pub async fn open_account(&self, user_id: &str, opening_balance: u64) -> Result<Account, WagerError> {
        check_user_id(user_id)?;
        let _guard = self.inner.locks.lock(user_id).await;
        let account = self.inner.store.create_account(user_id, opening_balance).await?;
        tracing::info!(user_id, opening_balance, "Account opened");
        Ok(account)
    }

    pub async fn account(&self, user_id: &str) -> Result<Account, WagerError> {
        check_user_id(user_id)?;
        self.inner.load_account(user_id).await
    }

    /// One page of the account's ledger, newest first
    pub async fn ledger(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<LedgerPage, WagerError> {
        check_user_id(user_id)?;
        self.inner.load_account(user_id).await?;
        let page = self
            .inner
            .store
            .account_entries(user_id, cursor, limit.min(MAX_LEDGER_PAGE))
            .await?;
        Ok(page)
    }

    /// A single ledger entry, visible only to the account it belongs to
    pub async fn entry(&self, user_id: &str, resolution_id: &ResolutionId) -> Result<LedgerEntry, WagerError> {
        check_user_id(user_id)?;
        match self.inner.store.find_entry(resolution_id).await? {
            Some(entry) if entry.user_id == user_id => Ok(entry),
            _ => Err(WagerError::EntryNotFound(resolution_id.to_string())),
        }
    }

    /// Whether a drawn number is being held for a failed spin
    pub fn has_retained_draw(&self, resolution_id: &ResolutionId) -> bool {
        self.inner.retained.contains_key(resolution_id)
    }

    async fn run_detached<T, F, Fut>(&self, task: F) -> Result<T, WagerError>
    where
        F: FnOnce(Arc<EngineInner>) -> Fut,
        Fut: Future<Output = Result<T, WagerError>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(task(self.inner.clone()))
            .await
            .map_err(|e| WagerError::Persistence(format!("Resolution task failed: {}", e)))?
    }
}

impl EngineInner {
    async fn load_account(&self, user_id: &str) -> Result<Account, WagerError> {
        self.store
            .get_account(user_id)
            .await?
            .ok_or_else(|| WagerError::AccountNotFound(user_id.to_string()))
    }

    async fn resolve_spin(
        &self,
        user_id: &str,
        raw: &RawSlip,
        resolution_id: &ResolutionId,
    ) -> Result<SpinReceipt, WagerError> {
        let _guard = self.locks.lock(user_id).await;

        if let Some(entry) = self.store.find_entry(resolution_id).await? {
            tracing::debug!(user_id, %resolution_id, "Replaying settled spin");
            if entry.user_id != user_id {
                return Err(WagerError::ResolutionConflict(resolution_id.to_string()));
            }
            return entry
                .spin_receipt()
                .ok_or_else(|| WagerError::ResolutionConflict(resolution_id.to_string()));
        }

        let retained = self.retained_draw(user_id, resolution_id)?;
        let account = self.load_account(user_id).await?;
        let slip = validate_slip(raw, account.balance, &self.config.table_limits)?;

        let winning_number = match retained {
            Some(number) => {
                tracing::debug!(user_id, %resolution_id, winning_number = number.value(), "Reusing retained draw");
                number
            }
            None => self.resolver.draw(),
        };

        match self.settle_spin(&account, &slip, winning_number, resolution_id).await {
            Ok(receipt) => {
                self.retained.remove(resolution_id);
                Ok(receipt)
            }
            Err(e) => {
                self.retain_draw(user_id, resolution_id, winning_number);
                Err(e)
            }
        }
    }

    async fn settle_spin(
        &self,
        account: &Account,
        slip: &ValidatedSlip,
        winning_number: WinningNumber,
        resolution_id: &ResolutionId,
    ) -> Result<SpinReceipt, WagerError> {
        let outcome = calculate_payout(slip, winning_number);
        let balance_after = account
            .settled_balance(outcome.total_staked, outcome.total_credited)
            .ok_or_else(|| WagerError::Persistence(format!("Balance overflow for {}", account.user_id)))?;

        let entry = LedgerEntry::spin(resolution_id.clone(), account, outcome, balance_after);
        let update = BalanceUpdate::for_entry(account, &entry);
        self.commit_with_retry(&update, &entry).await?;

        let receipt = entry
            .spin_receipt()
            .ok_or_else(|| WagerError::Persistence("Spin entry lost its outcome".to_string()))?;

        tracing::info!(
            user_id = %account.user_id,
            %resolution_id,
            winning_number = winning_number.value(),
            total_staked = entry.total_staked(),
            net_gain = receipt.net_gain,
            new_balance = receipt.new_balance,
            "Spin settled"
        );
        Ok(receipt)
    }

    async fn resolve_transfer(
        &self,
        user_id: &str,
        operation: OperationKind,
        amount: u64,
        resolution_id: &ResolutionId,
    ) -> Result<TransferReceipt, WagerError> {
        let _guard = self.locks.lock(user_id).await;

        if let Some(entry) = self.store.find_entry(resolution_id).await? {
            tracing::debug!(user_id, %resolution_id, %operation, "Replaying settled transfer");
            if entry.user_id != user_id || entry.kind.operation() != operation {
                return Err(WagerError::ResolutionConflict(resolution_id.to_string()));
            }
            return TransferReceipt::from_entry(&entry)
                .ok_or_else(|| WagerError::ResolutionConflict(resolution_id.to_string()));
        }
        if self.retained.contains_key(resolution_id) {
            return Err(WagerError::ResolutionConflict(resolution_id.to_string()));
        }

        let account = self.load_account(user_id).await?;
        let (kind, balance_after) = match operation {
            OperationKind::Deposit => (
                EntryKind::Deposit { amount },
                account
                    .balance
                    .checked_add(amount)
                    .ok_or(WagerError::InvalidTransferAmount(amount as i64))?,
            ),
            OperationKind::Withdrawal => (
                EntryKind::Withdrawal { amount },
                account
                    .balance
                    .checked_sub(amount)
                    .ok_or(WagerError::InsufficientBalance {
                        required: amount,
                        available: account.balance,
                    })?,
            ),
            OperationKind::Spin => {
                return Err(WagerError::ResolutionConflict(resolution_id.to_string()));
            }
        };

        let entry = LedgerEntry::transfer(resolution_id.clone(), &account, kind, balance_after);
        let update = BalanceUpdate::for_entry(&account, &entry);
        self.commit_with_retry(&update, &entry).await?;

        tracing::info!(user_id, %resolution_id, %operation, amount, new_balance = balance_after, "Transfer settled");
        TransferReceipt::from_entry(&entry)
            .ok_or_else(|| WagerError::Persistence("Transfer entry lost its amount".to_string()))
    }

    /// A retained number for this id, or a conflict if another account drew it
    fn retained_draw(
        &self,
        user_id: &str,
        resolution_id: &ResolutionId,
    ) -> Result<Option<WinningNumber>, WagerError> {
        match self.retained.get(resolution_id) {
            Some(draw) if draw.user_id != user_id => {
                Err(WagerError::ResolutionConflict(resolution_id.to_string()))
            }
            Some(draw) => Ok(Some(draw.winning_number)),
            None => Ok(None),
        }
    }

    /// Hold a drawn number for a retry, evicting the oldest held draw when full
    fn retain_draw(&self, user_id: &str, resolution_id: &ResolutionId, winning_number: WinningNumber) {
        if !self.retained.contains_key(resolution_id) && self.retained.len() >= self.config.max_retained_draws {
            let oldest = self
                .retained
                .iter()
                .min_by_key(|draw| draw.sequence)
                .map(|draw| draw.key().clone());
            if let Some(oldest) = oldest {
                self.retained.remove(&oldest);
                tracing::warn!(resolution_id = %oldest, "Evicted retained draw");
            }
        }
        self.retained.insert(
            resolution_id.clone(),
            RetainedDraw {
                user_id: user_id.to_string(),
                winning_number,
                sequence: self.retained_sequence.fetch_add(1, Ordering::Relaxed),
            },
        );
    }

    async fn commit_with_retry(&self, update: &BalanceUpdate, entry: &LedgerEntry) -> Result<Account, WagerError> {
        let mut attempt = 0;
        loop {
            match self.store.commit(update, entry).await {
                Ok(account) => return Ok(account),
                Err(StoreError::DuplicateResolution(_)) if attempt > 0 => {
                    // An earlier attempt reported failure but did land
                    if self.store.find_entry(&entry.resolution_id).await?.as_ref() == Some(entry) {
                        tracing::warn!(resolution_id = %entry.resolution_id, "Commit landed despite reported failure");
                        return self.load_account(&update.user_id).await;
                    }
                    return Err(WagerError::Persistence(format!(
                        "Resolution {} recorded by another request",
                        entry.resolution_id
                    )));
                }
                Err(e) if e.is_transient() && attempt < self.config.commit_retry_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        resolution_id = %entry.resolution_id,
                        attempt,
                        error = %e,
                        "Commit failed, retrying"
                    );
                    tokio::time::sleep(self.config.commit_retry_backoff(attempt)).await;
                }
                Err(e) => {
                    tracing::error!(
                        user_id = %update.user_id,
                        resolution_id = %entry.resolution_id,
                        attempts = attempt + 1,
                        error = %e,
                        "Commit failed"
                    );
                    return Err(match e {
                        StoreError::AccountMissing(user_id) => WagerError::AccountNotFound(user_id),
                        other => WagerError::Persistence(other.to_string()),
                    });
                }
            }
        }
    }
}

fn check_user_id(user_id: &str) -> Result<(), WagerError> {
    let valid = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id.trim() == user_id
        && !user_id.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(WagerError::InvalidUserId(user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::spin::SequenceSpinResolver;
    use crate::games::validator::BetAmount;
    use crate::memory_store::MemoryWagerStore;

    fn slip(bets: &[(&str, i64)]) -> RawSlip {
        bets.iter().map(|(k, v)| (k.to_string(), BetAmount::from(*v))).collect()
    }

    fn rid(raw: &str) -> ResolutionId {
        ResolutionId::new(raw).unwrap()
    }

    fn engine_with(numbers: &[u8], retries: u32) -> (WagerEngine, Arc<MemoryWagerStore>, Arc<SequenceSpinResolver>) {
        engine_with_config(
            numbers,
            EngineConfig {
                commit_retry_attempts: retries,
                commit_retry_backoff_ms: 0,
                ..EngineConfig::default()
            },
        )
    }

    fn engine_with_config(
        numbers: &[u8],
        config: EngineConfig,
    ) -> (WagerEngine, Arc<MemoryWagerStore>, Arc<SequenceSpinResolver>) {
        let store = Arc::new(MemoryWagerStore::new());
        let resolver = Arc::new(SequenceSpinResolver::new(numbers).unwrap());
        let engine = WagerEngine::new(store.clone(), resolver.clone(), config);
        (engine, store, resolver)
    }

    #[tokio::test]
    async fn test_straight_win_settles() {
        let (engine, _store, _) = engine_with(&[17], 0);
        engine.open_account("alice", 1000).await.unwrap();

        let receipt = engine
            .place_spin("alice", slip(&[("straight-17", 100)]), rid("s-1"))
            .await
            .unwrap();
        assert_eq!(receipt.winning_number.value(), 17);
        assert_eq!(receipt.new_balance, 4500);
        assert_eq!(receipt.net_gain, 3500);
        assert_eq!(engine.account("alice").await.unwrap().balance, 4500);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (engine, store, resolver) = engine_with(&[3], 2);
        engine.open_account("alice", 100).await.unwrap();

        store.fail_next_commits(2);
        let receipt = engine
            .place_spin("alice", slip(&[("outside-red", 10)]), rid("s-1"))
            .await
            .unwrap();
        assert_eq!(receipt.new_balance, 110);
        assert_eq!(resolver.draw_count(), 1);
        assert!(!engine.has_retained_draw(&rid("s-1")));
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_the_draw() {
        let (engine, store, resolver) = engine_with(&[17, 0], 1);
        engine.open_account("alice", 1000).await.unwrap();

        store.fail_next_commits(2);
        let err = engine
            .place_spin("alice", slip(&[("straight-17", 100)]), rid("s-1"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(engine.has_retained_draw(&rid("s-1")));
        assert_eq!(engine.account("alice").await.unwrap().balance, 1000);

        // The retry settles against 17, not the next number in the sequence
        let receipt = engine
            .place_spin("alice", slip(&[("straight-17", 100)]), rid("s-1"))
            .await
            .unwrap();
        assert_eq!(receipt.winning_number.value(), 17);
        assert_eq!(receipt.new_balance, 4500);
        assert_eq!(resolver.draw_count(), 1);
        assert!(!engine.has_retained_draw(&rid("s-1")));
    }

    #[tokio::test]
    async fn test_retained_draw_is_bound_to_its_account() {
        let (engine, store, _) = engine_with(&[5], 0);
        engine.open_account("alice", 100).await.unwrap();
        engine.open_account("bob", 100).await.unwrap();

        store.fail_next_commits(1);
        engine
            .place_spin("alice", slip(&[("straight-5", 1)]), rid("shared"))
            .await
            .unwrap_err();

        assert_eq!(
            engine
                .place_spin("bob", slip(&[("straight-5", 1)]), rid("shared"))
                .await,
            Err(WagerError::ResolutionConflict("shared".to_string()))
        );
        assert_eq!(
            engine.deposit("alice", 10, rid("shared")).await,
            Err(WagerError::ResolutionConflict("shared".to_string()))
        );
    }

    #[tokio::test]
    async fn test_retained_draws_are_capped() {
        let (engine, store, resolver) = engine_with_config(
            &[1, 2, 3, 4],
            EngineConfig {
                commit_retry_attempts: 0,
                commit_retry_backoff_ms: 0,
                max_retained_draws: 2,
                ..EngineConfig::default()
            },
        );
        engine.open_account("alice", 100).await.unwrap();

        store.fail_next_commits(3);
        for id in ["f-1", "f-2", "f-3"] {
            engine
                .place_spin("alice", slip(&[("straight-1", 1)]), rid(id))
                .await
                .unwrap_err();
        }

        assert!(!engine.has_retained_draw(&rid("f-1")));
        assert!(engine.has_retained_draw(&rid("f-2")));
        assert!(engine.has_retained_draw(&rid("f-3")));

        // An evicted id draws afresh on retry
        let receipt = engine
            .place_spin("alice", slip(&[("straight-1", 1)]), rid("f-1"))
            .await
            .unwrap();
        assert_eq!(receipt.winning_number.value(), 4);
        assert_eq!(resolver.draw_count(), 4);
    }

    #[tokio::test]
    async fn test_resolution_id_reuse_across_operations() {
        let (engine, _store, _) = engine_with(&[1], 0);
        engine.open_account("alice", 100).await.unwrap();
        engine.open_account("bob", 100).await.unwrap();

        engine.deposit("alice", 50, rid("t-1")).await.unwrap();

        assert!(matches!(
            engine.withdraw("alice", 50, rid("t-1")).await,
            Err(WagerError::ResolutionConflict(_))
        ));
        assert!(matches!(
            engine.place_spin("alice", slip(&[("straight-1", 1)]), rid("t-1")).await,
            Err(WagerError::ResolutionConflict(_))
        ));
        assert!(matches!(
            engine.deposit("bob", 50, rid("t-1")).await,
            Err(WagerError::ResolutionConflict(_))
        ));
        assert_eq!(engine.account("alice").await.unwrap().balance, 150);
    }

    #[tokio::test]
    async fn test_transfers() {
        let (engine, _store, _) = engine_with(&[1], 0);
        engine.open_account("alice", 100).await.unwrap();

        let deposit = engine.deposit("alice", 40, rid("d-1")).await.unwrap();
        assert_eq!(deposit.new_balance, 140);
        assert_eq!(deposit.operation, OperationKind::Deposit);

        // Replay returns the same receipt
        assert_eq!(engine.deposit("alice", 40, rid("d-1")).await.unwrap(), deposit);
        assert_eq!(engine.account("alice").await.unwrap().balance, 140);

        assert_eq!(
            engine.withdraw("alice", 141, rid("w-1")).await,
            Err(WagerError::InsufficientBalance {
                required: 141,
                available: 140
            })
        );
        assert_eq!(
            engine.withdraw("alice", 0, rid("w-2")).await,
            Err(WagerError::InvalidTransferAmount(0))
        );
        assert_eq!(
            engine.deposit("alice", -5, rid("d-2")).await,
            Err(WagerError::InvalidTransferAmount(-5))
        );

        let withdrawal = engine.withdraw("alice", 140, rid("w-3")).await.unwrap();
        assert_eq!(withdrawal.new_balance, 0);
    }

    #[tokio::test]
    async fn test_account_lookups() {
        let (engine, _store, _) = engine_with(&[0], 0);

        assert_eq!(
            engine.account("nobody").await,
            Err(WagerError::AccountNotFound("nobody".to_string()))
        );
        assert!(matches!(engine.open_account("", 1).await, Err(WagerError::InvalidUserId(_))));
        assert!(matches!(engine.open_account(" pad", 1).await, Err(WagerError::InvalidUserId(_))));
        assert!(matches!(engine.account("alice ").await, Err(WagerError::InvalidUserId(_))));

        engine.open_account("alice", 10).await.unwrap();
        assert_eq!(
            engine.open_account("alice", 10).await,
            Err(WagerError::AccountExists("alice".to_string()))
        );

        engine
            .place_spin("alice", slip(&[("straight-0", 5)]), rid("s-1"))
            .await
            .unwrap();
        assert!(engine.entry("alice", &rid("s-1")).await.is_ok());
        assert_eq!(
            engine.entry("mallory", &rid("s-1")).await,
            Err(WagerError::EntryNotFound("s-1".to_string()))
        );
    }
}
