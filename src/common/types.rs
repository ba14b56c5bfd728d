//! Account and ledger records shared by the engine and the stores

use crate::errors::WagerError;
use crate::games::types::{BetOutcome, SettlementOutcome, SpinReceipt, WinningNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on client-supplied idempotency keys
pub const MAX_RESOLUTION_ID_LEN: usize = 128;

/// Idempotency key for one logical request.
///
/// Supplied by the caller, stable across client retries of the same attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResolutionId(String);

impl ResolutionId {
    pub fn new(raw: impl Into<String>) -> Result<Self, WagerError> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_RESOLUTION_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_graphic());
        if valid {
            Ok(Self(raw))
        } else {
            Err(WagerError::InvalidResolutionId(raw))
        }
    }

    /// Fresh random id, for callers that do not retry
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ResolutionId {
    type Error = WagerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResolutionId> for String {
    fn from(id: ResolutionId) -> Self {
        id.0
    }
}

/// Player balance as held by the account store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub user_id: String,
    pub balance: u64,
    /// Bumped on every committed ledger entry
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn open(user_id: impl Into<String>, opening_balance: u64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            balance: opening_balance,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance after debiting the stake and crediting the winnings
    pub fn settled_balance(&self, staked: u64, credited: u64) -> Option<u64> {
        self.balance.checked_sub(staked)?.checked_add(credited)
    }
}

/// Kind of request a resolution id was spent on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Spin,
    Deposit,
    Withdrawal,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Spin => write!(f, "spin"),
            OperationKind::Deposit => write!(f, "deposit"),
            OperationKind::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

/// What a ledger entry records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryKind {
    Spin {
        winning_number: WinningNumber,
        total_staked: u64,
        total_credited: u64,
        bets: Vec<BetOutcome>,
    },
    Deposit {
        amount: u64,
    },
    Withdrawal {
        amount: u64,
    },
}

impl EntryKind {
    pub fn operation(&self) -> OperationKind {
        match self {
            EntryKind::Spin { .. } => OperationKind::Spin,
            EntryKind::Deposit { .. } => OperationKind::Deposit,
            EntryKind::Withdrawal { .. } => OperationKind::Withdrawal,
        }
    }
}

/// Append-only record of one committed balance change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub resolution_id: ResolutionId,
    pub user_id: String,
    #[serde(flatten)]
    pub kind: EntryKind,
    /// Signed balance change; for spins this is the net gain
    pub net_change: i64,
    pub balance_before: u64,
    pub balance_after: u64,
    /// Account version this entry produced
    pub account_version: u64,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn spin(
        resolution_id: ResolutionId,
        account: &Account,
        outcome: SettlementOutcome,
        balance_after: u64,
    ) -> Self {
        Self {
            resolution_id,
            user_id: account.user_id.clone(),
            net_change: outcome.net_gain(),
            kind: EntryKind::Spin {
                winning_number: outcome.winning_number,
                total_staked: outcome.total_staked,
                total_credited: outcome.total_credited,
                bets: outcome.bets,
            },
            balance_before: account.balance,
            balance_after,
            account_version: account.version + 1,
            recorded_at: Utc::now(),
        }
    }

    /// `net_change` is the signed transfer amount, which never exceeds `i64::MAX`
    pub fn transfer(resolution_id: ResolutionId, account: &Account, kind: EntryKind, balance_after: u64) -> Self {
        let net_change = match kind {
            EntryKind::Deposit { amount } => i64::try_from(amount).unwrap_or(i64::MAX),
            EntryKind::Withdrawal { amount } => i64::try_from(amount).map_or(i64::MIN, |a| -a),
            EntryKind::Spin { .. } => 0,
        };
        Self {
            resolution_id,
            user_id: account.user_id.clone(),
            net_change,
            kind,
            balance_before: account.balance,
            balance_after,
            account_version: account.version + 1,
            recorded_at: Utc::now(),
        }
    }

    /// Receipt a spin caller receives, rebuilt from the stored record
    pub fn spin_receipt(&self) -> Option<SpinReceipt> {
        match &self.kind {
            EntryKind::Spin { winning_number, .. } => Some(SpinReceipt {
                winning_number: *winning_number,
                new_balance: self.balance_after,
                net_gain: self.net_change,
            }),
            _ => None,
        }
    }

    pub fn winning_number(&self) -> Option<WinningNumber> {
        match &self.kind {
            EntryKind::Spin { winning_number, .. } => Some(*winning_number),
            _ => None,
        }
    }

    pub fn total_staked(&self) -> u64 {
        match &self.kind {
            EntryKind::Spin { total_staked, .. } => *total_staked,
            _ => 0,
        }
    }
}

/// Compare-and-set request against an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub user_id: String,
    pub expected_version: u64,
    pub new_balance: u64,
}

impl BalanceUpdate {
    pub fn for_entry(account: &Account, entry: &LedgerEntry) -> Self {
        Self {
            user_id: account.user_id.clone(),
            expected_version: account.version,
            new_balance: entry.balance_after,
        }
    }
}

/// One page of an account's ledger, newest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerPage {
    pub entries: Vec<LedgerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::BetKey;

    #[test]
    fn test_resolution_id_validation() {
        assert!(ResolutionId::new("spin-0001").is_ok());
        assert!(ResolutionId::new("").is_err());
        assert!(ResolutionId::new("has space").is_err());
        assert!(ResolutionId::new("x".repeat(MAX_RESOLUTION_ID_LEN + 1)).is_err());
        assert_ne!(ResolutionId::generate(), ResolutionId::generate());
        assert!(serde_json::from_str::<ResolutionId>("\"\"").is_err());
    }

    #[test]
    fn test_settled_balance() {
        let account = Account::open("alice", 1000);
        assert_eq!(account.settled_balance(100, 3600), Some(4500));
        assert_eq!(account.settled_balance(1001, 0), None);

        let rich = Account::open("bob", u64::MAX);
        assert_eq!(rich.settled_balance(1, 36), None);
    }

    #[test]
    fn test_transfer_net_change_above_i64_max() {
        let account = Account::open("whale", i64::MAX as u64);
        let amount = i64::MAX as u64;
        let deposit = LedgerEntry::transfer(
            ResolutionId::new("d-1").unwrap(),
            &account,
            EntryKind::Deposit { amount },
            account.balance + amount,
        );
        assert_eq!(deposit.net_change, i64::MAX);
        assert_eq!(deposit.balance_after, u64::MAX - 1);

        let rich = Account::open("whale", u64::MAX - 1);
        let withdrawal = LedgerEntry::transfer(
            ResolutionId::new("w-1").unwrap(),
            &rich,
            EntryKind::Withdrawal { amount: 5 },
            rich.balance - 5,
        );
        assert_eq!(withdrawal.net_change, -5);
    }

    #[test]
    fn test_spin_entry_round_trips_receipt() {
        let account = Account::open("alice", 1000);
        let outcome = SettlementOutcome {
            winning_number: WinningNumber::new(17).unwrap(),
            bets: vec![BetOutcome {
                key: BetKey::Straight(17),
                amount: 100,
                won: true,
                credit: 3600,
            }],
            total_staked: 100,
            total_credited: 3600,
        };
        let entry = LedgerEntry::spin(ResolutionId::new("r-1").unwrap(), &account, outcome, 4500);

        assert_eq!(entry.account_version, 1);
        assert_eq!(entry.total_staked(), 100);
        assert_eq!(entry.kind.operation(), OperationKind::Spin);

        let receipt = entry.spin_receipt().unwrap();
        assert_eq!(receipt.winning_number.value(), 17);
        assert_eq!(receipt.new_balance, 4500);
        assert_eq!(receipt.net_gain, 3500);

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"kind\":\"spin\""));
        let back: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_transfer_entry_net_change() {
        let account = Account::open("alice", 500);
        let entry = LedgerEntry::transfer(
            ResolutionId::new("w-1").unwrap(),
            &account,
            EntryKind::Withdrawal { amount: 200 },
            300,
        );
        assert_eq!(entry.net_change, -200);
        assert!(entry.spin_receipt().is_none());
        assert_eq!(entry.winning_number(), None);
    }
}
