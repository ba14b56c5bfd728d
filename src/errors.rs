//! Error types for the Ruleta wager engine
//!
//! Wager failures are what callers of the engine see. Storage and
//! configuration failures stay internal until they surface through the root
//! `RuletaError`.

use thiserror::Error;

/// Root error type for all Ruleta operations
#[derive(Debug, Error)]
pub enum RuletaError {
    #[error("Wager error: {0}")]
    Wager(#[from] WagerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed failures returned by the wager engine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WagerError {
    #[error("Invalid bet key: {0}")]
    InvalidBetKey(String),

    #[error("Invalid amount {amount} for bet {bet}")]
    InvalidAmount { bet: String, amount: String },

    #[error("Bet slip is empty")]
    EmptySlip,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Settlement could not be committed: {0}")]
    Persistence(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    #[error("Invalid resolution id: {0}")]
    InvalidResolutionId(String),

    #[error("Resolution id {0} was already used for a different request")]
    ResolutionConflict(String),

    #[error("Invalid transfer amount: {0}")]
    InvalidTransferAmount(i64),

    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid ledger cursor: {0}")]
    InvalidCursor(String),
}

impl WagerError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            WagerError::InvalidBetKey(_) => "INVALID_BET_KEY",
            WagerError::InvalidAmount { .. } => "INVALID_AMOUNT",
            WagerError::EmptySlip => "EMPTY_SLIP",
            WagerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            WagerError::Persistence(_) => "PERSISTENCE_ERROR",
            WagerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            WagerError::AccountExists(_) => "ACCOUNT_EXISTS",
            WagerError::InvalidUserId(_) => "INVALID_USER_ID",
            WagerError::InvalidResolutionId(_) => "INVALID_RESOLUTION_ID",
            WagerError::ResolutionConflict(_) => "RESOLUTION_CONFLICT",
            WagerError::InvalidTransferAmount(_) => "INVALID_TRANSFER_AMOUNT",
            WagerError::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            WagerError::InvalidCursor(_) => "INVALID_CURSOR",
        }
    }

    /// Only a failed commit may succeed when replayed with the same resolution id
    pub fn is_retryable(&self) -> bool {
        matches!(self, WagerError::Persistence(_))
    }
}

impl From<StoreError> for WagerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountMissing(user_id) => WagerError::AccountNotFound(user_id),
            StoreError::AccountExists(user_id) => WagerError::AccountExists(user_id),
            StoreError::InvalidCursor(reason) => WagerError::InvalidCursor(reason),
            other => WagerError::Persistence(other.to_string()),
        }
    }
}

/// Storage system errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Account {0} does not exist")]
    AccountMissing(String),

    #[error("Account {0} already exists")]
    AccountExists(String),

    #[error("Version conflict on account {user_id}: expected {expected}, found {found}")]
    VersionConflict {
        user_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Resolution {0} is already recorded")]
    DuplicateResolution(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
}

impl StoreError {
    /// Transient failures are worth retrying with the same batch
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::ReadFailed(_) | StoreError::WriteFailed(_))
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::WriteFailed(e.to_string())
    }
}

/// Configuration and validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {0}")]
    MissingRequired(String),
}

// Convenience type alias for Results
pub type RuletaResult<T> = Result<T, RuletaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = RuletaError::from(ConfigError::MissingRequired("storage.data_directory".into()));
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("storage.data_directory"));
    }

    #[test]
    fn test_insufficient_balance_details() {
        let err = WagerError::InsufficientBalance {
            required: 100,
            available: 50,
        };
        assert!(err.to_string().contains("required 100"));
        assert!(err.to_string().contains("available 50"));
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_store_error_conversion() {
        let missing: WagerError = StoreError::AccountMissing("alice".into()).into();
        assert_eq!(missing, WagerError::AccountNotFound("alice".into()));

        let conflict: WagerError = StoreError::VersionConflict {
            user_id: "alice".into(),
            expected: 3,
            found: 4,
        }
        .into();
        assert!(conflict.is_retryable());
        assert_eq!(conflict.code(), "PERSISTENCE_ERROR");
    }

    #[test]
    fn test_error_source() {
        let err = RuletaError::from(StoreError::ReadFailed("disk".into()));
        assert!(err.source().is_some());
    }
}
