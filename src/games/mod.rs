//! Roulette wager resolution: taxonomy, validation, draw, payout, settlement

pub mod account_locks;
pub mod payout;
pub mod settlement;
pub mod spin;
pub mod taxonomy;
pub mod types;
pub mod validator;

pub use settlement::{TransferReceipt, WagerEngine};
pub use spin::{OsRngSpinResolver, SequenceSpinResolver, SpinResolver};
pub use types::*;
pub use validator::{validate_slip, BetAmount, RawSlip, TableLimits, ValidatedSlip};
