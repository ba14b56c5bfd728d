//! Ruleta - Roulette Wager Resolution Engine
//!
//! Validates a bet slip against the account balance, draws one winning
//! number, computes the payout and commits the balance change together with
//! an immutable ledger entry. Each resolution id settles at most once.

pub mod api;
pub mod common;
pub mod config;
pub mod errors;
pub mod factory;
pub mod games;
pub mod ledger_store;
pub mod memory_store;
pub mod storage;

pub use common::traits::WagerStore;
pub use common::types::{Account, LedgerEntry, LedgerPage, ResolutionId};
pub use config::{ConfigLoader, RuletaConfig};
pub use errors::{RuletaError, RuletaResult, WagerError};
pub use factory::EngineFactory;
pub use games::{SpinReceipt, WagerEngine};
