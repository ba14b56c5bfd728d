//! Engine construction from configuration
//!
//! Centralizes store selection so the binary and the tests build engines the
//! same way.

use crate::{
    common::traits::WagerStore,
    config::{RuletaConfig, StorageBackend, StorageConfig},
    errors::{RuletaResult, StoreError},
    games::settlement::WagerEngine,
    ledger_store::RocksWagerStore,
    memory_store::MemoryWagerStore,
    storage::OptimizedStorage,
};
use std::sync::Arc;

/// Factory for wager engines with different storage backends
pub struct EngineFactory;

impl EngineFactory {
    /// Validate `config`, open its store and build an engine drawing from the OS RNG
    pub fn create_engine(config: &RuletaConfig) -> RuletaResult<WagerEngine> {
        config.validate()?;
        let store = Self::create_store(&config.storage)?;
        Ok(WagerEngine::with_os_rng(store, config.engine.clone()))
    }

    /// Open the configured store
    pub fn create_store(config: &StorageConfig) -> RuletaResult<Arc<dyn WagerStore>> {
        match config.backend {
            StorageBackend::RocksDb => {
                if config.clear_on_start {
                    tracing::warn!(path = %config.data_directory, "Clearing wager database on start");
                } else {
                    tracing::info!(path = %config.data_directory, "Opening wager database");
                }
                let storage = OptimizedStorage::new_with_config(config)
                    .map_err(|e| StoreError::DatabaseOpenFailed(e.to_string()))?;
                Ok(Arc::new(RocksWagerStore::new(storage)))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory wager store, balances are lost on exit");
                Ok(Arc::new(MemoryWagerStore::new()))
            }
        }
    }

    /// In-memory engine with the testing preset
    pub fn create_testing() -> RuletaResult<WagerEngine> {
        Self::create_engine(&RuletaConfig::testing())
    }
}
