//! Route Definitions

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Wagering
        .route("/api/spin", post(spin_handler))
        // Funds
        .route("/api/deposit", post(deposit_handler))
        .route("/api/withdraw", post(withdraw_handler))
        // Account and ledger reads
        .route("/api/accounts", post(open_account_handler))
        .route("/api/account", get(account_handler))
        .route("/api/ledger", get(ledger_handler))
        .route("/api/ledger/:resolution_id", get(ledger_entry_handler))
        .with_state(state)
}
