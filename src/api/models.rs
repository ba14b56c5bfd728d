//! API Request and Response Models

use crate::games::{validator::RawSlip, SpinReceipt};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// POST /api/spin body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinRequest {
    /// Wire bet key (`straight-17`, `outside-red`, ...) -> amount
    pub bets: RawSlip,
    /// Used when no Idempotency-Key header is sent
    #[serde(default)]
    pub resolution_id: Option<String>,
}

/// Committed spin as returned to the player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinResponse {
    pub resolution_id: String,
    pub winning_number: u8,
    pub new_balance: u64,
    pub net_gain: i64,
}

impl SpinResponse {
    pub fn new(resolution_id: String, receipt: SpinReceipt) -> Self {
        Self {
            resolution_id,
            winning_number: receipt.winning_number.value(),
            new_balance: receipt.new_balance,
            net_gain: receipt.net_gain,
        }
    }
}

/// POST /api/deposit and /api/withdraw body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub amount: i64,
    #[serde(default)]
    pub resolution_id: Option<String>,
}

/// POST /api/accounts body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAccountRequest {
    #[serde(default)]
    pub opening_balance: u64,
}

/// GET /api/ledger query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerQuery {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}
