//! Request Handlers
//!
//! Thin adapters between HTTP and the wager engine. The caller's identity
//! comes from the authentication layer in front of this service.

use super::{
    errors::ApiError,
    middleware::{AuthenticatedUser, IDEMPOTENCY_KEY_HEADER},
    models::*,
};
use crate::{
    common::types::{Account, LedgerEntry, LedgerPage, ResolutionId},
    games::{TransferReceipt, WagerEngine},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderName, StatusCode},
    Json,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub engine: WagerEngine,
    pub user_id_header: HeaderName,
    pub version: String,
}

/// Health check handler
/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
    })
}

/// Resolution id from the Idempotency-Key header, falling back to the body
fn resolution_id(
    request_id: &str,
    headers: &HeaderMap,
    from_body: Option<String>,
) -> Result<ResolutionId, ApiError> {
    let from_header = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| {
                    ApiError::bad_request(request_id.to_string(), "Idempotency-Key is not ASCII".to_string())
                })?
                .to_string(),
        ),
        None => None,
    };

    let raw = match (from_header, from_body) {
        (Some(header), Some(body)) if header != body => {
            return Err(ApiError::bad_request(
                request_id.to_string(),
                "Idempotency-Key header and resolution_id disagree".to_string(),
            ));
        }
        (Some(header), _) => header,
        (None, Some(body)) => body,
        (None, None) => {
            return Err(ApiError::bad_request(
                request_id.to_string(),
                "Missing Idempotency-Key header or resolution_id".to_string(),
            ));
        }
    };

    ResolutionId::new(raw).map_err(|e| ApiError::wager(request_id.to_string(), e))
}

fn json_body<T>(request_id: &str, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::bad_request(request_id.to_string(), e.body_text()))
}

/// Place a bet slip and spin
/// POST /api/spin
pub async fn spin_handler(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SpinRequest>, JsonRejection>,
) -> Result<Json<SpinResponse>, ApiError> {
    let request = json_body(&user.request_id, payload)?;
    let resolution_id = resolution_id(&user.request_id, &headers, request.resolution_id)?;

    tracing::debug!(
        request_id = %user.request_id,
        user_id = %user.user_id,
        %resolution_id,
        bets = request.bets.len(),
        "Spin requested"
    );

    let receipt = state
        .engine
        .place_spin(&user.user_id, request.bets, resolution_id.clone())
        .await
        .map_err(|e| ApiError::wager(user.request_id.clone(), e))?;

    Ok(Json(SpinResponse::new(resolution_id.to_string(), receipt)))
}

/// POST /api/deposit
pub async fn deposit_handler(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferReceipt>, ApiError> {
    let request = json_body(&user.request_id, payload)?;
    let resolution_id = resolution_id(&user.request_id, &headers, request.resolution_id)?;

    let receipt = state
        .engine
        .deposit(&user.user_id, request.amount, resolution_id)
        .await
        .map_err(|e| ApiError::wager(user.request_id.clone(), e))?;

    Ok(Json(receipt))
}

/// POST /api/withdraw
pub async fn withdraw_handler(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferReceipt>, ApiError> {
    let request = json_body(&user.request_id, payload)?;
    let resolution_id = resolution_id(&user.request_id, &headers, request.resolution_id)?;

    let receipt = state
        .engine
        .withdraw(&user.user_id, request.amount, resolution_id)
        .await
        .map_err(|e| ApiError::wager(user.request_id.clone(), e))?;

    Ok(Json(receipt))
}

/// Open the caller's account
/// POST /api/accounts
pub async fn open_account_handler(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    payload: Option<Json<OpenAccountRequest>>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();

    let account = state
        .engine
        .open_account(&user.user_id, request.opening_balance)
        .await
        .map_err(|e| ApiError::wager(user.request_id.clone(), e))?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /api/account
pub async fn account_handler(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Account>, ApiError> {
    state
        .engine
        .account(&user.user_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::wager(user.request_id, e))
}

/// Caller's ledger, newest first
/// GET /api/ledger?cursor={cursor}&limit={n}
pub async fn ledger_handler(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    query: Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<Json<LedgerPage>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(user.request_id.clone(), e.body_text()))?;

    state
        .engine
        .ledger(&user.user_id, query.cursor.as_deref(), query.limit)
        .await
        .map(Json)
        .map_err(|e| ApiError::wager(user.request_id, e))
}

/// GET /api/ledger/:resolution_id
pub async fn ledger_entry_handler(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<LedgerEntry>, ApiError> {
    let resolution_id =
        ResolutionId::new(raw_id).map_err(|e| ApiError::wager(user.request_id.clone(), e))?;

    state
        .engine
        .entry(&user.user_id, &resolution_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::wager(user.request_id, e))
}
