//! HTTP handlers
//!
//! Thin adapters: decode the body, call the recorder or relay, shape JSON.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::error::LedgerError;
use crate::models::{format_amount, ApiError, ApiResponse};
use crate::settlement::{
    ConfirmRequest, InvestmentRequest, NftMintRequest, NftTransferRequest, TopUpRequest,
    TransferRequest,
};

use super::AppState;

/// Maps a ledger error onto the HTTP status and `{ok:false, error, code}` body.
#[derive(Debug)]
pub struct ApiFailure(pub LedgerError);

impl From<LedgerError> for ApiFailure {
    fn from(err: LedgerError) -> Self {
        ApiFailure(err)
    }
}

pub fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidInput(_)
        | LedgerError::InvalidAmount(_)
        | LedgerError::InvalidAddress(_)
        | LedgerError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        LedgerError::AccountNotFound(_)
        | LedgerError::TransactionNotFound(_)
        | LedgerError::AssetNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InvalidTransition { .. }
        | LedgerError::DuplicateTxHash(_)
        | LedgerError::DuplicateTokenId(_) => StatusCode::CONFLICT,
        LedgerError::ConfirmationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        LedgerError::NetworkError(_) => StatusCode::BAD_GATEWAY,
        LedgerError::KeyNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            log::error!("[API] {} ({})", self.0, status);
        } else {
            log::warn!("[API] {} ({})", self.0, status);
        }
        (status, Json(ApiError::new(self.0.error_code(), self.0.to_string()))).into_response()
    }
}

type ApiResult = Result<Response, ApiFailure>;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub address: String,
    pub amount: Decimal,
}

/// POST /topup
pub async fn handle_topup(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TopUpRequest>,
) -> ApiResult {
    let outcome = state.recorder.top_up(payload)?;
    let body = match outcome.warning {
        Some(warning) => json!({
            "ok": true,
            "balance": format_amount(outcome.balance),
            "payment_method": outcome.payment_method,
            "warning": warning,
        }),
        None => json!({
            "ok": true,
            "balance": format_amount(outcome.balance),
            "payment_method": outcome.payment_method,
            "transaction_id": outcome.transaction_id,
        }),
    };
    Ok(Json(body).into_response())
}

/// GET /balance/:address
pub async fn get_balance(
    Extension(state): Extension<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult {
    let account = state.recorder.balance(&address)?;
    Ok(Json(json!({
        "address": account.address,
        "balance": format_amount(account.balance),
    }))
    .into_response())
}

/// POST /invest
pub async fn handle_invest(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<InvestmentRequest>,
) -> ApiResult {
    let outcome = state.recorder.record_investment(payload)?;
    let mut body = serde_json::to_value(ApiResponse::with_warning(outcome.asset, outcome.warning))
        .map_err(LedgerError::from)?;
    if let Some(tx) = outcome.transaction {
        body["transaction"] = serde_json::to_value(tx).map_err(LedgerError::from)?;
    }
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// GET /transactions/:address?page=&page_size=
pub async fn list_transactions(
    Extension(state): Extension<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult {
    let max = state.recorder.transactions().max_page_size();
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(max).clamp(1, max);
    let data = state.recorder.list_transactions(&address, page, page_size)?;
    Ok(Json(json!({
        "ok": true,
        "data": data,
        "page": page,
        "page_size": page_size,
    }))
    .into_response())
}

/// GET /assets/:address
pub async fn list_assets(
    Extension(state): Extension<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult {
    let data = state.recorder.list_assets(&address)?;
    Ok(Json(ApiResponse::success(data)).into_response())
}

/// POST /transfer
pub async fn handle_transfer(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TransferRequest>,
) -> ApiResult {
    if payload.submit {
        let (tx, tx_hash) = state
            .recorder
            .submit_transfer(&payload.address, &payload.to, payload.amount)
            .await?;
        return Ok(Json(json!({ "ok": true, "data": tx, "txHash": tx_hash })).into_response());
    }
    let tx = state
        .recorder
        .request_transfer(&payload.address, &payload.to, payload.amount)?;
    Ok(Json(ApiResponse::success(tx)).into_response())
}

/// POST /withdraw
pub async fn handle_withdraw(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<AmountRequest>,
) -> ApiResult {
    let tx = state
        .recorder
        .request_withdrawal(&payload.address, payload.amount)?;
    Ok(Json(ApiResponse::success(tx)).into_response())
}

/// POST /deposit
pub async fn handle_deposit(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<AmountRequest>,
) -> ApiResult {
    let tx = state.recorder.request_deposit(&payload.address, payload.amount)?;
    Ok(Json(ApiResponse::success(tx)).into_response())
}

/// POST /transaction/:id/confirm
pub async fn confirm_transaction(
    Extension(state): Extension<Arc<AppState>>,
    Path(transaction_id): Path<u64>,
    Json(payload): Json<ConfirmRequest>,
) -> ApiResult {
    let timeout = payload.timeout_secs.map(Duration::from_secs);
    let tx = state
        .recorder
        .confirm_pending(transaction_id, &payload.tx_hash, timeout)
        .await?;
    Ok(Json(ApiResponse::success(tx)).into_response())
}

/// POST /relay/nft/mint
pub async fn relay_mint(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NftMintRequest>,
) -> ApiResult {
    let tx_hash = state.relay.mint(&payload).await?;
    Ok(Json(json!({ "ok": true, "txHash": tx_hash })).into_response())
}

/// POST /relay/nft/transfer
pub async fn relay_transfer(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NftTransferRequest>,
) -> ApiResult {
    let tx_hash = state.relay.transfer(&payload).await?;
    Ok(Json(json!({ "ok": true, "txHash": tx_hash })).into_response())
}

/// GET /nft/default-address
pub async fn nft_default_address(Extension(state): Extension<Arc<AppState>>) -> ApiResult {
    Ok(Json(json!({ "ok": true, "address": state.relay.default_address() })).into_response())
}

/// GET /chain/balance/:address
pub async fn chain_balance(
    Extension(state): Extension<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult {
    let wei = state.recorder.chain().get_balance(&address).await?;
    Ok(Json(json!({ "address": address, "balance": wei.to_string() })).into_response())
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
