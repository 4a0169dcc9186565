//! HTTP API for the faucet service

use crate::cache::BalanceCache;
use crate::database::{format_timestamp, ClaimLedger, TransactionRecord, TxStatus};
use crate::error::FaucetError;
use crate::service::FaucetService;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Shared handler state, constructed once at startup
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FaucetService>,
    pub balance: Arc<BalanceCache>,
    pub database: Arc<dyn ClaimLedger>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/balance", get(balance_handler))
        .route("/api/request-funds", post(request_funds_handler))
        .route("/api/transactions", get(transactions_handler))
        .with_state(state)
}

/// Fund request body
#[derive(Debug, Deserialize)]
pub struct FundRequest {
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub cf_turnstile_response: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: f64,
    pub cached: bool,
}

/// Transaction log entry as serialized to clients. The requester IP is
/// deliberately absent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: u64,
    pub wallet_address: String,
    pub amount: f64,
    pub status: TxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: String,
}

impl From<&TransactionRecord> for TransactionView {
    fn from(record: &TransactionRecord) -> Self {
        // Legacy rows are normalized on the way out
        let timestamp = match record.datetime() {
            Ok(t) => format_timestamp(t),
            Err(_) => record.timestamp.clone(),
        };

        Self {
            id: record.id,
            wallet_address: record.wallet_address.clone(),
            amount: record.amount,
            status: record.status,
            tx_hash: record.tx_hash.clone(),
            error_message: record.error_message.clone(),
            timestamp,
        }
    }
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

pub async fn balance_handler(
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, FaucetError> {
    let (balance, cached) = state.balance.get_balance().await?;
    Ok(Json(BalanceResponse { balance, cached }))
}

pub async fn request_funds_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<FundRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, FaucetError> {
    let Json(request) = body
        .map_err(|_| FaucetError::InvalidRequest("Invalid request format".to_string()))?;

    // Prefer the proxy-reported origin, best effort only
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        "Fund request from {} for wallet: {}",
        client_ip, request.wallet_address
    );

    let disbursement = state
        .service
        .request_funds(
            &request.wallet_address,
            &request.cf_turnstile_response,
            &client_ip,
        )
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "amount": disbursement.amount,
        "transaction_hash": disbursement.tx_hash,
    })))
}

pub async fn transactions_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, FaucetError> {
    let transactions = state.database.recent_transactions(10)?;
    let views: Vec<TransactionView> = transactions.iter().map(TransactionView::from).collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "transactions": views,
    })))
}
