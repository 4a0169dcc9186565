//! Error types for the faucet service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Faucet service errors
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("cooldown active until {next_claim_time}")]
    CooldownActive {
        /// Human-readable wait message shown to the caller
        message: String,
        /// Epoch seconds of the earliest admissible claim
        next_claim_time: i64,
    },

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        // Detailed errors go to the log; the wire carries generic messages
        // except for the user-facing validation and cooldown cases.
        let (status, body) = match &self {
            FaucetError::InvalidRequest(msg)
            | FaucetError::InvalidAddress(msg)
            | FaucetError::VerificationFailed(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": msg }),
            ),
            FaucetError::CooldownActive {
                message,
                next_claim_time,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "success": false,
                    "error": message,
                    "nextClaimTime": next_claim_time,
                }),
            ),
            FaucetError::TransferFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "Failed to send transaction" }),
            ),
            FaucetError::Upstream(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "Upstream service unavailable" }),
            ),
            FaucetError::Database(_) | FaucetError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "Internal server error" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;
