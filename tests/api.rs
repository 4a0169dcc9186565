//! Router-level tests for the HTTP surface

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use solana_faucet::api::{router, AppState};
use solana_faucet::{
    BalanceCache, ClaimLedger, Distributor, FaucetConfig, FaucetDatabase, FaucetError,
    FaucetResult, FaucetService, Verifier,
};
use std::sync::Arc;
use tower::ServiceExt;

struct MockDistributor;

#[async_trait]
impl Distributor for MockDistributor {
    async fn transfer(&self, _to: &str, _amount: f64) -> FaucetResult<String> {
        Ok("test-signature".to_string())
    }

    async fn balance(&self) -> FaucetResult<u64> {
        Ok(42_000_000_000)
    }
}

struct FailingDistributor;

#[async_trait]
impl Distributor for FailingDistributor {
    async fn transfer(&self, _to: &str, _amount: f64) -> FaucetResult<String> {
        Err(FaucetError::Upstream("rpc down".to_string()))
    }

    async fn balance(&self) -> FaucetResult<u64> {
        Err(FaucetError::Upstream("rpc down".to_string()))
    }
}

struct ApproveAll;

#[async_trait]
impl Verifier for ApproveAll {
    async fn verify(&self, _token: &str) -> FaucetResult<bool> {
        Ok(true)
    }
}

fn test_state(distributor: Arc<dyn Distributor>) -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let database = Arc::new(FaucetDatabase::new(dir.path().to_str().unwrap()).unwrap());

    let config = FaucetConfig {
        amount_per_request: 1.0,
        claim_cooldown_secs: 86400,
        ..FaucetConfig::default()
    };

    let service = Arc::new(FaucetService::new(
        config,
        database.clone(),
        distributor.clone(),
        Arc::new(ApproveAll),
    ));
    let balance = Arc::new(BalanceCache::new(distributor));

    (
        dir,
        AppState {
            service,
            balance,
            database,
        },
    )
}

fn wallet(byte: u8) -> String {
    bs58::encode([byte; 32]).into_string()
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json(app: &axum::Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn fund_request(wallet: &str) -> String {
    json!({
        "wallet_address": wallet,
        "cf_turnstile_response": "token",
    })
    .to_string()
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, state) = test_state(Arc::new(MockDistributor));
    let app = router(state);

    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn balance_reports_cache_state() {
    let (_dir, state) = test_state(Arc::new(MockDistributor));
    let app = router(state);

    let (status, body) = get(&app, "/api/balance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"].as_f64(), Some(42.0));
    assert_eq!(body["cached"], json!(false));

    let (_, body) = get(&app, "/api/balance").await;
    assert_eq!(body["balance"].as_f64(), Some(42.0));
    assert_eq!(body["cached"], json!(true));
}

#[tokio::test]
async fn balance_upstream_failure_is_500() {
    let (_dir, state) = test_state(Arc::new(FailingDistributor));
    let app = router(state);

    let (status, body) = get(&app, "/api/balance").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn request_funds_happy_path() {
    let (_dir, state) = test_state(Arc::new(MockDistributor));
    let app = router(state);
    let wallet = wallet(1);

    let (status, body) = post_json(&app, "/api/request-funds", fund_request(&wallet)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["amount"].as_f64(), Some(1.0));
    assert_eq!(body["transaction_hash"], json!("test-signature"));

    let (status, body) = get(&app, "/api/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["walletAddress"], json!(wallet));
    assert_eq!(transactions[0]["status"], json!("completed"));
    assert_eq!(transactions[0]["txHash"], json!("test-signature"));
    assert!(
        transactions[0].get("ipAddress").is_none(),
        "IP must not be serialized"
    );
}

#[tokio::test]
async fn cooldown_yields_429_with_next_claim_time() {
    let (_dir, state) = test_state(Arc::new(MockDistributor));
    let app = router(state);
    let wallet = wallet(2);

    let (status, _) = post_json(&app, "/api/request-funds", fund_request(&wallet)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(&app, "/api/request-funds", fund_request(&wallet)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], json!(false));
    assert!(body["nextClaimTime"].as_i64().is_some());
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Please wait until "));
}

#[tokio::test]
async fn invalid_address_yields_400() {
    let (_dir, state) = test_state(Arc::new(MockDistributor));
    let app = router(state);

    let (status, body) =
        post_json(&app, "/api/request-funds", fund_request("not-a-wallet")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn malformed_body_yields_400() {
    let (_dir, state) = test_state(Arc::new(MockDistributor));
    let app = router(state);

    let (status, body) =
        post_json(&app, "/api/request-funds", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Invalid request format"));
}

#[tokio::test]
async fn transfer_failure_yields_500_and_no_record() {
    let (_dir, state) = test_state(Arc::new(FailingDistributor));
    let app = router(state.clone());
    let wallet = wallet(3);

    let (status, body) = post_json(&app, "/api/request-funds", fund_request(&wallet)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));

    // The claim was not consumed and nothing was logged
    assert!(state.database.get_claim_record(&wallet).unwrap().is_none());
    assert!(state.database.recent_transactions(10).unwrap().is_empty());
}

#[tokio::test]
async fn transactions_listing_is_idempotent_and_bounded() {
    let (_dir, state) = test_state(Arc::new(MockDistributor));
    let app = router(state);

    for i in 0..12u8 {
        let (status, _) =
            post_json(&app, "/api/request-funds", fund_request(&wallet(100 + i))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, first) = get(&app, "/api/transactions").await;
    let (_, second) = get(&app, "/api/transactions").await;
    assert_eq!(first, second);

    let transactions = first["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 10, "listing is capped at 10");

    // Newest first
    assert_eq!(transactions[0]["walletAddress"], json!(wallet(111)));
    assert_eq!(transactions[9]["walletAddress"], json!(wallet(102)));
}
