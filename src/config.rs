//! Faucet configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Faucet service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetConfig {
    /// Server bind address
    pub server_addr: String,

    /// Solana RPC endpoint
    pub rpc_url: String,

    /// Path to the funding wallet keypair file (JSON byte array)
    pub wallet_path: String,

    /// Amount to send per request (in SOL)
    pub amount_per_request: f64,

    /// Cloudflare Turnstile secret key (empty disables verification)
    pub turnstile_secret: String,

    /// Cooldown period between claims for the same wallet (seconds)
    pub claim_cooldown_secs: u64,

    /// Timeout for Solana RPC calls (seconds)
    pub rpc_timeout_secs: u64,

    /// Database path
    pub db_path: String,

    /// Allowed CORS origins ("*" allows any)
    pub allowed_origins: Vec<String>,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:8080".to_string(),
            rpc_url: "https://api.testnet.solana.com".to_string(),
            wallet_path: "wallet.json".to_string(),
            amount_per_request: 1.0,
            turnstile_secret: String::new(),
            claim_cooldown_secs: 86400, // 24 hours
            rpc_timeout_secs: 30,
            db_path: "./faucet_data".to_string(),
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl FaucetConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("FAUCET_SERVER_ADDR") {
            config.server_addr = addr;
        }

        if let Ok(rpc_url) = std::env::var("FAUCET_SOLANA_RPC_URL") {
            config.rpc_url = rpc_url;
        }

        if let Ok(path) = std::env::var("FAUCET_WALLET_PATH") {
            config.wallet_path = path;
        }

        if let Ok(amount) = std::env::var("FAUCET_AMOUNT_PER_REQUEST") {
            config.amount_per_request = amount.parse().unwrap_or(config.amount_per_request);
        }

        if let Ok(secret) = std::env::var("FAUCET_TURNSTILE_SECRET") {
            config.turnstile_secret = secret;
        }

        if let Ok(cooldown) = std::env::var("FAUCET_CLAIM_COOLDOWN") {
            config.claim_cooldown_secs = cooldown.parse().unwrap_or(config.claim_cooldown_secs);
        }

        if let Ok(timeout) = std::env::var("FAUCET_TRANSACTION_TIMEOUT") {
            config.rpc_timeout_secs = timeout.parse().unwrap_or(config.rpc_timeout_secs);
        }

        if let Ok(db_path) = std::env::var("FAUCET_DB_PATH") {
            config.db_path = db_path;
        }

        if let Ok(origins) = std::env::var("FAUCET_CORS_ALLOWED_ORIGINS") {
            config.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
        }

        config
    }

    /// Get RPC call timeout
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}
