//! SOL faucet service
//!
//! Disburses a fixed amount of SOL per request with:
//! - Per-wallet claim cooldowns
//! - Cloudflare Turnstile human verification
//! - Cached faucet balance reads
//! - Durable claim and transaction history

pub mod api;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod service;
pub mod solana;
pub mod turnstile;

pub use cache::BalanceCache;
pub use config::FaucetConfig;
pub use database::{ClaimLedger, ClaimRecord, FaucetDatabase, TransactionRecord, TxStatus};
pub use error::{FaucetError, FaucetResult};
pub use service::{Disbursement, FaucetService};
pub use solana::{Distributor, SolanaClient};
pub use turnstile::{TurnstileClient, Verifier};
