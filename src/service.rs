//! Claim coordinator: admission and disbursement

use crate::config::FaucetConfig;
use crate::database::{ClaimLedger, TransactionRecord};
use crate::error::{FaucetError, FaucetResult};
use crate::solana::{self, Distributor};
use crate::turnstile::Verifier;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Result of an admitted claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disbursement {
    /// Ledger signature of the transfer
    pub tx_hash: String,
    /// Amount sent (in SOL)
    pub amount: f64,
    /// False when the transfer went through but a history write failed.
    /// The funds are gone either way; the transfer is never rolled back.
    pub recorded: bool,
}

/// Faucet claim coordinator.
///
/// Serializes admission per wallet so two concurrent requests cannot both
/// observe an expired cooldown. Admission for different wallets runs in
/// parallel.
pub struct FaucetService {
    config: FaucetConfig,
    database: Arc<dyn ClaimLedger>,
    distributor: Arc<dyn Distributor>,
    verifier: Arc<dyn Verifier>,
    // Per-wallet admission locks, created on demand. The key space is
    // bounded by the number of distinct wallets served, so entries are
    // never evicted.
    wallet_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FaucetService {
    pub fn new(
        config: FaucetConfig,
        database: Arc<dyn ClaimLedger>,
        distributor: Arc<dyn Distributor>,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        Self {
            config,
            database,
            distributor,
            verifier,
            wallet_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Admit and execute a claim for `wallet_address`.
    ///
    /// Preconditions are checked in order and the first failure
    /// short-circuits: address syntax, human verification, cooldown. A
    /// failed transfer does not consume the claim. After a successful
    /// transfer, the transaction record and the claim record are written
    /// best-effort, in that order: a missing claim record is the one that
    /// would permit an immediate re-claim, so its write goes last to keep
    /// that window as small as possible.
    pub async fn request_funds(
        &self,
        wallet_address: &str,
        verification_token: &str,
        source_ip: &str,
    ) -> FaucetResult<Disbursement> {
        info!(
            "Claim request for wallet: {}, IP: {}",
            wallet_address, source_ip
        );

        if wallet_address.is_empty() {
            return Err(FaucetError::InvalidRequest(
                "Wallet address is required".to_string(),
            ));
        }
        if !solana::is_valid_address(wallet_address) {
            return Err(FaucetError::InvalidAddress(
                "Invalid Solana wallet address format".to_string(),
            ));
        }

        if verification_token.is_empty() {
            return Err(FaucetError::VerificationFailed(
                "Turnstile response is required".to_string(),
            ));
        }
        // A transport failure propagates as Upstream, distinct from a
        // negative verdict; both block the claim.
        if !self.verifier.verify(verification_token).await? {
            return Err(FaucetError::VerificationFailed(
                "Invalid Turnstile token".to_string(),
            ));
        }

        let lock = self.wallet_lock(wallet_address).await;
        let _admission = lock.lock().await;

        if let Some(record) = self.database.get_claim_record(wallet_address)? {
            let last_claim = record.last_claim_datetime()?;
            let next_claim = last_claim + Duration::seconds(self.config.claim_cooldown_secs as i64);
            let now = Utc::now();

            if now < next_claim {
                debug!(
                    "Wallet {} in cooldown until {} (claim count {})",
                    wallet_address, next_claim, record.claim_count
                );
                return Err(FaucetError::CooldownActive {
                    message: format!(
                        "Please wait until {} before requesting funds again",
                        format_wait(now, next_claim)
                    ),
                    next_claim_time: next_claim.timestamp(),
                });
            }
        }

        let amount = self.config.amount_per_request;
        let tx_hash = self
            .distributor
            .transfer(wallet_address, amount)
            .await
            .map_err(|e| FaucetError::TransferFailed(e.to_string()))?;

        // The transfer is irreversible from here on. Both history writes
        // are best-effort: log and report, never fail the claim.
        let mut recorded = true;

        let record = TransactionRecord::completed(
            wallet_address.to_string(),
            source_ip.to_string(),
            amount,
            tx_hash.clone(),
        );
        if let Err(e) = self.database.append_transaction(record) {
            error!(
                "Funds sent ({}) but transaction record failed for {}: {}",
                tx_hash, wallet_address, e
            );
            recorded = false;
        }

        if let Err(e) = self.database.upsert_claim_record(wallet_address, source_ip) {
            error!(
                "Funds sent ({}) but claim record failed for {}: {}; an immediate retry may bypass the cooldown",
                tx_hash, wallet_address, e
            );
            recorded = false;
        }

        info!(
            "Dispensed {} SOL to {}, tx: {}",
            amount, wallet_address, tx_hash
        );

        Ok(Disbursement {
            tx_hash,
            amount,
            recorded,
        })
    }

    async fn wallet_lock(&self, wallet_address: &str) -> Arc<Mutex<()>> {
        let mut locks = self.wallet_locks.lock().await;
        locks
            .entry(wallet_address.to_string())
            .or_default()
            .clone()
    }
}

/// Render the remaining wait as a human-readable message.
///
/// Long waits render as an absolute time; short ones as the two largest
/// nonzero units. The numeric next-claim time always accompanies this in
/// the response, so the string is display-only.
fn format_wait(now: DateTime<Utc>, next_claim: DateTime<Utc>) -> String {
    let remaining = (next_claim - now).num_seconds().max(0);
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    let seconds = remaining % 60;

    if hours >= 2 {
        // Rendered in UTC; clients localize from nextClaimTime
        next_claim.format("%b %-d at %-I:%M %p").to_string()
    } else if hours > 0 {
        if minutes > 0 {
            format!(
                "{} hour{} and {} minute{}",
                hours,
                plural(hours),
                minutes,
                plural(minutes)
            )
        } else {
            format!("{} hour{}", hours, plural(hours))
        }
    } else if minutes > 0 {
        if seconds > 0 {
            format!(
                "{} minute{} and {} second{}",
                minutes,
                plural(minutes),
                seconds,
                plural(seconds)
            )
        } else {
            format!("{} minute{}", minutes, plural(minutes))
        }
    } else {
        format!("{} second{}", seconds, plural(seconds))
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
