//! Time-windowed cache over the faucet wallet balance
//!
//! Bounds the upstream balance query rate to at most once per cache window
//! regardless of how many callers arrive concurrently.

use crate::error::FaucetResult;
use crate::solana::{Distributor, LAMPORTS_PER_SOL};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// How long a fetched balance stays valid
pub const BALANCE_CACHE_WINDOW: Duration = Duration::from_secs(60);

struct CacheEntry {
    balance_sol: f64,
    fetched_at: Instant,
}

impl CacheEntry {
    fn fresh(&self, window: Duration) -> bool {
        self.fetched_at.elapsed() < window
    }
}

/// Process-wide balance cache. Constructed once at startup and injected into
/// handlers; the entry lives for the process lifetime and is only replaced
/// on expiry.
pub struct BalanceCache {
    distributor: Arc<dyn Distributor>,
    window: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl BalanceCache {
    pub fn new(distributor: Arc<dyn Distributor>) -> Self {
        Self::with_window(distributor, BALANCE_CACHE_WINDOW)
    }

    pub fn with_window(distributor: Arc<dyn Distributor>, window: Duration) -> Self {
        Self {
            distributor,
            window,
            entry: RwLock::new(None),
        }
    }

    /// Get the faucet balance in SOL and whether it was served from cache.
    ///
    /// Double-checked locking: the freshness condition is re-checked under
    /// the write lock because a concurrent writer may have refreshed the
    /// entry while this caller waited, which would otherwise cause a
    /// duplicate fetch burst on a cache miss.
    pub async fn get_balance(&self) -> FaucetResult<(f64, bool)> {
        {
            let guard = self.entry.read().await;
            if let Some(entry) = guard.as_ref() {
                if entry.fresh(self.window) {
                    return Ok((entry.balance_sol, true));
                }
            }
        }

        let mut guard = self.entry.write().await;
        if let Some(entry) = guard.as_ref() {
            if entry.fresh(self.window) {
                debug!("Balance refreshed by a concurrent request");
                return Ok((entry.balance_sol, true));
            }
        }

        // A stale entry is not a fallback: if the query fails the caller
        // sees the upstream error.
        let lamports = self.distributor.balance().await?;
        let balance_sol = lamports as f64 / LAMPORTS_PER_SOL;
        *guard = Some(CacheEntry {
            balance_sol,
            fetched_at: Instant::now(),
        });

        debug!("Fetched fresh balance: {} SOL", balance_sol);
        Ok((balance_sol, false))
    }
}
