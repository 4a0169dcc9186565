//! Claim ledger: durable claim history and transaction log

use crate::error::{FaucetError, FaucetResult};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use tracing::{debug, info};

/// Outcome of a disbursement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

/// Append-only transaction log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Assigned by the database on append
    pub id: u64,
    /// Recipient address
    pub wallet_address: String,
    /// Requester IP (informational, never serialized to the API)
    pub ip_address: String,
    /// Amount sent (in SOL)
    pub amount: f64,
    pub status: TxStatus,
    /// Ledger signature, present iff status is completed
    pub tx_hash: Option<String>,
    /// Present iff status is failed
    pub error_message: Option<String>,
    /// ISO-8601 UTC; legacy naive rows tolerated on read
    pub timestamp: String,
}

impl TransactionRecord {
    /// Build a completed record for a successful transfer
    pub fn completed(
        wallet_address: String,
        ip_address: String,
        amount: f64,
        tx_hash: String,
    ) -> Self {
        Self {
            id: 0,
            wallet_address,
            ip_address,
            amount,
            status: TxStatus::Completed,
            tx_hash: Some(tx_hash),
            error_message: None,
            timestamp: format_timestamp(Utc::now()),
        }
    }

    pub fn datetime(&self) -> FaucetResult<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// One row per wallet; tracks the claim cooldown state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub wallet_address: String,
    /// Overwritten on each admitted claim
    pub ip_address: String,
    /// ISO-8601 UTC; legacy naive rows tolerated on read
    pub last_claim_time: String,
    /// 1 on first claim, incremented on every admitted claim
    pub claim_count: u64,
}

impl ClaimRecord {
    pub fn last_claim_datetime(&self) -> FaucetResult<DateTime<Utc>> {
        parse_timestamp(&self.last_claim_time)
    }
}

/// Render a timestamp in the normalized storage format (`2024-01-02T15:04:05Z`)
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp, falling back to the legacy naive format
pub fn parse_timestamp(raw: &str) -> FaucetResult<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }

    // Rows written before timestamps were normalized lack a zone designator
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|n| Utc.from_utc_datetime(&n))
        .map_err(|e| FaucetError::Internal(format!("unparseable timestamp '{}': {}", raw, e)))
}

/// Durable claim and transaction history.
///
/// The coordinator reads and writes through this seam and never caches the
/// records in memory.
pub trait ClaimLedger: Send + Sync {
    /// Get the claim record for a wallet, if any
    fn get_claim_record(&self, wallet_address: &str) -> FaucetResult<Option<ClaimRecord>>;

    /// Create or update the claim record for a wallet, atomically with
    /// respect to concurrent calls for the same wallet
    fn upsert_claim_record(&self, wallet_address: &str, ip: &str) -> FaucetResult<ClaimRecord>;

    /// Append a transaction record, returning its assigned id
    fn append_transaction(&self, record: TransactionRecord) -> FaucetResult<u64>;

    /// Get the most recent transactions, newest first
    fn recent_transactions(&self, limit: usize) -> FaucetResult<Vec<TransactionRecord>>;
}

/// Faucet database: claim history keyed by wallet, append-only transaction log
pub struct FaucetDatabase {
    db: Db,
    transactions: Tree,
    claim_history: Tree,
}

impl FaucetDatabase {
    /// Create or open the faucet database
    pub fn new(path: &str) -> FaucetResult<Self> {
        info!("Opening faucet database at: {}", path);

        let db = sled::open(path)?;
        let transactions = db.open_tree("transactions")?;
        let claim_history = db.open_tree("claim_history")?;

        Ok(Self {
            db,
            transactions,
            claim_history,
        })
    }
}

impl ClaimLedger for FaucetDatabase {
    fn get_claim_record(&self, wallet_address: &str) -> FaucetResult<Option<ClaimRecord>> {
        match self.claim_history.get(wallet_address.as_bytes())? {
            Some(raw) => {
                let record = bincode::deserialize(&raw)
                    .map_err(|e| FaucetError::Internal(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    // Runs inside a tree transaction so concurrent claims for the same
    // wallet cannot interleave a read-modify-write.
    fn upsert_claim_record(&self, wallet_address: &str, ip: &str) -> FaucetResult<ClaimRecord> {
        let now = format_timestamp(Utc::now());

        let result = self.claim_history.transaction(|tree| {
            let record = match tree.get(wallet_address.as_bytes())? {
                Some(raw) => {
                    let mut existing: ClaimRecord = bincode::deserialize(&raw).map_err(|e| {
                        ConflictableTransactionError::Abort(FaucetError::Internal(e.to_string()))
                    })?;
                    existing.last_claim_time = now.clone();
                    existing.claim_count += 1;
                    existing.ip_address = ip.to_string();
                    existing
                }
                None => ClaimRecord {
                    wallet_address: wallet_address.to_string(),
                    ip_address: ip.to_string(),
                    last_claim_time: now.clone(),
                    claim_count: 1,
                },
            };

            let value = bincode::serialize(&record).map_err(|e| {
                ConflictableTransactionError::Abort(FaucetError::Internal(e.to_string()))
            })?;
            tree.insert(wallet_address.as_bytes(), value)?;
            Ok(record)
        });

        let record = result.map_err(|e| match e {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => FaucetError::Database(err),
        })?;

        debug!(
            "Claim record for {} now at count {}",
            wallet_address, record.claim_count
        );
        Ok(record)
    }

    fn append_transaction(&self, mut record: TransactionRecord) -> FaucetResult<u64> {
        let id = self.db.generate_id()?;
        record.id = id;

        let value =
            bincode::serialize(&record).map_err(|e| FaucetError::Internal(e.to_string()))?;
        self.transactions.insert(id.to_be_bytes(), value)?;

        debug!("Recorded transaction {} for {}", id, record.wallet_address);
        Ok(id)
    }

    fn recent_transactions(&self, limit: usize) -> FaucetResult<Vec<TransactionRecord>> {
        let mut records = Vec::with_capacity(limit);

        // Keys are monotonically increasing ids, so reverse order is newest first
        for item in self.transactions.iter().rev().take(limit) {
            let (_, value) = item?;
            let record: TransactionRecord = bincode::deserialize(&value)
                .map_err(|e| FaucetError::Internal(e.to_string()))?;
            records.push(record);
        }

        Ok(records)
    }
}
