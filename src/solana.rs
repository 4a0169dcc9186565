//! Solana distributor client
//!
//! Talks JSON-RPC to a Solana node and signs system-program transfers with
//! the funding wallet keypair. The faucet only needs two capabilities from
//! the ledger: send a fixed transfer and read the funding wallet balance.

use crate::error::{FaucetError, FaucetResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer, SigningKey};
use std::time::Duration;
use tracing::{debug, info};

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: f64 = 1e9;

const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// System-program instruction discriminant for a lamport transfer
const SYSTEM_TRANSFER_INDEX: u32 = 2;

/// Capability boundary to the ledger network
#[async_trait]
pub trait Distributor: Send + Sync {
    /// Send `amount_sol` to `to_address`, returning the transaction signature
    async fn transfer(&self, to_address: &str, amount_sol: f64) -> FaucetResult<String>;

    /// Current funding wallet balance in lamports
    async fn balance(&self) -> FaucetResult<u64>;
}

/// Check whether a string is a well-formed Solana address (base58, 32 bytes)
pub fn is_valid_address(address: &str) -> bool {
    match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes.len() == 32,
        Err(_) => false,
    }
}

/// JSON-RPC Solana client holding the funding wallet keypair
pub struct SolanaClient {
    rpc_url: String,
    client: reqwest::Client,
    signing_key: SigningKey,
    public_key: [u8; 32],
    address: String,
}

impl SolanaClient {
    /// Create a client, loading the keypair from the original wallet format:
    /// a JSON array of 64 bytes (secret key followed by public key).
    pub fn new(rpc_url: String, wallet_path: &str, timeout: Duration) -> FaucetResult<Self> {
        let raw = std::fs::read_to_string(wallet_path)
            .map_err(|e| FaucetError::Internal(format!("failed to read wallet file: {}", e)))?;
        let bytes: Vec<u8> = serde_json::from_str(&raw)
            .map_err(|e| FaucetError::Internal(format!("failed to parse wallet file: {}", e)))?;

        if bytes.len() != 64 {
            return Err(FaucetError::Internal(format!(
                "wallet file must contain 64 bytes, got {}",
                bytes.len()
            )));
        }

        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes[..32]);
        let signing_key = SigningKey::from_bytes(&secret);
        let public_key = signing_key.verifying_key().to_bytes();
        let address = bs58::encode(public_key).into_string();

        info!("Faucet wallet address: {}", address);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FaucetError::Internal(e.to_string()))?;

        Ok(Self {
            rpc_url,
            client,
            signing_key,
            public_key,
            address,
        })
    }

    /// Funding wallet address (base58)
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> FaucetResult<serde_json::Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FaucetError::Upstream(format!("rpc request failed: {}", e)))?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FaucetError::Upstream(format!("invalid rpc response: {}", e)))?;

        if let Some(error) = json.get("error") {
            return Err(FaucetError::Upstream(format!("rpc error: {}", error)));
        }

        Ok(json
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn latest_blockhash(&self) -> FaucetResult<[u8; 32]> {
        let result = self
            .call(
                "getLatestBlockhash",
                serde_json::json!([{ "commitment": "confirmed" }]),
            )
            .await?;

        let blockhash = result
            .pointer("/value/blockhash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FaucetError::Upstream("missing blockhash in response".to_string()))?;

        let bytes = bs58::decode(blockhash)
            .into_vec()
            .map_err(|e| FaucetError::Upstream(format!("invalid blockhash: {}", e)))?;
        bytes
            .try_into()
            .map_err(|_| FaucetError::Upstream("blockhash is not 32 bytes".to_string()))
    }
}

#[async_trait]
impl Distributor for SolanaClient {
    async fn transfer(&self, to_address: &str, amount_sol: f64) -> FaucetResult<String> {
        let recipient: [u8; 32] = bs58::decode(to_address)
            .into_vec()
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| FaucetError::InvalidAddress(to_address.to_string()))?;

        let lamports = (amount_sol * LAMPORTS_PER_SOL) as u64;
        let blockhash = self.latest_blockhash().await?;

        let message = build_transfer_message(&self.public_key, &recipient, lamports, &blockhash);
        let signature = self.signing_key.sign(&message);

        // Wire transaction: compact array of signatures, then the message
        let mut tx = Vec::with_capacity(1 + 64 + message.len());
        push_compact_u16(&mut tx, 1);
        tx.extend_from_slice(&signature.to_bytes());
        tx.extend_from_slice(&message);

        debug!("Sending {} lamports to {}", lamports, to_address);

        let result = self
            .call(
                "sendTransaction",
                serde_json::json!([
                    BASE64.encode(&tx),
                    { "encoding": "base64", "preflightCommitment": "confirmed" }
                ]),
            )
            .await?;

        let sig = result
            .as_str()
            .ok_or_else(|| FaucetError::Upstream("missing signature in response".to_string()))?
            .to_string();

        info!("Transaction sent: {}", sig);
        Ok(sig)
    }

    async fn balance(&self) -> FaucetResult<u64> {
        let result = self
            .call(
                "getBalance",
                serde_json::json!([self.address, { "commitment": "confirmed" }]),
            )
            .await?;

        result
            .pointer("/value")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| FaucetError::Upstream("missing balance in response".to_string()))
    }
}

/// Serialize a legacy-format message holding one system transfer instruction.
///
/// Layout: header, compact array of account keys (payer, recipient, system
/// program), recent blockhash, compact array of compiled instructions.
fn build_transfer_message(
    from: &[u8; 32],
    to: &[u8; 32],
    lamports: u64,
    blockhash: &[u8; 32],
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(160);

    msg.push(1); // required signatures
    msg.push(0); // read-only signed accounts
    msg.push(1); // read-only unsigned accounts (the system program)

    push_compact_u16(&mut msg, 3);
    msg.extend_from_slice(from);
    msg.extend_from_slice(to);
    msg.extend_from_slice(&SYSTEM_PROGRAM_ID);

    msg.extend_from_slice(blockhash);

    push_compact_u16(&mut msg, 1);
    msg.push(2); // program id index
    push_compact_u16(&mut msg, 2);
    msg.push(0); // from
    msg.push(1); // to

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    push_compact_u16(&mut msg, data.len() as u16);
    msg.extend_from_slice(&data);

    msg
}

/// Solana compact-u16 (shortvec) length encoding
fn push_compact_u16(buf: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn address_validation() {
        let valid = bs58::encode([7u8; 32]).into_string();
        assert!(is_valid_address(&valid));

        assert!(!is_valid_address(""));
        assert!(!is_valid_address("not-base58-0OIl"));
        // Too short: 20 bytes instead of 32
        let short = bs58::encode([7u8; 20]).into_string();
        assert!(!is_valid_address(&short));
    }

    #[test]
    fn compact_u16_encoding() {
        let mut buf = Vec::new();
        push_compact_u16(&mut buf, 0);
        assert_eq!(buf, [0]);

        buf.clear();
        push_compact_u16(&mut buf, 3);
        assert_eq!(buf, [3]);

        buf.clear();
        push_compact_u16(&mut buf, 0x80);
        assert_eq!(buf, [0x80, 0x01]);

        buf.clear();
        push_compact_u16(&mut buf, 0x3fff);
        assert_eq!(buf, [0xff, 0x7f]);
    }

    #[test]
    fn transfer_message_layout() {
        let from = [1u8; 32];
        let to = [2u8; 32];
        let blockhash = [9u8; 32];
        let msg = build_transfer_message(&from, &to, 1_000_000_000, &blockhash);

        // header
        assert_eq!(&msg[..3], &[1, 0, 1]);
        // account keys
        assert_eq!(msg[3], 3);
        assert_eq!(&msg[4..36], &from);
        assert_eq!(&msg[36..68], &to);
        assert_eq!(&msg[68..100], &SYSTEM_PROGRAM_ID);
        // blockhash
        assert_eq!(&msg[100..132], &blockhash);
        // one instruction against the system program
        assert_eq!(msg[132], 1);
        assert_eq!(msg[133], 2);
        assert_eq!(&msg[134..137], &[2, 0, 1]);
        // data: u32 transfer discriminant + u64 lamports, little endian
        assert_eq!(msg[137], 12);
        assert_eq!(&msg[138..142], &2u32.to_le_bytes());
        assert_eq!(&msg[142..150], &1_000_000_000u64.to_le_bytes());
        assert_eq!(msg.len(), 150);
    }

    #[test]
    fn loads_wallet_from_json_byte_array() {
        let secret = [5u8; 32];
        let signing_key = SigningKey::from_bytes(&secret);
        let mut keypair = Vec::with_capacity(64);
        keypair.extend_from_slice(&secret);
        keypair.extend_from_slice(&signing_key.verifying_key().to_bytes());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&keypair).unwrap()).unwrap();

        let client = SolanaClient::new(
            "http://localhost:8899".to_string(),
            file.path().to_str().unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(is_valid_address(client.address()));
        assert_eq!(
            bs58::decode(client.address()).into_vec().unwrap(),
            signing_key.verifying_key().to_bytes()
        );
    }

    #[test]
    fn rejects_malformed_wallet_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();

        let result = SolanaClient::new(
            "http://localhost:8899".to_string(),
            file.path().to_str().unwrap(),
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }
}
