use log::debug;
use serde_json::{json, Value};

use crate::config::RpcConfig;

/// Why a supply lookup failed. Any variant fails the whole run before
/// a single token request is sent.
#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    /// The request never produced a response (DNS, connect, timeout)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a JSON-RPC error object
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The result was not a uint256 word that fits in a u64
    #[error("malformed totalSupply result: {0}")]
    Malformed(String),
}

/// SupplySource resolves how many tokens the collection currently has.
///
/// The sweep covers ids `first_token_id ..= last_token_id()`. Most
/// ERC-721 collections mint ids starting at 1, so totalSupply doubles
/// as the last id.
///
/// The lookup runs once per refresh run, never cached across runs, so
/// tokens minted between runs are picked up.
#[async_trait::async_trait]
pub trait SupplySource: Send + Sync {
    async fn last_token_id(&self) -> Result<u64, RangeError>;
}

// ------------------------------------------------------------
// Ethereum JSON-RPC implementation
// ------------------------------------------------------------

/// Selector of `totalSupply()`, the only contract call made
const TOTAL_SUPPLY_SELECTOR: &str = "0x18160ddd";

/// Reads `totalSupply()` from the collection contract via `eth_call`
/// against a plain JSON-RPC endpoint.
pub struct EthRpcSupplySource {
    http: reqwest::Client,
    url: String,
    contract: String,
}

impl EthRpcSupplySource {
    pub fn new(cfg: &RpcConfig, contract: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()?;

        Ok(Self {
            http,
            url: cfg.url.clone(),
            contract,
        })
    }
}

#[async_trait::async_trait]
impl SupplySource for EthRpcSupplySource {
    async fn last_token_id(&self) -> Result<u64, RangeError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": self.contract, "data": TOTAL_SUPPLY_SELECTOR },
                "latest"
            ],
        });

        let reply: Value = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let supply = decode_supply_reply(&reply)?;
        debug!("totalSupply({}) = {supply}", self.contract);
        Ok(supply)
    }
}

/// Digs the uint256 word out of an `eth_call` reply.
fn decode_supply_reply(reply: &Value) -> Result<u64, RangeError> {
    if let Some(err) = reply.get("error") {
        return Err(RangeError::Rpc(err.to_string()));
    }

    let word = reply
        .get("result")
        .and_then(Value::as_str)
        .ok_or_else(|| RangeError::Malformed(reply.to_string()))?;

    parse_uint_word(word)
}

/// Decodes one ABI-encoded uint256 word into a u64.
///
/// The word is 32 bytes, so everything above the low 8 bytes must be
/// zero for the value to be representable.
fn parse_uint_word(hex: &str) -> Result<u64, RangeError> {
    let word = hex.strip_prefix("0x").unwrap_or(hex);

    if word.is_empty() || !word.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RangeError::Malformed(hex.to_string()));
    }

    let (high, low) = word.split_at(word.len().saturating_sub(16));
    if high.bytes().any(|b| b != b'0') {
        return Err(RangeError::Malformed(format!("{hex} exceeds u64 range")));
    }

    u64::from_str_radix(low, 16).map_err(|_| RangeError::Malformed(hex.to_string()))
}
