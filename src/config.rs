use std::time::Duration;

use serde::Deserialize;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// It defines:
// - The collection to refresh and where its size comes from
// - The metadata API endpoint and credentials
// - Pacing, breaker and runtime limits for a refresh run
// - Trigger settings (HTTP port, timer cadence)
// - Optional reporting targets (run log file, healthchecks)
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The NFT collection being refreshed
    pub collection: CollectionConfig,

    /// Metadata API (OpenSea) settings
    pub opensea: OpenSeaConfig,

    /// Ethereum JSON-RPC node used for the supply lookup
    pub rpc: RpcConfig,

    /// Leaky-bucket pacing for outbound requests
    pub pacing: PacingConfig,

    /// Consecutive-failure breaker settings
    pub breaker: BreakerConfig,

    /// Per-run limits and reporting
    pub run: RunConfig,

    /// Periodic trigger cadence
    pub schedule: ScheduleConfig,

    /// HTTP trigger endpoint
    pub server: ServerConfig,

    /// Optional healthchecks pinging
    pub healthchecks: Option<HealthchecksConfig>,
}

// ------------------------------------------------------------
// Collection
// ------------------------------------------------------------
//
// Identifies the contract whose tokens are swept. Token ids are
// assumed sequential from `first_token_id` up to the contract's
// totalSupply(), which is resolved at the start of every run.
//
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// Collection contract address (0x-prefixed, 20 bytes of hex)
    pub contract: String,

    /// First token id of the collection (0 or 1 for most contracts)
    pub first_token_id: u64,
}

// ------------------------------------------------------------
// OpenSea API
// ------------------------------------------------------------
//
// NOTE:
// - The API key is security-sensitive and must never be committed.
// - `force_update=true` is appended per request by the client; the
//   base URL here is just the asset endpoint root.
//
#[derive(Debug, Deserialize, Clone)]
pub struct OpenSeaConfig {
    /// Asset endpoint root
    #[serde(default = "default_opensea_base_url")]
    pub base_url: String,

    /// API key sent as the X-Api-Key header
    pub api_key: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl OpenSeaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_opensea_base_url() -> String {
    "https://api.opensea.io/api/v1/asset".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ------------------------------------------------------------
// Ethereum RPC
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    /// HTTP(S) JSON-RPC endpoint of an Ethereum node
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ------------------------------------------------------------
// Pacing
// ------------------------------------------------------------
//
// Leaky-bucket parameters. Every `bucket_size`-th request is followed
// by a delay: `leak_ms` during the initial sweep, `retry_leak_ms`
// while draining the retry queue. The retry delay is typically the
// larger of the two.
//
#[derive(Debug, Deserialize, Clone)]
pub struct PacingConfig {
    /// Requests allowed per bucket before a delay is inserted
    pub bucket_size: u64,

    /// Delay after each full bucket during the sweep, in milliseconds
    pub leak_ms: u64,

    /// Delay after each full bucket during the retry phase, in milliseconds
    pub retry_leak_ms: u64,
}

impl PacingConfig {
    pub fn leak(&self) -> Duration {
        Duration::from_millis(self.leak_ms)
    }

    pub fn retry_leak(&self) -> Duration {
        Duration::from_millis(self.retry_leak_ms)
    }
}

// ------------------------------------------------------------
// Failure breaker
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures tolerated before a recovery period starts
    /// (recovery begins on failure number `fail_limit + 1`)
    pub fail_limit: u32,

    /// Successes required to end a recovery period
    pub recovery_period: u32,
}

// ------------------------------------------------------------
// Run limits & reporting
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Hard cap on run duration, in minutes; the watchdog aborts the
    /// run when exceeded
    pub max_runtime_mins: u64,

    /// Optional path of the human-readable run log (one block
    /// appended per run)
    pub log_path: Option<String>,
}

impl RunConfig {
    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime_mins * 60)
    }
}

// ------------------------------------------------------------
// Periodic trigger
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Minutes between scheduled refresh runs; ticks that land while
    /// a run is active are skipped
    pub frequency_mins: u64,
}

impl ScheduleConfig {
    pub fn every(&self) -> Duration {
        Duration::from_secs(self.frequency_mins * 60)
    }
}

// ------------------------------------------------------------
// HTTP trigger
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Port for the GET /refresh trigger endpoint
    pub port: u16,
}

// ------------------------------------------------------------
// Healthchecks
// ------------------------------------------------------------
//
// When active, the service pings `{url}/start` when a run begins,
// `{url}` when it completes, and `{url}/fail` (with the summary as
// JSON body) when it fails or times out.
//
#[derive(Debug, Deserialize, Clone)]
pub struct HealthchecksConfig {
    /// Enables pinging
    pub active: bool,

    /// Base check URL
    pub url: String,
}

impl Config {
    /// Rejects configurations that would break run arithmetic or point
    /// the service at nothing. Called once at startup, right after the
    /// file is parsed.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_hex_address(&self.collection.contract) {
            anyhow::bail!(
                "collection.contract must be a 0x-prefixed 20-byte hex address, got {:?}",
                self.collection.contract
            );
        }
        if self.opensea.api_key.is_empty() {
            anyhow::bail!("opensea.api_key must not be empty");
        }
        if self.rpc.url.is_empty() {
            anyhow::bail!("rpc.url must not be empty");
        }
        if self.pacing.bucket_size == 0 {
            anyhow::bail!("pacing.bucket_size must be at least 1");
        }
        if self.breaker.recovery_period == 0 {
            anyhow::bail!("breaker.recovery_period must be at least 1");
        }
        if self.run.max_runtime_mins == 0 {
            anyhow::bail!("run.max_runtime_mins must be at least 1");
        }
        if self.schedule.frequency_mins == 0 {
            anyhow::bail!("schedule.frequency_mins must be at least 1");
        }
        Ok(())
    }
}

fn is_hex_address(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(body) => body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
