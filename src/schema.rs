use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single collection item whose cached metadata gets refreshed.
///
/// Identity is the `(id, contract)` pair. Tokens are immutable once
/// created; the refresh run clones them freely between the sweep loop
/// and the retry queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Sequential token id within the collection
    pub id: u64,

    /// Collection contract address (0x-prefixed)
    pub contract: String,
}

// ------------------------------------------------------------
// Run outcome reporting
// ------------------------------------------------------------
//
// Every refresh run ends in exactly one of these states and emits
// exactly one RunSummary. The summary is what reporters receive:
// it is appended to the run log and, when healthchecks pinging is
// enabled, posted as the JSON body of the fail ping.
//

/// Terminal state of a refresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Both phases finished and the retry queue drained
    Completed,

    /// The watchdog fired before the run finished; pending retries
    /// were dropped
    TimedOut,

    /// The run aborted before or outside per-item dispatch
    /// (e.g. the supply lookup failed)
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Structured summary of one refresh run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// How the run ended
    pub status: RunStatus,

    /// Wall-clock time the run started
    pub started_at: DateTime<Utc>,

    /// Run duration in seconds
    pub elapsed_seconds: f64,

    /// Requests issued across both phases (sweep + retries)
    pub total_requests: u64,

    /// Recovery periods entered by the failure breaker
    pub total_recovery_periods: u32,

    /// Tokens swept in phase 1 (attempted, successful or not)
    pub total_items_fetched: u64,

    /// Fault description for failed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl RunSummary {
    /// One-line rendering used by the console log.
    pub fn log_line(&self) -> String {
        format!(
            "status={} elapsed={:.1}s requests={} recovery_periods={} tokens_fetched={}",
            self.status,
            self.elapsed_seconds,
            self.total_requests,
            self.total_recovery_periods,
            self.total_items_fetched,
        )
    }
}
