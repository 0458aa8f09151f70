use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use log::warn;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::config::{HealthchecksConfig, RunConfig};
use crate::schema::{RunStatus, RunSummary};

/// RunReporter receives run lifecycle notifications.
///
/// CONTRACT:
/// - `run_started` arrives once per run, before the first request
/// - `emit` arrives exactly once per run, whichever way it ends
/// - Neither call may fail the run; implementations absorb their own
///   errors and log them
#[async_trait::async_trait]
pub trait RunReporter: Send + Sync {
    async fn run_started(&self);

    async fn emit(&self, summary: &RunSummary);
}

/// Production reporter: appends a human-readable block per run to the
/// run log and pings a healthchecks endpoint.
///
/// Pings:
/// - `{url}/start` when a run begins
/// - `{url}` when it completes
/// - `{url}/fail` (summary as JSON body) when it fails or times out
///
/// Both targets are optional; a reporter with neither configured is
/// inert.
pub struct ServiceReporter {
    log_path: Option<String>,
    max_runtime_mins: u64,
    healthchecks: Option<HealthchecksConfig>,
    http: reqwest::Client,
}

impl ServiceReporter {
    pub fn new(
        run: &RunConfig,
        healthchecks: Option<HealthchecksConfig>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            log_path: run.log_path.clone(),
            max_runtime_mins: run.max_runtime_mins,
            healthchecks: healthchecks.filter(|hc| hc.active),
            http,
        })
    }

    fn status_phrase(&self, summary: &RunSummary) -> String {
        match summary.status {
            RunStatus::Completed => "completed successfully".to_string(),
            RunStatus::TimedOut => {
                format!("timed out after {} minutes", self.max_runtime_mins)
            }
            RunStatus::Failed => format!(
                "failed with error: {}",
                summary.error_detail.as_deref().unwrap_or("unknown")
            ),
        }
    }

    fn log_block(&self, summary: &RunSummary) -> String {
        format!(
            "Operation {} at {}.\n\
             Elapsed time: {} seconds.\n\
             Total requests: {}.\n\
             Total recovery periods: {}.\n\
             Total 721 tokens fetched: {}.\n\n\n",
            self.status_phrase(summary),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            summary.elapsed_seconds,
            summary.total_requests,
            summary.total_recovery_periods,
            summary.total_items_fetched,
        )
    }

    async fn append_log(&self, block: &str) {
        let Some(path) = &self.log_path else { return };

        // tokio files buffer; without the flush the write may still be
        // pending (and its error lost) when this returns
        let written = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(block.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(err) = written {
            warn!("failed to append run log {path}: {err}");
        }
    }

    async fn ping(&self, suffix: &str, body: Option<&RunSummary>) {
        let Some(hc) = &self.healthchecks else { return };

        let url = format!("{}{suffix}", hc.url);
        let request = match body {
            Some(summary) => self.http.post(&url).json(summary),
            None => self.http.post(&url),
        };

        if let Err(err) = request.send().await {
            warn!("healthchecks ping {url} failed: {err}");
        }
    }
}

#[async_trait::async_trait]
impl RunReporter for ServiceReporter {
    async fn run_started(&self) {
        self.ping("/start", None).await;
    }

    async fn emit(&self, summary: &RunSummary) {
        self.append_log(&self.log_block(summary)).await;

        match summary.status {
            RunStatus::Completed => self.ping("", None).await,
            RunStatus::TimedOut | RunStatus::Failed => self.ping("/fail", Some(summary)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter(log_path: Option<String>) -> ServiceReporter {
        ServiceReporter {
            log_path,
            max_runtime_mins: 30,
            healthchecks: None,
            http: reqwest::Client::new(),
        }
    }

    fn summary(status: RunStatus, error_detail: Option<String>) -> RunSummary {
        RunSummary {
            status,
            started_at: Utc::now(),
            elapsed_seconds: 12.5,
            total_requests: 7,
            total_recovery_periods: 0,
            total_items_fetched: 5,
            error_detail,
        }
    }

    #[test]
    fn status_phrases_cover_all_outcomes() {
        let r = reporter(None);

        assert_eq!(
            r.status_phrase(&summary(RunStatus::Completed, None)),
            "completed successfully"
        );
        assert_eq!(
            r.status_phrase(&summary(RunStatus::TimedOut, None)),
            "timed out after 30 minutes"
        );
        assert_eq!(
            r.status_phrase(&summary(RunStatus::Failed, Some("boom".to_string()))),
            "failed with error: boom"
        );
    }

    #[test]
    fn log_block_carries_the_counters() {
        let r = reporter(None);
        let block = r.log_block(&summary(RunStatus::Completed, None));

        assert!(block.starts_with("Operation completed successfully at "));
        assert!(block.contains("Elapsed time: 12.5 seconds.\n"));
        assert!(block.contains("Total requests: 7.\n"));
        assert!(block.contains("Total recovery periods: 0.\n"));
        assert!(block.contains("Total 721 tokens fetched: 5.\n"));
        assert!(block.ends_with("\n\n\n"));
    }

    #[tokio::test]
    async fn appends_one_block_per_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cron.log");
        let r = reporter(Some(path.to_string_lossy().into_owned()));

        // each block must already be on disk when emit returns
        r.emit(&summary(RunStatus::Completed, None)).await;
        let text = std::fs::read_to_string(&path).expect("log file exists");
        assert_eq!(text.matches("Total requests: 7.").count(), 1);

        r.emit(&summary(RunStatus::TimedOut, None)).await;
        let text = std::fs::read_to_string(&path).expect("log file exists");
        assert_eq!(text.matches("Total requests: 7.").count(), 2);
        assert!(text.contains("Operation completed successfully at "));
        assert!(text.contains("Operation timed out after 30 minutes at "));
    }

    #[tokio::test]
    async fn missing_log_path_is_inert() {
        let r = reporter(None);
        // nothing to assert beyond "does not panic / does not write"
        r.emit(&summary(RunStatus::Completed, None)).await;
    }
}
