// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration structs loaded from JSON
// - schema:    Strongly typed token / run-summary definitions
// - metrics:   Process-wide runtime counters
// - clients:   OpenSea metadata client + Ethereum supply lookup
// - refresh:   Run orchestration (pacing, breaker, retries, watchdog)
// - report:    Run summaries (log file + healthchecks pings)
// - scheduler: Periodic run trigger
// - server:    HTTP run trigger
//
mod clients;
mod config;
mod metrics;
mod refresh;
mod report;
mod scheduler;
mod schema;
mod server;

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use env_logger::Env;
use log::info;
use tokio::time::sleep;

use clients::opensea::OpenSeaClient;
use clients::supply::EthRpcSupplySource;
use config::Config;
use metrics::METRICS;
use refresh::{Refresher, RefreshSettings};
use report::ServiceReporter;

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// This is the main runtime for the metadata refresher.
//
// Responsibilities:
// - Load and validate configuration
// - Wire the OpenSea / RPC clients and the reporter into the
//   run orchestrator
// - Start the periodic trigger (the first run fires immediately)
// - Serve the HTTP trigger endpoint
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // --------------------------------------------------------
    // Load configuration from disk
    //
    // NOTE:
    // - The config file contains sensitive data (the API key).
    // - It must not be committed to version control.
    // --------------------------------------------------------
    let config = load_config("config.json")?;
    config.validate()?;

    // --------------------------------------------------------
    // Wire up the orchestrator
    // --------------------------------------------------------
    let api = Arc::new(OpenSeaClient::new(&config.opensea)?);
    let supply = Arc::new(EthRpcSupplySource::new(
        &config.rpc,
        config.collection.contract.clone(),
    )?);
    let reporter = Arc::new(ServiceReporter::new(
        &config.run,
        config.healthchecks.clone(),
    )?);

    let refresher = Arc::new(Refresher::new(
        RefreshSettings::from_config(&config),
        api,
        supply,
        reporter,
    ));

    info!(
        "metadata refresher starting for {} (every {} minutes)",
        config.collection.contract, config.schedule.frequency_mins
    );

    // --------------------------------------------------------
    // Start metrics reporter (periodic, low-noise)
    // --------------------------------------------------------
    tokio::spawn(async {
        loop {
            sleep(Duration::from_secs(60)).await;

            info!(
                "[METRICS] runs={} ok={} timeout={} failed={} rejected={} req={} swept={} item_err={} retries={} recoveries={}",
                METRICS.runs_started.load(Ordering::Relaxed),
                METRICS.runs_completed.load(Ordering::Relaxed),
                METRICS.runs_timed_out.load(Ordering::Relaxed),
                METRICS.runs_failed.load(Ordering::Relaxed),
                METRICS.triggers_rejected.load(Ordering::Relaxed),
                METRICS.requests_sent.load(Ordering::Relaxed),
                METRICS.items_fetched.load(Ordering::Relaxed),
                METRICS.item_failures.load(Ordering::Relaxed),
                METRICS.retries_attempted.load(Ordering::Relaxed),
                METRICS.recovery_periods.load(Ordering::Relaxed),
            );
        }
    });

    // --------------------------------------------------------
    // Periodic trigger
    //
    // The first tick fires immediately, so startup kicks off a
    // refresh run without waiting out a full period.
    // --------------------------------------------------------
    tokio::spawn(scheduler::run_timer(
        refresher.clone(),
        config.schedule.every(),
    ));

    // --------------------------------------------------------
    // HTTP trigger endpoint
    //
    // Serves forever; everything else runs in background tasks.
    // --------------------------------------------------------
    server::serve(refresher, config.server.port).await
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// Reads a JSON configuration file from disk and deserializes
// it into the strongly typed `Config` structure.
//
fn load_config(path: &str) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let cfg =
        serde_json::from_str(&data).with_context(|| format!("failed to parse {path}"))?;
    Ok(cfg)
}
