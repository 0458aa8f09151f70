use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::time::{interval, MissedTickBehavior};

use crate::refresh::Refresher;

/// Triggers a refresh run on a fixed cadence.
///
/// The first tick fires immediately, so service startup kicks off a
/// run right away. A tick that lands while a run is still active is
/// silently coalesced by the single-flight guard, and ticks missed
/// while the process was stalled are skipped rather than bursted.
///
/// This future never resolves; spawn it.
pub async fn run_timer(refresher: Arc<Refresher>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        debug!("refresh timer tick");
        refresher.clone().spawn_run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::clients::metadata::{FetchError, MetadataApi};
    use crate::clients::supply::{RangeError, SupplySource};
    use crate::refresh::RefreshSettings;
    use crate::report::RunReporter;
    use crate::schema::{RunSummary, Token};

    struct PassApi;

    #[async_trait::async_trait]
    impl MetadataApi for PassApi {
        async fn refresh(&self, _token: &Token) -> Result<(), FetchError> {
            Ok(())
        }
    }

    struct FixedSupply(u64);

    #[async_trait::async_trait]
    impl SupplySource for FixedSupply {
        async fn last_token_id(&self) -> Result<u64, RangeError> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct CountingReporter {
        started: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RunReporter for CountingReporter {
        async fn run_started(&self) {
            self.started.fetch_add(1, Ordering::Relaxed);
        }

        async fn emit(&self, _summary: &RunSummary) {}
    }

    fn settings(bucket_size: u64, leak: Duration) -> RefreshSettings {
        RefreshSettings {
            contract: "0xabc".to_string(),
            first_token_id: 1,
            bucket_size,
            leak,
            retry_leak: leak,
            fail_limit: 5,
            recovery_period: 1,
            max_runtime: Duration::from_secs(86_400),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_immediately_then_on_cadence() {
        let reporter = Arc::new(CountingReporter::default());
        let refresher = Arc::new(Refresher::new(
            settings(10, Duration::from_millis(0)),
            Arc::new(PassApi),
            Arc::new(FixedSupply(0)),
            reporter.clone(),
        ));

        tokio::spawn(run_timer(refresher, Duration::from_secs(600)));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(reporter.started.load(Ordering::Relaxed), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(reporter.started.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_during_an_active_run_is_skipped() {
        let reporter = Arc::new(CountingReporter::default());
        // 9 tokens with a 100s delay after each: runs last 900s
        let refresher = Arc::new(Refresher::new(
            settings(1, Duration::from_secs(100)),
            Arc::new(PassApi),
            Arc::new(FixedSupply(9)),
            reporter.clone(),
        ));

        tokio::spawn(run_timer(refresher, Duration::from_secs(600)));

        // ticks at 0s (run), 600s (coalesced, run active until 900s)
        // and 1200s (run)
        tokio::time::sleep(Duration::from_secs(1_250)).await;
        assert_eq!(reporter.started.load(Ordering::Relaxed), 2);
    }
}
