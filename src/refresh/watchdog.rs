use std::time::Duration;

use log::warn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One-shot timer that cancels a run token when the run outlives its
/// allowed duration.
///
/// The run loop races the token at every suspension point, so a fired
/// watchdog abandons the run in place: an in-flight request may still
/// resolve upstream, its result is simply never observed.
///
/// GUARANTEES:
/// - Fires at most once
/// - Dropping the guard disarms it, so a run that completes normally
///   cannot be cancelled late, after the token has been handed to a
///   later run
pub struct RunWatchdog {
    timer: JoinHandle<()>,
}

impl RunWatchdog {
    pub fn arm(max_runtime: Duration, cancel: CancellationToken) -> Self {
        let timer = tokio::spawn(async move {
            tokio::time::sleep(max_runtime).await;
            warn!(
                "run exceeded its {}s budget, aborting",
                max_runtime.as_secs()
            );
            cancel.cancel();
        });

        Self { timer }
    }
}

impl Drop for RunWatchdog {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_the_budget_is_exhausted() {
        let token = CancellationToken::new();
        let _watchdog = RunWatchdog::arm(Duration::from_secs(5), token.clone());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!token.is_cancelled());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_guard_disarms_the_timer() {
        let token = CancellationToken::new();
        let watchdog = RunWatchdog::arm(Duration::from_secs(5), token.clone());

        drop(watchdog);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!token.is_cancelled());
    }
}
