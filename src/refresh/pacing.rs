use std::time::Duration;

use tokio::time::sleep;

/// Leaky-bucket pacer for outbound requests.
///
/// Counts requests with a 1-indexed sequence number and inserts a
/// fixed delay after every `bucket_size`-th one. The caller supplies
/// the delay per call, because the sweep and retry phases drain at
/// different rates while sharing one sequence: a bucket started during
/// the sweep keeps filling during retries.
///
/// `bucket_size` must be at least 1 (enforced at config validation).
#[derive(Debug)]
pub struct LeakyBucket {
    bucket_size: u64,
    sent: u64,
}

impl LeakyBucket {
    pub fn new(bucket_size: u64) -> Self {
        Self {
            bucket_size,
            sent: 0,
        }
    }

    /// Records one completed request. When that request closes a
    /// bucket, waits out `leak` before returning.
    ///
    /// Returns whether a delay was inserted.
    pub async fn pace(&mut self, leak: Duration) -> bool {
        self.sent += 1;
        if self.sent % self.bucket_size == 0 {
            sleep(leak).await;
            true
        } else {
            false
        }
    }

    /// Total requests recorded so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}
