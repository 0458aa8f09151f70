use crate::schema::Token;

/// Why a single refresh attempt failed.
///
/// The run loop treats every variant the same way (queue the token for
/// a retry, feed the failure breaker); the distinction exists for
/// logging.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status code
    #[error("unexpected status {0}")]
    Status(u16),
}

/// MetadataApi is the abstraction layer between:
/// - The generic refresh runtime
/// - The marketplace HTTP API
///
/// Each implementation must:
/// - Ask the marketplace to re-fetch one token's metadata
/// - Map transport and HTTP-level failures to `FetchError`
///
/// IMPORTANT:
/// - A call must never panic
/// - One call corresponds to exactly one outbound request; retries
///   are owned by the run loop, never by the client
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - Client instances are shared across tasks
///
#[async_trait::async_trait]
pub trait MetadataApi: Send + Sync {
    /// Forces a metadata re-fetch for one token.
    ///
    /// RETURNS:
    /// - `Ok(())` once the API confirmed the refresh
    /// - `Err(FetchError)` for anything else
    ///
    async fn refresh(&self, token: &Token) -> Result<(), FetchError>;
}
