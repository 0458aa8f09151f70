use log::debug;
use reqwest::header::{REFERER, USER_AGENT};

use crate::config::OpenSeaConfig;
use crate::schema::Token;

use super::metadata::{FetchError, MetadataApi};

/// OpenSea asset endpoint client
///
/// A GET on `{base_url}/{contract}/{token_id}/?force_update=true`
/// makes OpenSea re-read the token's metadata from its tokenURI and
/// replace the cached copy.
///
/// DESIGN:
/// - Pure protocol translation
/// - No pacing, no retries (owned by the run loop)
///
/// NOTE:
/// - The endpoint rejects requests without a browser User-Agent,
///   so one is pinned here alongside the API key.
pub struct OpenSeaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_5) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/50.0.2661.102 Safari/537.36";

impl OpenSeaClient {
    pub fn new(cfg: &OpenSeaConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    fn asset_url(&self, token: &Token) -> String {
        format!(
            "{}/{}/{}/?force_update=true",
            self.base_url, token.contract, token.id
        )
    }
}

#[async_trait::async_trait]
impl MetadataApi for OpenSeaClient {
    async fn refresh(&self, token: &Token) -> Result<(), FetchError> {
        let url = self.asset_url(token);
        debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .header(USER_AGENT, BROWSER_UA)
            .header(REFERER, &self.base_url)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> OpenSeaClient {
        OpenSeaClient::new(&OpenSeaConfig {
            base_url: base_url.to_string(),
            api_key: "k".to_string(),
            request_timeout_secs: 5,
        })
        .expect("client should build")
    }

    #[test]
    fn asset_url_includes_force_update() {
        let c = client("https://api.opensea.io/api/v1/asset");
        let token = Token {
            id: 42,
            contract: "0xabc".to_string(),
        };
        assert_eq!(
            c.asset_url(&token),
            "https://api.opensea.io/api/v1/asset/0xabc/42/?force_update=true"
        );
    }

    #[test]
    fn asset_url_tolerates_trailing_slash_in_base() {
        let c = client("https://api.opensea.io/api/v1/asset/");
        let token = Token {
            id: 1,
            contract: "0xabc".to_string(),
        };
        assert_eq!(
            c.asset_url(&token),
            "https://api.opensea.io/api/v1/asset/0xabc/1/?force_update=true"
        );
    }
}
