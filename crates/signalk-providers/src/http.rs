//! JSON over HTTP for provider adapters.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
pub use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use signalk_plugins::CalcError;

/// Fetches a JSON document. Adapters only talk to providers through this.
pub trait Fetcher: Send + Sync + 'static {
    fn get_json(&self, url: Url) -> BoxFuture<'static, Result<Value, CalcError>>;
}

/// [`Fetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Result<Self, CalcError> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| CalcError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    fn get_json(&self, url: Url) -> BoxFuture<'static, Result<Value, CalcError>> {
        let client = self.client.clone();
        async move {
            debug!("GET {}", url);
            let resp = client
                .get(url)
                .send()
                .await
                .map_err(|e| CalcError::Transport(e.to_string()))?;

            // Providers report errors in the body, often with a non-2xx status.
            resp.json::<Value>()
                .await
                .map_err(|e| CalcError::Transport(format!("failed to parse response: {}", e)))
        }
        .boxed()
    }
}

/// Build a URL from a base and query pairs.
pub fn url_with_params(base: &str, params: &[(&str, String)]) -> Result<Url, CalcError> {
    Url::parse_with_params(base, params).map_err(|e| CalcError::InvalidInput(e.to_string()))
}
