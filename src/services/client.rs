//! HTTP client service
//!
//! Upstream invoker: sends fully built wire requests and hands back the open
//! response without reading its body

use crate::config::settings::UpstreamConfig;
use crate::utils::error::{RelayError, RelayResult};
use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// Upstream HTTP client
///
/// Two pools: one with the short request timeout, one with the long
/// streaming timeout.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    stream_client: Client,
}

impl UpstreamClient {
    /// Create a client from upstream settings
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Self::with_timeouts(config.timeout, config.stream_timeout)
    }

    /// Create a client with custom timeouts
    pub fn with_timeouts(timeout_secs: u64, stream_timeout_secs: u64) -> Result<Self> {
        let user_agent = format!("relaygate/{}", env!("CARGO_PKG_VERSION"));

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        let stream_client = Client::builder()
            .timeout(Duration::from_secs(stream_timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to create streaming HTTP client")?;

        Ok(Self { client, stream_client })
    }

    /// POST a body and return the open response
    ///
    /// Transport failures come back as `RelayError::Transport`; HTTP error
    /// statuses are left for the response translator.
    pub async fn post(&self, url: &str, headers: HeaderMap, body: Vec<u8>, stream: bool) -> RelayResult<Response> {
        let client = if stream { &self.stream_client } else { &self.client };

        debug!("Sending upstream request to {} (stream: {})", url, stream);

        let response = client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(RelayError::Transport)?;

        debug!("Upstream responded with status {}", response.status());
        Ok(response)
    }
}
