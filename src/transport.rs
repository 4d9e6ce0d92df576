use crate::error::{ClimateError, Result};
use crate::protocol::{self, CommandResponse, StatusResponse};
use crate::types::Celsius;
use async_trait::async_trait;
use std::time::Duration;

/// Default per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests a room unit understands
///
/// A response that parses is returned as `Ok` even when its `error` flag is
/// set; interpreting the flag is up to the caller.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// `GET {endpoint}/status?t={cache_bust}`
    async fn status(&self, endpoint: &str, cache_bust: i64) -> Result<StatusResponse>;

    /// `POST {endpoint}/power/{target}`
    async fn power(&self, endpoint: &str, target: Celsius) -> Result<CommandResponse>;

    /// `POST {endpoint}/temp/{target}`
    async fn temperature(&self, endpoint: &str, target: Celsius) -> Result<CommandResponse>;
}

/// HTTP transport backed by a pooled `reqwest` client
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post(&self, url: String) -> Result<CommandResponse> {
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(map_reqwest)?
            .json::<CommandResponse>()
            .await
            .map_err(map_reqwest)?;
        tracing::debug!("POST {} -> {:?}", url, response);
        Ok(response)
    }
}

#[async_trait]
impl RoomTransport for HttpTransport {
    async fn status(&self, endpoint: &str, cache_bust: i64) -> Result<StatusResponse> {
        let url = protocol::status_url(endpoint, cache_bust);
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest)?
            .json::<StatusResponse>()
            .await
            .map_err(map_reqwest)?;
        Ok(response)
    }

    async fn power(&self, endpoint: &str, target: Celsius) -> Result<CommandResponse> {
        self.post(protocol::power_url(endpoint, target)).await
    }

    async fn temperature(&self, endpoint: &str, target: Celsius) -> Result<CommandResponse> {
        self.post(protocol::temperature_url(endpoint, target)).await
    }
}

fn map_reqwest(e: reqwest::Error) -> ClimateError {
    if e.is_timeout() {
        ClimateError::Timeout
    } else {
        ClimateError::Http(e)
    }
}
