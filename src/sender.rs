//! Report delivery: a single HTTP POST, no retries.

use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::record::OutcomeRecord;

/// Default collection server.
pub const DEFAULT_ENDPOINT: &str = "https://metrics.hostreport.dev";

/// Default deadline for the POST.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one delivery attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// HTTP status, when the server answered at all.
    pub status: Option<u16>,
    /// Why the attempt failed, if it did.
    pub error: Option<String>,
}

impl DeliveryResult {
    /// Whether the server accepted the payload.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && matches!(self.status, Some(code) if (200..300).contains(&code))
    }

    fn failed(status: Option<u16>, error: String) -> Self {
        Self {
            status,
            error: Some(error),
        }
    }
}

impl std::fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.status, &self.error) {
            (Some(code), None) => write!(f, "delivered (HTTP {})", code),
            (Some(code), Some(err)) => write!(f, "rejected (HTTP {}): {}", code, err),
            (None, Some(err)) => write!(f, "not delivered: {}", err),
            (None, None) => write!(f, "not delivered"),
        }
    }
}

/// Build the collection URL for one distribution release:
/// `<base>/<distro>/desktop/<version>`.
pub fn report_url(base: &str, distro: &str, version: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}/desktop/{}",
        base.trim_end_matches('/'),
        distro,
        version
    );
    Url::parse(&joined).map_err(|e| Error::ConfigError(format!("Invalid URL {}: {}", joined, e)))
}

/// Posts outcome records to the collection server.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSender {
    /// Sender whose requests are abandoned after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hostreport/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Configured request deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST the canonical JSON of `record` to `endpoint` exactly once.
    pub async fn send(&self, endpoint: &Url, record: &OutcomeRecord) -> DeliveryResult {
        let body = match record.to_json() {
            Ok(body) => body,
            Err(e) => return DeliveryResult::failed(None, e.to_string()),
        };

        debug!("Posting {} bytes to {}", body.len(), endpoint);
        let response = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                let status = response.status().as_u16();
                info!("Server accepted {} (HTTP {})", record.kind(), status);
                DeliveryResult {
                    status: Some(status),
                    error: None,
                }
            }
            Ok(response) => {
                let status = response.status();
                info!("Server rejected {}: {}", record.kind(), status);
                DeliveryResult::failed(Some(status.as_u16()), format!("server answered {}", status))
            }
            Err(e) if e.is_timeout() => {
                info!("Sending {} timed out after {:?}", record.kind(), self.timeout);
                DeliveryResult::failed(None, format!("timed out after {:?}", self.timeout))
            }
            Err(e) => {
                info!("Sending {} failed: {}", record.kind(), e);
                DeliveryResult::failed(None, e.to_string())
            }
        }
    }
}
