//! HTTP transport for dispatching batches
//!
//! A batch is POSTed as JSON to the collector endpoint. Any 2xx answer
//! counts as accepted; the body is not interpreted.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Url;

use crate::error::{Error, Result};
use crate::types::Batch;

const USER_AGENT: &str = concat!("o2mc-rust/", env!("CARGO_PKG_VERSION"));

/// HTTP client used by the tagger
#[derive(Debug, Clone)]
pub struct DispatchClient {
    http_client: reqwest::Client,
}

impl DispatchClient {
    /// Create a client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Send one batch to the endpoint
    pub async fn send_batch(&self, endpoint: &Url, batch: &Batch) -> Result<()> {
        let response = self
            .http_client
            .post(endpoint.clone())
            .json(batch)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Dispatch {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds() {
        assert!(DispatchClient::new(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_user_agent_names_sdk() {
        assert!(USER_AGENT.starts_with("o2mc-rust/"));
    }
}
