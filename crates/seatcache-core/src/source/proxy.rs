//! Proxy-script transport.
//!
//! The proxy accepts a JSON post `{action, range, data}` and answers with
//! `{success, data, error}`. Upstream scripts can be slow to wake up, so the
//! timeout is generous, and a read that times out is treated as an empty
//! sheet rather than a failure.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{rows_from_json, SourceError};
use crate::mapper;
use crate::models::{RawRow, Table};

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a [RawRow]>,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ProxyTransport {
    client: Client,
    url: String,
    timeout: Duration,
}

impl ProxyTransport {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, request: &ProxyRequest<'_>) -> Result<Value, SourceError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(SourceError::from_request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::from_status(status, &body));
        }

        let body: ProxyResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::InvalidResponse(format!("Malformed proxy response: {}", e))
            }
        })?;

        if !body.success {
            let message = body
                .error
                .unwrap_or_else(|| format!("proxy action '{}' failed", request.action));
            return Err(SourceError::Remote(message));
        }

        Ok(body.data)
    }

    /// Read a range and normalize it. A timeout yields no tables.
    pub async fn read(&self, range: &str) -> Result<Vec<Table>, SourceError> {
        let request = ProxyRequest {
            action: "read",
            range: Some(range),
            data: None,
        };

        match self.send(&request).await {
            Ok(data) => {
                let rows = rows_from_json(&data);
                debug!(range, rows = rows.len(), "Proxy read complete");
                Ok(mapper::from_rows(&rows))
            }
            Err(SourceError::Timeout) => {
                warn!(
                    range,
                    timeout_secs = self.timeout.as_secs_f32(),
                    "Proxy read timed out, treating as empty"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Write rows to a range. Unlike reads, a timeout is an error here.
    pub async fn write(&self, range: &str, rows: &[RawRow]) -> Result<usize, SourceError> {
        let request = ProxyRequest {
            action: "write",
            range: Some(range),
            data: Some(rows),
        };
        self.send(&request).await?;
        Ok(rows.len())
    }

    pub async fn ping(&self) -> Result<(), SourceError> {
        let request = ProxyRequest {
            action: "ping",
            range: None,
            data: None,
        };
        self.send(&request).await.map(|_| ())
    }
}
