//! Direct transport against the spreadsheet values API.
//!
//! Requests carry either an API key (`?key=`) or a bearer access token.
//! Rate-limited responses are retried with exponential backoff.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{rows_from_json, Credentials, SourceError};
use crate::mapper;
use crate::models::{RawRow, Table};

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendBody<'a> {
    major_dimension: &'static str,
    values: &'a [RawRow],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    properties: Option<SpreadsheetProperties>,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: Option<SheetProperties>,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: Option<String>,
}

/// Spreadsheet title and tab names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetMetadata {
    pub title: Option<String>,
    pub sheets: Vec<String>,
}

#[derive(Clone)]
pub struct DirectTransport {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    credentials: Credentials,
    initial_backoff: Duration,
}

impl DirectTransport {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Build `{base}/v4/spreadsheets/{id}/{segments...}` with each segment
    /// percent-encoded (ranges contain `!` and spaces).
    fn url(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            SourceError::Initialization(format!("Invalid API base URL {}: {}", self.base_url, e))
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                SourceError::Initialization(format!(
                    "API base URL cannot be a base: {}",
                    self.base_url
                ))
            })?;
            path.pop_if_empty()
                .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
                .extend(segments);
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::ApiKey(key) => request.query(&[("key", key.as_str())]),
            Credentials::AccessToken(token) => request.bearer_auth(token),
        }
    }

    /// Send a request, retrying 429 responses with exponential backoff.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, SourceError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self
                .authorize(build())
                .send()
                .await
                .map_err(SourceError::from_request)?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(SourceError::RateLimited);
                }
                warn!(
                    retry = retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::from_status(status, &body));
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, SourceError> {
        response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::InvalidResponse(format!("Malformed API response: {}", e))
            }
        })
    }

    /// Read a range and normalize it. An empty range is an empty table set.
    pub async fn read(&self, range: &str) -> Result<Vec<Table>, SourceError> {
        let url = self.url(&["values", range])?;
        let response = self.send(|| self.client.get(url.clone())).await?;
        let body: ValueRange = Self::parse(response).await?;

        let rows = rows_from_json(&body.values);
        debug!(range, rows = rows.len(), "Direct read complete");
        Ok(mapper::from_rows(&rows))
    }

    /// Append rows after the last populated row of the range.
    pub async fn append(&self, range: &str, rows: &[RawRow]) -> Result<usize, SourceError> {
        let segment = format!("{}:append", range);
        let url = self.url(&["values", segment.as_str()])?;
        let body = AppendBody {
            major_dimension: "ROWS",
            values: rows,
        };

        let response = self
            .send(|| {
                self.client
                    .post(url.clone())
                    .query(&[
                        ("valueInputOption", "USER_ENTERED"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ])
                    .json(&body)
            })
            .await?;

        let result: AppendResponse = match Self::parse(response).await {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "Unreadable append response, assuming all rows written");
                AppendResponse::default()
            }
        };
        Ok(result
            .updates
            .and_then(|u| u.updated_rows)
            .unwrap_or(rows.len()))
    }

    pub async fn metadata(&self) -> Result<SpreadsheetMetadata, SourceError> {
        let url = self.url(&[])?;
        let response = self
            .send(|| {
                self.client
                    .get(url.clone())
                    .query(&[("fields", "properties.title,sheets.properties.title")])
            })
            .await?;
        let body: SpreadsheetResponse = Self::parse(response).await?;

        Ok(SpreadsheetMetadata {
            title: body.properties.and_then(|p| p.title),
            sheets: body
                .sheets
                .into_iter()
                .filter_map(|s| s.properties.and_then(|p| p.title))
                .collect(),
        })
    }
}
