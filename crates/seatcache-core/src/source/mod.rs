//! Remote spreadsheet access.
//!
//! This module provides `RemoteDataSource`, which reads and writes seating
//! rows through two interchangeable transports:
//!
//! - a proxy script that accepts `{action, range, data}` posts
//! - the spreadsheet's native values API, authenticated with an API key or
//!   access token resolved lazily on first use
//!
//! Callers depend on the `TableSource` trait so the cache can be exercised
//! without a network.

pub mod credentials;
pub mod direct;
pub mod error;
pub mod proxy;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Cell, RawRow, Table};

pub use credentials::{CredentialStore, Credentials};
pub use direct::{DirectTransport, SpreadsheetMetadata};
pub use error::SourceError;
pub use proxy::ProxyTransport;
pub use remote::RemoteDataSource;

/// Which transport served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Proxy,
    Direct,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Proxy => write!(f, "proxy"),
            Transport::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub transport: Transport,
    pub rows: usize,
}

/// Result of probing one transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportCheck {
    pub ok: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<TransportCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct: Option<TransportCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A backend that yields normalized tables.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Stable backend name; part of every cache key.
    fn identity(&self) -> String;

    async fn fetch_tables(&self, range: &str) -> Result<Vec<Table>, SourceError>;

    async fn write_tables(&self, tables: &[Table]) -> Result<WriteOutcome, SourceError>;

    async fn check_connection(&self) -> ConnectionReport;
}

/// Convert a JSON array-of-arrays into raw rows.
///
/// Non-array rows are dropped; nested objects become their JSON text so the
/// mapper can decide what to do with them.
pub fn rows_from_json(value: &Value) -> Vec<RawRow> {
    let Some(rows) = value.as_array() else {
        return Vec::new();
    };

    rows.iter()
        .filter_map(|row| row.as_array())
        .map(|row| row.iter().map(cell_from_json).collect())
        .collect()
}

fn cell_from_json(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Null),
        Value::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_from_json() {
        let value = json!([
            ["RoomA", "T1", "1", 1, "Alice", "USA", 2000, true],
            "not a row",
            ["RoomA", null, {"x": 1}]
        ]);
        let rows = rows_from_json(&value);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][3], Cell::Number(1.0));
        assert_eq!(rows[0][7], Cell::Bool(true));
        assert_eq!(rows[1][1], Cell::Null);
        assert_eq!(rows[1][2], Cell::Text(r#"{"x":1}"#.to_string()));
    }

    #[test]
    fn test_rows_from_json_non_array() {
        assert!(rows_from_json(&json!({"values": []})).is_empty());
        assert!(rows_from_json(&Value::Null).is_empty());
    }

    #[test]
    fn test_connection_report_serialization() {
        let report = ConnectionReport {
            success: true,
            proxy: Some(TransportCheck { ok: true, latency_ms: 12, error: None }),
            direct: None,
            error: None,
        };
        let value = serde_json::to_value(&report).expect("serialize report");
        assert_eq!(value, json!({"success": true, "proxy": {"ok": true, "latency_ms": 12}}));
    }
}
