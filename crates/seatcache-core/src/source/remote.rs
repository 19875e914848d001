//! Uniform read/write contract over the proxy and direct transports.
//!
//! Precedence: the proxy is preferred whenever it returns data. The direct
//! transport answers when the proxy is unconfigured, returns nothing, or
//! fails at the transport level. Writes go the other way round: direct
//! first, proxy as fallback.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{
    ConnectionReport, CredentialStore, Credentials, DirectTransport, ProxyTransport, SourceError,
    SpreadsheetMetadata, TableSource, Transport, TransportCheck, WriteOutcome,
};
use crate::config::SourceConfig;
use crate::mapper;
use crate::models::Table;

type CredentialResolver = Arc<dyn Fn() -> Option<Credentials> + Send + Sync>;

pub struct RemoteDataSource {
    config: SourceConfig,
    client: Client,
    proxy: Option<ProxyTransport>,
    /// Built on first use; credentials may not exist yet at construction.
    direct: OnceCell<DirectTransport>,
    resolve_credentials: CredentialResolver,
}

impl RemoteDataSource {
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let proxy = config
            .proxy_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| ProxyTransport::new(client.clone(), url, config.proxy_timeout()));

        Ok(Self {
            config,
            client,
            proxy,
            direct: OnceCell::new(),
            resolve_credentials: Arc::new(CredentialStore::resolve),
        })
    }

    /// Replace the credential lookup (environment + keychain by default).
    pub fn with_credentials(
        mut self,
        resolver: impl Fn() -> Option<Credentials> + Send + Sync + 'static,
    ) -> Self {
        self.resolve_credentials = Arc::new(resolver);
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn direct_configured(&self) -> bool {
        self.config
            .spreadsheet_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false)
    }

    /// Initialize the direct transport, or explain why it is unavailable.
    /// Failures are not memoized so later calls can pick up new credentials.
    async fn direct(&self) -> Result<&DirectTransport, SourceError> {
        self.direct
            .get_or_try_init(|| async {
                let spreadsheet_id = self
                    .config
                    .spreadsheet_id
                    .clone()
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        SourceError::Initialization("no spreadsheet id configured".to_string())
                    })?;

                let credentials = (self.resolve_credentials)().ok_or_else(|| {
                    SourceError::Initialization("no API key or access token available".to_string())
                })?;

                info!(kind = credentials.kind(), "Direct transport initialized");
                Ok(DirectTransport::new(
                    self.client.clone(),
                    self.config.direct_base_url.clone(),
                    spreadsheet_id,
                    credentials,
                ))
            })
            .await
    }

    pub async fn read_via_proxy(&self, range: &str) -> Result<Vec<Table>, SourceError> {
        let proxy = self.proxy.as_ref().ok_or(SourceError::NotConfigured)?;
        proxy.read(range).await
    }

    pub async fn read_via_direct(&self, range: &str) -> Result<Vec<Table>, SourceError> {
        self.direct().await?.read(range).await
    }

    /// Read a range using the transport precedence described above.
    pub async fn read(&self, range: &str) -> Result<Vec<Table>, SourceError> {
        let proxy_result = match self.proxy {
            Some(_) => match self.read_via_proxy(range).await {
                Ok(tables) if !tables.is_empty() => return Ok(tables),
                Err(e) if !e.is_transport() => return Err(e),
                other => Some(other),
            },
            None => None,
        };

        match self.read_via_direct(range).await {
            Ok(tables) => {
                debug!(range, tables = tables.len(), "Read served by direct transport");
                Ok(tables)
            }
            Err(direct_err) => match proxy_result {
                Some(Ok(tables)) if matches!(direct_err, SourceError::Initialization(_)) => {
                    Ok(tables)
                }
                Some(Err(proxy_err)) if matches!(direct_err, SourceError::Initialization(_)) => {
                    Err(proxy_err)
                }
                Some(Ok(_)) | Some(Err(_)) => {
                    warn!(
                        range,
                        error = %direct_err,
                        "Direct read failed after proxy returned nothing"
                    );
                    Err(direct_err)
                }
                None => Err(direct_err),
            },
        }
    }

    pub async fn write(&self, table: &Table) -> Result<WriteOutcome, SourceError> {
        self.batch_write(std::slice::from_ref(table)).await
    }

    /// Validate, flatten and write tables. Invalid input never reaches the
    /// network.
    pub async fn batch_write(&self, tables: &[Table]) -> Result<WriteOutcome, SourceError> {
        let report = mapper::validate(tables);
        if !report.valid {
            warn!(errors = report.errors.len(), "Rejecting write that failed validation");
            return Err(SourceError::Validation(report));
        }
        for warning in &report.warnings {
            debug!(warning = %warning, "Validation warning");
        }

        let rows = mapper::to_rows(tables);
        let range = self.config.default_range.as_str();

        let direct_err = match self.direct().await {
            Ok(direct) => match direct.append(range, &rows).await {
                Ok(written) => {
                    info!(rows = written, transport = %Transport::Direct, "Rows written");
                    return Ok(WriteOutcome {
                        transport: Transport::Direct,
                        rows: written,
                    });
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        let proxy = match &self.proxy {
            Some(proxy) if direct_err.allows_fallback() => proxy,
            _ => return Err(direct_err),
        };

        warn!(error = %direct_err, "Direct write unavailable, falling back to proxy");
        let written = proxy.write(range, &rows).await?;
        info!(rows = written, transport = %Transport::Proxy, "Rows written");
        Ok(WriteOutcome {
            transport: Transport::Proxy,
            rows: written,
        })
    }

    pub async fn metadata(&self) -> Result<SpreadsheetMetadata, SourceError> {
        self.direct().await?.metadata().await
    }

    async fn check_proxy(&self) -> Option<TransportCheck> {
        let proxy = self.proxy.as_ref()?;
        let started = Instant::now();
        let result = proxy.ping().await;
        Some(check_result(started, result))
    }

    async fn check_direct(&self) -> Option<TransportCheck> {
        if !self.direct_configured() {
            return None;
        }
        let started = Instant::now();
        let result = match self.direct().await {
            Ok(direct) => direct.metadata().await.map(|_| ()),
            Err(e) => Err(e),
        };
        Some(check_result(started, result))
    }

    /// Check every configured transport concurrently.
    pub async fn test_connection(&self) -> ConnectionReport {
        let (proxy, direct) = futures::join!(self.check_proxy(), self.check_direct());

        let success = [&proxy, &direct]
            .iter()
            .any(|check| check.as_ref().map(|p| p.ok).unwrap_or(false));

        let error = if success {
            None
        } else if proxy.is_none() && direct.is_none() {
            Some(SourceError::NotConfigured.to_string())
        } else {
            [&proxy, &direct]
                .iter()
                .filter_map(|check| check.as_ref().and_then(|p| p.error.clone()))
                .next()
        };

        ConnectionReport {
            success,
            proxy,
            direct,
            error,
        }
    }
}

fn check_result(started: Instant, result: Result<(), SourceError>) -> TransportCheck {
    let latency_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(()) => TransportCheck {
            ok: true,
            latency_ms,
            error: None,
        },
        Err(e) => TransportCheck {
            ok: false,
            latency_ms,
            error: Some(e.to_string()),
        },
    }
}

#[async_trait]
impl TableSource for RemoteDataSource {
    fn identity(&self) -> String {
        self.config.identity()
    }

    async fn fetch_tables(&self, range: &str) -> Result<Vec<Table>, SourceError> {
        self.read(range).await
    }

    async fn write_tables(&self, tables: &[Table]) -> Result<WriteOutcome, SourceError> {
        self.batch_write(tables).await
    }

    async fn check_connection(&self) -> ConnectionReport {
        self.test_connection().await
    }
}
