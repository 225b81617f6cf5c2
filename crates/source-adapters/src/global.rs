//! Adapter for the global NWP open-data feed (ECMWF AIFS).
//!
//! Probing asks the provider's metadata endpoint for the issuance of the
//! most recent run matching the configured parameter/stream/type/levtype/
//! model tuple; nothing is downloaded. Retrieval fetches the full
//! multi-parameter payload to a local artifact and decodes it into
//! parameter-group fragments for the grid merger (the provider keys some
//! parameters on a different lead-time resolution than others).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_common::{CanonicalDataset, RawDataset, RefreshError, RefreshResult, SourceId};
use forecast_store::SnapshotCache;
use normalizer::SourceMapping;
use tokio::fs;
use tracing::{debug, info};

use crate::adapter::SourceAdapter;
use crate::payload::{ProbeDocument, RetrievalDocument};

/// Configuration for the global adapter.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Provider base URL.
    pub endpoint: String,
    /// Model identifier (e.g. "aifs-single").
    pub model: String,
    /// Stream (e.g. "oper").
    pub stream: String,
    /// Product type (e.g. "fc").
    pub product_type: String,
    /// Level type (e.g. "sfc").
    pub levtype: String,
    /// GRIB shortnames to request.
    pub parameters: Vec<String>,
    /// Lead times (hours) to request.
    pub steps: Vec<u32>,
    /// Path the retrieval artifact is written to.
    pub target: PathBuf,
    /// Path of the snapshot cache (durability + freshness baseline).
    pub cache_path: PathBuf,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

pub struct GlobalAdapter {
    config: GlobalConfig,
    client: reqwest::Client,
    mapping: SourceMapping,
    cache: SnapshotCache,
}

impl GlobalAdapter {
    pub fn new(config: GlobalConfig) -> RefreshResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RefreshError::Config(format!("HTTP client: {}", e)))?;

        let cache = SnapshotCache::new(SourceId::Global, &config.cache_path);

        Ok(Self {
            config,
            client,
            mapping: SourceMapping::global(),
            cache,
        })
    }

    /// Query parameters identifying the configured product.
    fn product_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("model", self.config.model.clone()),
            ("stream", self.config.stream.clone()),
            ("type", self.config.product_type.clone()),
            ("levtype", self.config.levtype.clone()),
            ("param", self.config.parameters.join(",")),
        ]
    }

    /// Decode the retrieval artifact into parameter-group fragments.
    async fn load_raw(&self) -> RefreshResult<Vec<RawDataset>> {
        let bytes = fs::read(&self.config.target)
            .await
            .map_err(|e| self.retrieval_error(format!("read artifact: {}", e)))?;

        let document: RetrievalDocument = serde_json::from_slice(&bytes)
            .map_err(|e| self.retrieval_error(format!("decode artifact: {}", e)))?;

        debug!(
            fragments = document.fragments.len(),
            path = %self.config.target.display(),
            "Decoded retrieval artifact"
        );
        Ok(document.fragments)
    }

    fn unavailable(&self, message: String) -> RefreshError {
        RefreshError::SourceUnavailable {
            source: SourceId::Global,
            message,
        }
    }

    fn retrieval_error(&self, message: String) -> RefreshError {
        RefreshError::Retrieval {
            source: SourceId::Global,
            message,
        }
    }
}

#[async_trait]
impl SourceAdapter for GlobalAdapter {
    fn id(&self) -> SourceId {
        SourceId::Global
    }

    fn mapping(&self) -> &SourceMapping {
        &self.mapping
    }

    async fn probe(&self) -> RefreshResult<DateTime<Utc>> {
        let url = format!("{}/latest", self.config.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&self.product_query())
            .send()
            .await
            .map_err(|e| self.unavailable(format!("probe request: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.unavailable(format!("probe returned HTTP {}", response.status())));
        }

        let document: ProbeDocument = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("probe decode: {}", e)))?;

        document
            .forecast_reference_time
            .ok_or_else(|| self.unavailable("probe response missing issuance".to_string()))
    }

    async fn retrieve(&self) -> RefreshResult<Vec<RawDataset>> {
        let steps: Vec<String> = self.config.steps.iter().map(|s| s.to_string()).collect();
        let mut query = self.product_query();
        query.push(("step", steps.join(",")));

        let url = format!("{}/retrieve", self.config.endpoint);
        info!(url = %url, target = %self.config.target.display(), "Starting bulk retrieval");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| self.retrieval_error(format!("retrieve request: {}", e)))?;

        if !response.status().is_success() {
            return Err(
                self.retrieval_error(format!("retrieve returned HTTP {}", response.status()))
            );
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.retrieval_error(format!("retrieve body: {}", e)))?;

        // Write to a partial file, then rename, so a crash never leaves a
        // truncated artifact at the target path.
        if let Some(parent) = self.config.target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.retrieval_error(format!("create target dir: {}", e)))?;
        }
        let partial = self.config.target.with_extension("partial");
        fs::write(&partial, &body)
            .await
            .map_err(|e| self.retrieval_error(format!("write artifact: {}", e)))?;
        fs::rename(&partial, &self.config.target)
            .await
            .map_err(|e| self.retrieval_error(format!("finalize artifact: {}", e)))?;

        info!(bytes = body.len(), "Bulk retrieval complete");

        self.load_raw().await
    }

    async fn baseline(&self) -> Option<DateTime<Utc>> {
        self.cache.reference_time()
    }

    async fn restore(&self) -> Option<CanonicalDataset> {
        self.cache.load()
    }

    async fn persist(&self, dataset: &CanonicalDataset) -> RefreshResult<()> {
        self.cache.write(dataset)
    }
}
