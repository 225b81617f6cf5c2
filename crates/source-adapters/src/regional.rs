//! Adapter for the regional high-resolution feed (MEPS via a
//! THREDDS-style constrained endpoint).
//!
//! Both probe and retrieval hit the same dataset URL; what differs is the
//! constraint expression. The probe constrains to the single
//! `forecast_reference_time` scalar, so the provider answers from
//! metadata without touching the data volume. Retrieval constrains to the
//! projection axes plus the configured variable list.
//!
//! The provider publishes a run's metadata before all of its data has
//! landed, so a retrieved dataset can be structurally incomplete. The
//! adapter returns it as-is; readiness is the scheduler's call.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_common::{CanonicalDataset, RawDataset, RefreshError, RefreshResult, SourceId};
use forecast_store::SnapshotCache;
use normalizer::SourceMapping;
use tracing::{debug, info};

use crate::adapter::SourceAdapter;
use crate::payload::ProbeDocument;

/// Configuration for the regional adapter.
#[derive(Debug, Clone)]
pub struct RegionalConfig {
    /// Dataset URL (constraint expressions are appended as a query).
    pub url: String,
    /// Native variable names to request.
    pub variables: Vec<String>,
    /// Path of the snapshot cache.
    pub cache_path: PathBuf,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Coordinate fields every retrieval asks for alongside the variables.
const COORDINATE_FIELDS: [&str; 6] = [
    "x",
    "y",
    "time",
    "forecast_reference_time",
    "latitude",
    "longitude",
];

pub struct RegionalAdapter {
    config: RegionalConfig,
    client: reqwest::Client,
    mapping: SourceMapping,
    cache: SnapshotCache,
}

impl RegionalAdapter {
    pub fn new(config: RegionalConfig) -> RefreshResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RefreshError::Config(format!("HTTP client: {}", e)))?;

        let cache = SnapshotCache::new(SourceId::Regional, &config.cache_path);

        Ok(Self {
            config,
            client,
            mapping: SourceMapping::regional(),
            cache,
        })
    }

    /// Constraint expression for a full retrieval: projection axes,
    /// geographic coordinates, and the configured variables.
    fn retrieval_constraint(&self) -> String {
        let mut fields: Vec<&str> = COORDINATE_FIELDS.to_vec();
        fields.extend(self.config.variables.iter().map(String::as_str));
        fields.join(",")
    }

    fn unavailable(&self, message: String) -> RefreshError {
        RefreshError::SourceUnavailable {
            source: SourceId::Regional,
            message,
        }
    }

    fn retrieval_error(&self, message: String) -> RefreshError {
        RefreshError::Retrieval {
            source: SourceId::Regional,
            message,
        }
    }
}

#[async_trait]
impl SourceAdapter for RegionalAdapter {
    fn id(&self) -> SourceId {
        SourceId::Regional
    }

    fn mapping(&self) -> &SourceMapping {
        &self.mapping
    }

    async fn probe(&self) -> RefreshResult<DateTime<Utc>> {
        // Constrain to the reference-time scalar only; the provider
        // answers this from metadata.
        let url = format!("{}?forecast_reference_time", self.config.url);
        debug!(url = %url, "Probing regional issuance");

        let response = self
            .client
            .get(&url)
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
        let url = format!("{}?{}", self.config.url, self.retrieval_constraint());
        info!(url = %self.config.url, variables = self.config.variables.len(),
            "Retrieving regional dataset");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.retrieval_error(format!("retrieve request: {}", e)))?;

        if !response.status().is_success() {
            return Err(
                self.retrieval_error(format!("retrieve returned HTTP {}", response.status()))
            );
        }

        let dataset: RawDataset = response
            .json()
            .await
            .map_err(|e| self.retrieval_error(format!("retrieve decode: {}", e)))?;

        debug!(
            valid_times = dataset.valid_times.len(),
            variables = dataset.variables.len(),
            "Decoded regional dataset"
        );

        // A single constrained fetch covers all variables, so the run
        // arrives as one fragment.
        Ok(vec![dataset])
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
