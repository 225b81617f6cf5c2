//! The adapter seam between the scheduler and the upstream providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forecast_common::{CanonicalDataset, RawDataset, RefreshResult, SourceId};
use normalizer::SourceMapping;

/// One upstream forecast source.
///
/// `probe` must be a metadata-only query: cheap, no payload transfer, and
/// never a precondition for keeping previously published data. `retrieve`
/// returns the run's raw data as one or more parameter-group fragments;
/// the scheduler merges and normalizes them.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> SourceId;

    /// Schema mapping applied to this source's raw datasets.
    fn mapping(&self) -> &SourceMapping;

    /// Latest issuance available upstream. Fails with `SourceUnavailable`.
    async fn probe(&self) -> RefreshResult<DateTime<Utc>>;

    /// Retrieve the full dataset for the latest run. Fails with
    /// `Retrieval`.
    async fn retrieve(&self) -> RefreshResult<Vec<RawDataset>>;

    /// Freshness baseline derived from a local cache artifact, if one
    /// exists. `None` means the epoch sentinel applies and the first
    /// probe forces a download.
    async fn baseline(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Previously published dataset recovered from the local cache, used
    /// to seed the store at startup.
    async fn restore(&self) -> Option<CanonicalDataset> {
        None
    }

    /// Persist a successfully published dataset to the local cache.
    /// Failures are non-fatal; the scheduler logs and moves on.
    async fn persist(&self, _dataset: &CanonicalDataset) -> RefreshResult<()> {
        Ok(())
    }
}
