//! On-disk snapshot cache for one source's last published dataset.
//!
//! The snapshot serves two purposes: it seeds the store (and the freshness
//! cursor) after a restart, and its embedded `forecast_reference_time` is
//! the comparison baseline that decides whether a probed issuance is new.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use forecast_common::{CanonicalDataset, RefreshError, RefreshResult, SourceId};
use serde::Deserialize;
use tracing::{debug, warn};

/// JSON-encoded snapshot of a canonical dataset at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    source: SourceId,
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(source: SourceId, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached dataset, if a snapshot exists.
    ///
    /// A corrupt snapshot is treated as absent (logged); the next refresh
    /// rewrites it.
    pub fn load(&self) -> Option<CanonicalDataset> {
        if !self.path.exists() {
            return None;
        }
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(source = %self.source, path = %self.path.display(), error = %e,
                    "Failed to read snapshot cache");
                return None;
            }
        };
        match serde_json::from_slice::<CanonicalDataset>(&bytes) {
            Ok(dataset) => {
                debug!(
                    source = %self.source,
                    reference_time = %dataset.forecast_reference_time,
                    "Loaded snapshot cache"
                );
                Some(dataset)
            }
            Err(e) => {
                warn!(source = %self.source, path = %self.path.display(), error = %e,
                    "Snapshot cache is corrupt, ignoring");
                None
            }
        }
    }

    /// Embedded issuance of the cached dataset, used as the freshness
    /// baseline. Decodes only the reference-time field, not the grids.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        #[derive(Deserialize)]
        struct Header {
            forecast_reference_time: DateTime<Utc>,
        }

        if !self.path.exists() {
            return None;
        }
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(source = %self.source, path = %self.path.display(), error = %e,
                    "Failed to read snapshot cache");
                return None;
            }
        };
        match serde_json::from_slice::<Header>(&bytes) {
            Ok(header) => Some(header.forecast_reference_time),
            Err(e) => {
                warn!(source = %self.source, path = %self.path.display(), error = %e,
                    "Snapshot cache is corrupt, ignoring");
                None
            }
        }
    }

    /// Replace the snapshot atomically (write to a temp file, then rename).
    pub fn write(&self, dataset: &CanonicalDataset) -> RefreshResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.cache_error(e.to_string()))?;
        }

        let bytes =
            serde_json::to_vec(dataset).map_err(|e| self.cache_error(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        let mut file =
            fs::File::create(&tmp_path).map_err(|e| self.cache_error(e.to_string()))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| self.cache_error(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.cache_error(e.to_string()))?;

        debug!(
            source = %self.source,
            path = %self.path.display(),
            reference_time = %dataset.forecast_reference_time,
            "Wrote snapshot cache"
        );
        Ok(())
    }

    fn cache_error(&self, message: String) -> RefreshError {
        RefreshError::Cache {
            source: self.source,
            message,
        }
    }
}
