//! Latest-dataset-per-source store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use forecast_common::{CanonicalDataset, SourceId};
use tracing::info;

/// Holds the most recent canonical dataset per source.
///
/// Datasets are stored behind `Arc` and replaced wholesale, so a reader
/// always observes either the previous dataset or the fully-built new one,
/// never a partial update. The lock is only held for the pointer swap;
/// no I/O ever happens under it. Readers may live on any thread (the
/// rendering layer reads from its own callback context).
#[derive(Debug, Default)]
pub struct ForecastStore {
    entries: RwLock<HashMap<SourceId, Arc<CanonicalDataset>>>,
}

impl ForecastStore {
    /// Create an empty store. Entries appear on first successful refresh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the entry for a source.
    pub fn update(&self, source: SourceId, dataset: Arc<CanonicalDataset>) {
        let reference_time = dataset.forecast_reference_time;
        let mut entries = self.entries.write().expect("store lock poisoned");
        entries.insert(source, dataset);
        drop(entries);
        info!(source = %source, reference_time = %reference_time, "Published dataset");
    }

    /// Current snapshot for one source, if a refresh has succeeded yet.
    pub fn get(&self, source: SourceId) -> Option<Arc<CanonicalDataset>> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .get(&source)
            .cloned()
    }

    /// Snapshot of all published datasets, keyed by source.
    pub fn snapshot(&self) -> HashMap<SourceId, Arc<CanonicalDataset>> {
        self.entries.read().expect("store lock poisoned").clone()
    }

    /// Issuance of the published dataset for a source, if any.
    pub fn reference_time(&self, source: SourceId) -> Option<chrono::DateTime<chrono::Utc>> {
        self.get(source).map(|ds| ds.forecast_reference_time)
    }
}
