//! Wire payload documents shared by the adapters.

use chrono::{DateTime, Utc};
use forecast_common::RawDataset;
use serde::Deserialize;

/// Response of a metadata-only freshness probe.
#[derive(Debug, Deserialize)]
pub struct ProbeDocument {
    pub forecast_reference_time: Option<DateTime<Utc>>,
}

/// Body of a bulk retrieval: one fragment per parameter group.
#[derive(Debug, Deserialize)]
pub struct RetrievalDocument {
    pub fragments: Vec<RawDataset>,
}
