//! Common types shared across the forecast refresh pipeline.

pub mod dataset;
pub mod error;
pub mod source;
pub mod time;

pub use dataset::{CanonicalDataset, Field, GridCoords, RawDataset};
pub use error::{RefreshError, RefreshResult};
pub use source::SourceId;
pub use time::{epoch_sentinel, step_hours};
