//! Published-forecast storage.
//!
//! `ForecastStore` holds the most recent canonical dataset per source for
//! concurrent readers; `SnapshotCache` persists one dataset to disk so the
//! freshness baseline and the last published data survive restarts.

pub mod snapshot;
pub mod store;

pub use snapshot::SnapshotCache;
pub use store::ForecastStore;
