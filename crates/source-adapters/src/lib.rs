//! Source adapters for the upstream forecast providers.
//!
//! Each adapter knows how to probe its provider for the latest issuance
//! without transferring the payload, and how to retrieve a full dataset
//! once the probe says a newer run exists. The scheduler drives both
//! through the `SourceAdapter` trait.

pub mod adapter;
pub mod global;
pub mod payload;
pub mod regional;

pub use adapter::SourceAdapter;
pub use global::{GlobalAdapter, GlobalConfig};
pub use regional::{RegionalAdapter, RegionalConfig};
