//! Normalization of raw source datasets into the canonical schema.
//!
//! Two stages: the grid merger reconciles parameter-group fragments from a
//! single retrieval into one raw dataset with a single lead-time axis, and
//! the schema normalizer maps source-native names and units onto the
//! canonical shape (renames, Kelvin to Celsius, fraction to percent, wind
//! component derivation, relative step coordinate).

pub mod mapping;
pub mod merge;
pub mod normalize;
pub mod units;
pub mod wind;

pub use mapping::{SourceMapping, WindRepresentation};
pub use merge::merge_fragments;
pub use normalize::normalize;
