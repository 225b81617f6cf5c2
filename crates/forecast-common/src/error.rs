//! Error taxonomy for the refresh pipeline.
//!
//! Every per-source failure is one of these kinds; the scheduler inspects
//! the kind to decide between retaining the previous dataset quietly
//! (`NotReadyYet`, `SourceUnavailable`) and logging a real fault.

use thiserror::Error;

use crate::source::SourceId;

/// Result type alias using RefreshError.
pub type RefreshResult<T> = Result<T, RefreshError>;

/// Errors that can occur while refreshing a single source.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Freshness probe failed (network/remote error). Recoverable; the
    /// previous dataset stays published.
    #[error("Source {source} unavailable: {message}")]
    SourceUnavailable { source: SourceId, message: String },

    /// Bulk fetch failed after a successful probe.
    #[error("Retrieval from {source} failed: {message}")]
    Retrieval { source: SourceId, message: String },

    /// Dataset retrieved but required coordinates are missing. Expected
    /// while the upstream publication is still in progress; not an error
    /// surfaced to the user.
    #[error("Source {source} not ready yet: missing {missing}")]
    NotReadyYet { source: SourceId, missing: String },

    /// Normalization found missing or incompatible variables.
    #[error("Schema mismatch for {source}: {message}")]
    SchemaMismatch { source: SourceId, message: String },

    /// Grid merger found irreconcilable coordinate spaces.
    #[error("Merge conflict for {source}: {message}")]
    MergeConflict { source: SourceId, message: String },

    /// Snapshot cache read/write failed.
    #[error("Cache error for {source}: {message}")]
    Cache { source: SourceId, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RefreshError {
    /// The source this error belongs to, if it is source-scoped.
    pub fn source_id(&self) -> Option<SourceId> {
        match self {
            Self::SourceUnavailable { source, .. }
            | Self::Retrieval { source, .. }
            | Self::NotReadyYet { source, .. }
            | Self::SchemaMismatch { source, .. }
            | Self::MergeConflict { source, .. }
            | Self::Cache { source, .. } => Some(*source),
            Self::Config(_) => None,
        }
    }

    /// Short machine-readable kind, used in status reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::Retrieval { .. } => "retrieval_error",
            Self::NotReadyYet { .. } => "not_ready_yet",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::MergeConflict { .. } => "merge_conflict",
            Self::Cache { .. } => "cache_error",
            Self::Config(_) => "config_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_source() {
        let err = RefreshError::NotReadyYet {
            source: SourceId::Regional,
            missing: "latitude".to_string(),
        };
        assert_eq!(err.kind(), "not_ready_yet");
        assert_eq!(err.source_id(), Some(SourceId::Regional));
        assert_eq!(RefreshError::Config("x".into()).source_id(), None);
    }
}
