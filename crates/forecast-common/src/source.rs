//! Identifiers for the upstream forecast sources.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The upstream forecast sources the pipeline refreshes.
///
/// `Global` is the coarse worldwide NWP feed (ECMWF open-data AIFS);
/// `Regional` is the high-resolution Nordic feed (MET Norway MEPS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceId {
    Global,
    Regional,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Regional => "regional",
        }
    }

    /// All sources, in the order the scheduler visits them.
    pub fn all() -> [SourceId; 2] {
        [Self::Global, Self::Regional]
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for SourceId {}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "regional" => Ok(Self::Regional),
            other => Err(format!("Unknown source: {}", other)),
        }
    }
}
