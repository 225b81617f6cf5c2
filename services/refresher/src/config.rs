//! Configuration loading for the refresh service.
//!
//! One YAML file describes the scheduler cadence and both sources.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use source_adapters::{GlobalConfig, RegionalConfig};
use tracing::info;

/// Root configuration loaded from the service YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct RefresherConfig {
    /// Minutes between refresh ticks.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: u64,
    /// Ceiling on a single probe or retrieval, in seconds. Must stay
    /// below the refresh interval.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
    pub global: GlobalSourceConfig,
    pub regional: RegionalSourceConfig,
}

fn default_refresh_interval() -> u64 {
    10
}

fn default_operation_timeout() -> u64 {
    300
}

/// Global source section.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalSourceConfig {
    pub endpoint: String,
    pub model: String,
    pub stream: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub levtype: String,
    pub parameters: Vec<String>,
    pub steps: StepRange,
    pub target: PathBuf,
    pub cache_path: PathBuf,
}

/// Lead-time range, expanded to an explicit hour list.
#[derive(Debug, Clone, Deserialize)]
pub struct StepRange {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl StepRange {
    pub fn hours(&self) -> Vec<u32> {
        (self.start..=self.end).step_by(self.step as usize).collect()
    }
}

/// Regional source section.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionalSourceConfig {
    pub url: String,
    pub variables: Vec<String>,
    pub cache_path: PathBuf,
}

impl RefresherConfig {
    /// Load the configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: RefresherConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        info!(
            path = %path.display(),
            interval_minutes = config.refresh_interval_minutes,
            "Loaded refresher configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let interval_secs = self.refresh_interval_minutes * 60;
        if self.operation_timeout_secs >= interval_secs {
            anyhow::bail!(
                "operation_timeout_secs ({}) must be shorter than the refresh interval ({}s)",
                self.operation_timeout_secs,
                interval_secs
            );
        }
        if self.global.steps.step == 0 {
            anyhow::bail!("global.steps.step must be non-zero");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes * 60)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Adapter configuration for the global source.
    pub fn global_config(&self) -> GlobalConfig {
        GlobalConfig {
            endpoint: self.global.endpoint.clone(),
            model: self.global.model.clone(),
            stream: self.global.stream.clone(),
            product_type: self.global.product_type.clone(),
            levtype: self.global.levtype.clone(),
            parameters: self.global.parameters.clone(),
            steps: self.global.steps.hours(),
            target: self.global.target.clone(),
            cache_path: self.global.cache_path.clone(),
            request_timeout: self.operation_timeout(),
        }
    }

    /// Adapter configuration for the regional source.
    pub fn regional_config(&self) -> RegionalConfig {
        RegionalConfig {
            url: self.regional.url.clone(),
            variables: self.regional.variables.clone(),
            cache_path: self.regional.cache_path.clone(),
            request_timeout: self.operation_timeout(),
        }
    }
}
