//! Engine configuration
//!
//! Loaded from TOML; every field is optional and falls back to its default.
//!
//! ```toml
//! confidence_threshold = 0.5
//! parallel_processing = false
//!
//! [cache]
//! ttl_secs = 600
//!
//! [analyses]
//! performance = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::AnalysisFamily;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// TTL for generated insight sets
    pub ttl_secs: u64,
    /// TTL for cached business contexts
    pub context_ttl_secs: u64,
    /// Entries per organization before oldest-first eviction
    pub max_entries: usize,
    /// Interval of the expired-entry sweep
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 30 * 60,
            context_ttl_secs: 60 * 60,
            max_entries: 100,
            sweep_interval_secs: 15 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn context_ttl(&self) -> Duration {
        Duration::from_secs(self.context_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Per-family enable flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisToggles {
    pub trends: bool,
    pub anomalies: bool,
    pub performance: bool,
    pub recommendations: bool,
}

impl Default for AnalysisToggles {
    fn default() -> Self {
        Self {
            trends: true,
            anomalies: true,
            performance: true,
            recommendations: true,
        }
    }
}

impl AnalysisToggles {
    pub fn is_enabled(&self, family: AnalysisFamily) -> bool {
        match family {
            AnalysisFamily::Trends => self.trends,
            AnalysisFamily::Anomalies => self.anomalies,
            AnalysisFamily::Performance => self.performance,
            AnalysisFamily::Recommendations => self.recommendations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Daily points a series needs before any family analyzes it
    pub min_sample_count: usize,
    /// Default minimum insight confidence (0.0-1.0)
    pub confidence_threshold: f64,
    /// p-value cutoff for channel gaps and correlations
    pub significance_level: f64,
    /// Data quality score below which a request fails
    pub min_data_quality: f64,
    /// Run analysis families concurrently
    pub parallel_processing: bool,
    /// Default analysis window
    pub window_days: u32,
    /// How long finished jobs stay pollable
    pub job_retention_secs: u64,
    pub max_anomalies_per_metric: usize,
    pub cache: CacheConfig,
    pub analyses: AnalysisToggles,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_sample_count: 7,
            confidence_threshold: 0.6,
            significance_level: 0.05,
            min_data_quality: 0.3,
            parallel_processing: true,
            window_days: 90,
            job_retention_secs: 300,
            max_anomalies_per_metric: 5,
            cache: CacheConfig::default(),
            analyses: AnalysisToggles::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::ConfigRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, CoreError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |message: String| Err(CoreError::InvalidConfig { message });

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return invalid(format!(
                "confidence_threshold must be within 0..=1, got {}",
                self.confidence_threshold
            ));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return invalid(format!(
                "significance_level must be within (0, 1), got {}",
                self.significance_level
            ));
        }
        if !(0.0..=1.0).contains(&self.min_data_quality) {
            return invalid(format!(
                "min_data_quality must be within 0..=1, got {}",
                self.min_data_quality
            ));
        }
        if self.min_sample_count < 2 {
            return invalid("min_sample_count must be at least 2".to_string());
        }
        if self.window_days == 0 {
            return invalid("window_days must be positive".to_string());
        }
        if self.cache.max_entries == 0 {
            return invalid("cache.max_entries must be positive".to_string());
        }
        if self.cache.sweep_interval_secs == 0 {
            return invalid("cache.sweep_interval_secs must be positive".to_string());
        }
        Ok(())
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }
}
