//! Error types for bizpulse-core
//!
//! `CoreError` covers everything that can fail a request. Failures of a
//! single analysis family are not fatal: they are recorded in a
//! [`GenerationReport`] and the request continues with what succeeded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::AnalysisFamily;

/// Core error type for bizpulse operations
///
/// Clone so that one in-flight result can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    // ===================
    // Request Errors
    // ===================
    #[error("Data quality too low: score {score:.2} is below the {threshold:.2} threshold")]
    DataQualityTooLow {
        score: f64,
        threshold: f64,
        issues: Vec<String>,
    },

    #[error("Data provider failed during {operation}: {message}")]
    Provider { operation: String, message: String },

    #[error("Analysis family {family} failed: {message}")]
    AnalysisFailed {
        family: AnalysisFamily,
        message: String,
    },

    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    // ===================
    // Config Errors
    // ===================
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to read config file {path}: {message}")]
    ConfigRead { path: PathBuf, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    // ===================
    // Fixture Errors
    // ===================
    #[error("Failed to read fixture {path}: {message}")]
    FixtureRead { path: PathBuf, message: String },

    #[error("Failed to parse fixture {path}: {message}")]
    FixtureParse { path: PathBuf, message: String },
}

impl CoreError {
    /// Wrap a data provider failure with the operation name
    pub fn provider(operation: &str, error: anyhow::Error) -> Self {
        Self::Provider {
            operation: operation.to_string(),
            message: format!("{:#}", error),
        }
    }
}

/// Severity level for issues recorded during generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Informational, results are complete
    Warning,
    /// A family failed; results are partial
    Error,
}

/// Individual entry in a generation report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportIssue {
    pub source: String,
    pub message: String,
    pub severity: ErrorSeverity,
    /// Actionable suggestion for the operator (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ReportIssue {
    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Warning,
            suggestion: None,
        }
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            severity: ErrorSeverity::Error,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Build an error entry from a CoreError with context-aware suggestions
    pub fn from_core_error(source: impl Into<String>, error: &CoreError) -> Self {
        let suggestion = match error {
            CoreError::Provider { operation, .. } => Some(format!(
                "Check the data provider connection for {}",
                operation
            )),
            CoreError::DataQualityTooLow { .. } => {
                Some("Connect more data sources or widen the analysis window".to_string())
            }
            CoreError::InvalidConfig { .. } | CoreError::ConfigParse { .. } => {
                Some("Fix the configuration file and retry".to_string())
            }
            _ => None,
        };

        let issue = Self::error(source, error.to_string());
        match suggestion {
            Some(suggestion) => issue.with_suggestion(suggestion),
            None => issue,
        }
    }
}

/// Per-request record of which analysis families ran and how they fared
///
/// Enables graceful degradation: a failing family contributes zero insights
/// and an entry here instead of failing the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub issues: Vec<ReportIssue>,
    pub families_run: Vec<AnalysisFamily>,
    /// Insights produced per family, before filtering
    pub produced: BTreeMap<AnalysisFamily, usize>,
    pub data_quality_score: Option<f64>,
}

impl GenerationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: ReportIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ReportIssue::warning(source, message));
    }

    pub fn record_success(&mut self, family: AnalysisFamily, produced: usize) {
        self.families_run.push(family);
        self.produced.insert(family, produced);
    }

    pub fn record_failure(&mut self, family: AnalysisFamily, error: &CoreError) {
        self.families_run.push(family);
        self.produced.insert(family, 0);
        self.issues
            .push(ReportIssue::from_core_error(family.as_str(), error));
    }

    /// Families that ran and failed
    pub fn failed_families(&self) -> Vec<AnalysisFamily> {
        self.families_run
            .iter()
            .copied()
            .filter(|f| {
                self.issues
                    .iter()
                    .any(|i| i.severity == ErrorSeverity::Error && i.source == f.as_str())
            })
            .collect()
    }

    /// Returns true if any family failed
    pub fn has_failures(&self) -> bool {
        self.issues.iter().any(|i| i.severity == ErrorSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ReportIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ErrorSeverity::Warning)
    }

    /// Total insights produced before filtering
    pub fn total_produced(&self) -> usize {
        self.produced.values().sum()
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: GenerationReport) {
        self.issues.extend(other.issues);
        self.families_run.extend(other.families_run);
        for (family, count) in other.produced {
            *self.produced.entry(family).or_insert(0) += count;
        }
        self.data_quality_score = self.data_quality_score.or(other.data_quality_score);
    }
}
