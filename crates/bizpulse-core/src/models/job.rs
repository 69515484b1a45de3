//! Generation job records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::insight::ScoredInsight;
use super::metric::{MetricKind, OrgId};
use crate::error::GenerationReport;

/// Independent analysis families run per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisFamily {
    Trends,
    Anomalies,
    Performance,
    Recommendations,
}

impl AnalysisFamily {
    pub const ALL: [AnalysisFamily; 4] = [
        AnalysisFamily::Trends,
        AnalysisFamily::Anomalies,
        AnalysisFamily::Performance,
        AnalysisFamily::Recommendations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trends => "trends",
            Self::Anomalies => "anomalies",
            Self::Performance => "performance",
            Self::Recommendations => "recommendations",
        }
    }
}

impl fmt::Display for AnalysisFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranked, filtered result of one generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub org_id: OrgId,
    /// Sorted by overall score, descending
    pub insights: Vec<ScoredInsight>,
    /// Metrics that were available for analysis
    pub analyzed_metrics: Vec<MetricKind>,
    pub report: GenerationReport,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One generation request tracked by the engine
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: String,
    pub org_id: OrgId,
    pub status: JobStatus,
    /// 0-100, never decreases
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub outcome: Option<Arc<GenerationOutcome>>,
}

impl GenerationJob {
    pub fn new(org_id: OrgId) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            org_id,
            status: JobStatus::Pending,
            progress: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
            outcome: None,
        }
    }

    pub fn start(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
            self.touch();
        }
    }

    /// Raise progress; lower values and updates after completion are ignored
    pub fn advance(&mut self, progress: u8) {
        if self.status.is_terminal() {
            return;
        }
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
            self.touch();
        }
    }

    pub fn complete(&mut self, outcome: Arc<GenerationOutcome>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.outcome = Some(outcome);
        self.finish();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.finish();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn finish(&mut self) {
        self.touch();
        self.completed_at = Some(self.updated_at);
    }
}

/// Polling view of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ScoredInsight>>,
}

impl From<&GenerationJob> for JobStatusView {
    fn from(job: &GenerationJob) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            error: job.error.clone(),
            results: job.outcome.as_ref().map(|o| o.insights.clone()),
        }
    }
}
