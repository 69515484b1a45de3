//! Insight models
//!
//! An insight is a describable finding derived from metric analysis. The
//! kind-specific statistics it was built from live in [`InsightEvidence`],
//! which the scorer matches exhaustively.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::metric::{MetricKind, OrgId};
use crate::analytics::{Severity, TrendDirection, TrendStrength};

/// Insight category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Trend,
    Anomaly,
    Performance,
    Recommendation,
    Alert,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trend => "trend",
            Self::Anomaly => "anomaly",
            Self::Performance => "performance",
            Self::Recommendation => "recommendation",
            Self::Alert => "alert",
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What triggered a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum RecommendationBasis {
    /// Forecast projects the metric below its recent level
    ForecastDecline {
        recent_mean: f64,
        forecast_mean: f64,
        horizon_days: usize,
    },
    /// A recurring peak is coming up
    SeasonalPeak {
        period_days: u32,
        next_peak: DateTime<Utc>,
        strength: f64,
    },
    /// Two metrics move together strongly
    Correlation {
        driver: MetricKind,
        outcome: MetricKind,
        coefficient: f64,
    },
}

/// Kind-specific statistics behind an insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightEvidence {
    Trend {
        direction: TrendDirection,
        strength: TrendStrength,
        /// Fitted change over the observed window, in percent
        percent_change: f64,
        p_value: f64,
    },
    Anomaly {
        severity: Severity,
        /// Signed deviation from the expected value, in percent
        deviation_pct: f64,
        observed: f64,
        expected: f64,
        observed_at: DateTime<Utc>,
    },
    Performance {
        channel: String,
        best_channel: String,
        /// Monthly revenue the channel trails the best one by
        monthly_revenue_gap: f64,
        p_value: f64,
    },
    Recommendation {
        #[serde(flatten)]
        basis: RecommendationBasis,
        estimated_revenue: Option<f64>,
    },
    Alert {
        severity: Severity,
        deviation_pct: f64,
        observed: f64,
        expected: f64,
        observed_at: DateTime<Utc>,
        estimated_revenue: Option<f64>,
    },
}

impl InsightEvidence {
    pub fn kind(&self) -> InsightKind {
        match self {
            Self::Trend { .. } => InsightKind::Trend,
            Self::Anomaly { .. } => InsightKind::Anomaly,
            Self::Performance { .. } => InsightKind::Performance,
            Self::Recommendation { .. } => InsightKind::Recommendation,
            Self::Alert { .. } => InsightKind::Alert,
        }
    }

    /// When the underlying observation happened (anomalies and alerts only)
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Anomaly { observed_at, .. } | Self::Alert { observed_at, .. } => {
                Some(*observed_at)
            }
            _ => None,
        }
    }
}

/// Priority bucket from scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an insight was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightMetadata {
    pub algorithm: String,
    pub parameters: serde_json::Value,
    pub data_quality_score: f64,
    /// Set once the insight has been scored
    pub priority: Option<Priority>,
    pub priority_reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub org_id: OrgId,
    pub evidence: InsightEvidence,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    /// Overall impact score (1.0-10.0)
    pub impact_score: f64,
    /// Confidence (0.0-1.0)
    pub confidence: f64,
    pub affected_metrics: Vec<MetricKind>,
    pub timeframe: String,
    pub sample_count: usize,
    pub created_at: DateTime<Utc>,
    pub metadata: InsightMetadata,
}

impl Insight {
    pub fn kind(&self) -> InsightKind {
        self.evidence.kind()
    }

    /// True if any affected metric is in `metrics`
    pub fn touches_any(&self, metrics: &[MetricKind]) -> bool {
        self.affected_metrics.iter().any(|m| metrics.contains(m))
    }
}

/// The four scoring dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactComponents {
    /// 1.0-10.0
    pub revenue_impact: f64,
    /// 1.0-10.0
    pub urgency_score: f64,
    /// 1.0-10.0, higher is easier
    pub implementation_score: f64,
    /// 0.0-1.0
    pub confidence_level: f64,
}

/// An insight with its scoring breakdown; the unit of the final ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredInsight {
    pub insight: Insight,
    pub components: ImpactComponents,
    pub overall_score: f64,
    pub priority: Priority,
    pub reasoning: String,
}
