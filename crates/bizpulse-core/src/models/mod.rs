//! Data models for bizpulse

pub mod context;
pub mod insight;
pub mod job;
pub mod metric;

pub use context::{
    BusinessContext, BusinessCycle, BusinessSize, DataQualityReport, MarketCondition,
    SeasonalContext, TimeContext,
};
pub use insight::{
    ImpactComponents, Insight, InsightEvidence, InsightKind, InsightMetadata, Priority,
    RecommendationBasis, ScoredInsight,
};
pub use job::{AnalysisFamily, GenerationJob, GenerationOutcome, JobStatus, JobStatusView};
pub use metric::{daily_totals, DateRange, MetricKind, MetricSample, OrgId};
