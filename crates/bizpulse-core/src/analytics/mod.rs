//! Statistical analysis of business metric series
//!
//! Pure, side-effect-free functions over time-ordered samples: trends,
//! outliers, significance, correlation, seasonality and forecasting.
//! Unmet preconditions (too few samples, zero variance, non-finite
//! intermediates) produce `None` or an empty vec, never a panic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MetricKind, MetricSample};

pub mod anomalies;
pub mod forecasting;
pub mod seasonality;
pub mod significance;
pub mod stats;
pub mod trends;


pub use anomalies::{
    dedup_outliers, detect_outliers, OutlierMethod, OutlierRecord, Severity, MIN_OUTLIER_POINTS,
};
pub use forecasting::{generate_forecast, ForecastMethod, ForecastPoint, ForecastResult};
pub use seasonality::{
    calculate_seasonality, SeasonalCandidate, SeasonalPeriod, SeasonalityResult,
    MIN_SEASONALITY_POINTS,
};
pub use significance::{
    calculate_significance, perform_correlation_analysis, CorrelationDirection,
    CorrelationResult, CorrelationStrength, SignificanceResult,
};
pub use trends::{
    calculate_trend, Significance, TrendDirection, TrendResult, TrendStrength, MIN_TREND_POINTS,
};

/// Every single-series analysis for one metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricAnalysis {
    pub metric: MetricKind,
    pub sample_count: usize,
    pub trend: Option<TrendResult>,
    /// Outliers from both methods, deduplicated
    pub outliers: Vec<OutlierRecord>,
    pub seasonality: Option<SeasonalityResult>,
    pub forecast: Option<ForecastResult>,
    pub computed_at: DateTime<Utc>,
}

impl MetricAnalysis {
    /// Run all analyses on a (daily) series
    ///
    /// This is a sync function; large series should be offloaded with
    /// `tokio::task::spawn_blocking` by async callers.
    pub fn compute(metric: MetricKind, series: &[MetricSample], horizon: usize) -> Self {
        let mut outliers = detect_outliers(series, OutlierMethod::Zscore);
        outliers.extend(detect_outliers(series, OutlierMethod::Iqr));

        Self {
            metric,
            sample_count: series.len(),
            trend: calculate_trend(series),
            outliers: dedup_outliers(outliers),
            seasonality: calculate_seasonality(series, 7),
            forecast: generate_forecast(series, horizon),
            computed_at: Utc::now(),
        }
    }
}
