//! Trend detection with least squares regression
//!
//! Fits value against sequence index (not wall-clock time) so unevenly spaced
//! samples still produce a usable slope, then attaches a t-test p-value and a
//! one-step projection.

use serde::{Deserialize, Serialize};

use super::stats::{linear_fit, student_t_two_tailed_p};
use crate::models::MetricSample;

/// Minimum samples for a trend fit
pub const MIN_TREND_POINTS: usize = 7;

/// |slope| below this is reported as stable
const STABLE_SLOPE: f64 = 0.01;

/// Two-sided 95% normal quantile used for projection bands
const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Weak,
    Moderate,
    Strong,
}

impl TrendStrength {
    fn from_r_squared(r_squared: f64) -> Self {
        if r_squared > 0.7 {
            Self::Strong
        } else if r_squared > 0.4 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        }
    }

    /// Share of the observed change attributed to the trend
    pub fn factor(&self) -> f64 {
        match self {
            Self::Weak => 0.3,
            Self::Moderate => 0.6,
            Self::Strong => 1.0,
        }
    }
}

/// Statistical significance bucket derived from a p-value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    None,
    Low,
    Medium,
    High,
}

impl Significance {
    pub fn from_p_value(p: f64) -> Self {
        if p < 0.01 {
            Self::High
        } else if p < 0.05 {
            Self::Medium
        } else if p < 0.10 {
            Self::Low
        } else {
            Self::None
        }
    }
}

/// Fitted trend over one metric series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub significance: Significance,
    pub direction: TrendDirection,
    pub strength: TrendStrength,
    /// Value projected one step past the last sample
    pub projected_next: f64,
    /// (lower, upper) band around `projected_next`
    pub confidence_interval: (f64, f64),
    pub sample_count: usize,
    /// e.g. "30 days"
    pub timeframe: String,
}

impl TrendResult {
    /// Fitted change from first to last sample as a percentage of the first fitted value
    pub fn percent_change(&self) -> f64 {
        let start = self.intercept;
        if start.abs() < f64::EPSILON {
            return 0.0;
        }
        let end = self.intercept + self.slope * (self.sample_count.saturating_sub(1)) as f64;
        (end - start) / start.abs() * 100.0
    }
}

/// Calculate a linear trend over a time-ordered series
///
/// # Returns
/// - `None` if fewer than 7 samples or the fit is numerically degenerate
/// - `TrendResult` otherwise (deterministic for identical input order)
pub fn calculate_trend(series: &[MetricSample]) -> Option<TrendResult> {
    if series.len() < MIN_TREND_POINTS {
        return None;
    }

    let values: Vec<f64> = series.iter().map(|s| s.value).collect();
    let fit = linear_fit(&values)?;
    let n = fit.n as f64;

    // t-statistic on the slope from residual variance
    let residual_se = fit.residual_std_error();
    let slope_se = residual_se / fit.sxx.sqrt();
    let p_value = if slope_se > 0.0 {
        student_t_two_tailed_p(fit.slope / slope_se, n - 2.0)
    } else if fit.slope.abs() > 0.0 {
        // Perfect fit with non-zero slope
        0.0
    } else {
        1.0
    };
    if !p_value.is_finite() {
        return None;
    }

    let direction = if fit.slope.abs() < STABLE_SLOPE {
        TrendDirection::Stable
    } else if fit.slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    let projected_next = fit.predict(n);
    let margin = Z_95 * residual_se * (1.0 + 1.0 / n).sqrt();

    let span_days = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_days() + 1,
        _ => series.len() as i64,
    };

    Some(TrendResult {
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        p_value,
        significance: Significance::from_p_value(p_value),
        direction,
        strength: TrendStrength::from_r_squared(fit.r_squared),
        projected_next,
        confidence_interval: (projected_next - margin, projected_next + margin),
        sample_count: series.len(),
        timeframe: format!("{} days", span_days),
    })
}
