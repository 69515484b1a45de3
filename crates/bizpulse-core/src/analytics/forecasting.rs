//! Metric forecasting with linear regression
//!
//! Extrapolates the least squares line over the sequence index. When weekly
//! seasonality is detected, each projected day is scaled by its day-of-week
//! factor. Assumes one sample per calendar day.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::seasonality::calculate_seasonality;
use super::stats::{linear_fit, mean};
use super::trends::MIN_TREND_POINTS;
use crate::models::MetricSample;

const Z_95: f64 = 1.96;
/// Per-step decay of point confidence
const CONFIDENCE_DECAY: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Linear,
    Seasonal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: DateTime<Utc>,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub points: Vec<ForecastPoint>,
    pub method: ForecastMethod,
    /// Estimated accuracy (0.0-1.0), from the fit quality
    pub accuracy: f64,
    pub assumptions: Vec<String>,
}

impl ForecastResult {
    /// Sum of predicted values over the horizon
    pub fn total_predicted(&self) -> f64 {
        self.points.iter().map(|p| p.predicted).sum()
    }

    /// Mean predicted value over the horizon
    pub fn mean_predicted(&self) -> Option<f64> {
        let values: Vec<f64> = self.points.iter().map(|p| p.predicted).collect();
        mean(&values)
    }
}

/// Mean value per weekday divided by the overall mean (Monday = 0)
fn weekday_factors(series: &[MetricSample]) -> [f64; 7] {
    let mut factors = [1.0; 7];
    let values: Vec<f64> = series.iter().map(|s| s.value).collect();
    let Some(overall) = mean(&values) else {
        return factors;
    };
    if overall.abs() < f64::EPSILON {
        return factors;
    }

    let mut sums = [0.0; 7];
    let mut counts = [0usize; 7];
    for sample in series {
        let day = sample.timestamp.weekday().num_days_from_monday() as usize;
        sums[day] += sample.value;
        counts[day] += 1;
    }
    for day in 0..7 {
        if counts[day] > 0 {
            factors[day] = (sums[day] / counts[day] as f64) / overall;
        }
    }
    factors
}

/// Forecast `horizon` days past the end of the series
///
/// # Returns
/// - `None` if fewer than 7 samples, `horizon == 0`, or a degenerate fit
/// - `ForecastResult` with predicted values floored at zero otherwise
pub fn generate_forecast(series: &[MetricSample], horizon: usize) -> Option<ForecastResult> {
    if series.len() < MIN_TREND_POINTS || horizon == 0 {
        return None;
    }
    let values: Vec<f64> = series.iter().map(|s| s.value).collect();
    let fit = linear_fit(&values)?;
    let last = series.last()?;
    let n = series.len();

    let seasonality = calculate_seasonality(series, 7);
    let seasonal = seasonality.as_ref().is_some_and(|s| s.is_detected);
    let method = if seasonal {
        ForecastMethod::Seasonal
    } else {
        ForecastMethod::Linear
    };
    let factors = if seasonal {
        weekday_factors(series)
    } else {
        [1.0; 7]
    };

    let residual_se = fit.residual_std_error();
    let base_confidence = fit.r_squared.max(0.1);

    let points: Vec<ForecastPoint> = (1..=horizon)
        .map(|i| {
            let date = last.timestamp + Duration::days(i as i64);
            let factor = factors[date.weekday().num_days_from_monday() as usize];
            let raw = fit.predict((n + i - 1) as f64) * factor;
            let margin = Z_95 * residual_se * (i as f64).sqrt();
            let predicted = raw.max(0.0);

            ForecastPoint {
                date,
                predicted,
                lower: (raw - margin).max(0.0),
                upper: (raw + margin).max(0.0),
                confidence: (base_confidence * (1.0 - CONFIDENCE_DECAY * i as f64)).clamp(0.0, 1.0),
            }
        })
        .collect();

    if points.iter().any(|p| !p.predicted.is_finite() || !p.upper.is_finite()) {
        return None;
    }

    let accuracy = match (&seasonality, seasonal) {
        (Some(s), true) => ((fit.r_squared + s.strength) / 2.0).clamp(0.0, 1.0),
        _ => fit.r_squared.clamp(0.0, 1.0),
    };

    let mut assumptions = vec![
        "Historical trend continues at the same rate".to_string(),
        "One observation per calendar day".to_string(),
    ];
    if seasonal {
        assumptions.push("Weekly pattern repeats with the same day-of-week factors".to_string());
    }
    if fit.r_squared < 0.3 {
        assumptions.push("Weak linear fit; treat projections as rough estimates".to_string());
    }

    Some(ForecastResult {
        points,
        method,
        accuracy,
        assumptions,
    })
}
