//! Outlier detection for unusual spikes/drops in a metric series
//!
//! Two methods are offered: Z-score (distance from the mean in standard
//! deviations) and IQR fences (distance outside the interquartile box).
//! Deduplication across methods is left to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::stats::{mean, quantile, std_dev};
use crate::models::MetricSample;

/// Minimum samples for outlier detection
pub const MIN_OUTLIER_POINTS: usize = 5;

const Z_THRESHOLD: f64 = 3.0;
const IQR_FENCE: f64 = 1.5;
const MAX_CONFIDENCE: f64 = 0.99;

/// Severity bucket for a detected outlier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight applied to the deviation when estimating revenue impact
    pub fn factor(&self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Zscore,
    Iqr,
}

impl OutlierMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zscore => "zscore",
            Self::Iqr => "iqr",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlierMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zscore" | "z-score" | "z" => Ok(Self::Zscore),
            "iqr" => Ok(Self::Iqr),
            other => Err(format!("unknown outlier method '{}'", other)),
        }
    }
}

/// A single flagged observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRecord {
    pub timestamp: DateTime<Utc>,
    pub observed: f64,
    /// Mean (zscore) or median (iqr) of the series
    pub expected: f64,
    /// |observed - expected|
    pub deviation: f64,
    pub severity: Severity,
    pub method: OutlierMethod,
    /// Confidence (0.0-1.0), grows with the deviation
    pub confidence: f64,
    /// Short human-readable context
    pub context: String,
}

impl OutlierRecord {
    /// Deviation relative to the expected value, in percent (signed)
    pub fn deviation_pct(&self) -> f64 {
        if self.expected.abs() < f64::EPSILON {
            return 0.0;
        }
        (self.observed - self.expected) / self.expected.abs() * 100.0
    }

    pub fn is_spike(&self) -> bool {
        self.observed > self.expected
    }
}

/// Detect outliers in a series with the given method
///
/// # Requirements
/// - Minimum 5 samples, otherwise returns an empty vec
/// - Zero spread (all values equal) yields no outliers
///
/// # Returns
/// Outliers in series order
pub fn detect_outliers(series: &[MetricSample], method: OutlierMethod) -> Vec<OutlierRecord> {
    if series.len() < MIN_OUTLIER_POINTS {
        return Vec::new();
    }
    let values: Vec<f64> = series.iter().map(|s| s.value).collect();
    if values.iter().any(|v| !v.is_finite()) {
        tracing::debug!("Non-finite values in series, skipping outlier detection");
        return Vec::new();
    }

    match method {
        OutlierMethod::Zscore => zscore_outliers(series, &values),
        OutlierMethod::Iqr => iqr_outliers(series, &values),
    }
}

fn zscore_outliers(series: &[MetricSample], values: &[f64]) -> Vec<OutlierRecord> {
    let (Some(mean), Some(sd)) = (mean(values), std_dev(values)) else {
        return Vec::new();
    };
    if sd <= f64::EPSILON {
        return Vec::new();
    }

    series
        .iter()
        .filter_map(|sample| {
            let z = (sample.value - mean) / sd;
            let abs_z = z.abs();
            if abs_z <= Z_THRESHOLD {
                return None;
            }

            let severity = if abs_z >= 4.0 {
                Severity::Critical
            } else if abs_z >= 3.5 {
                Severity::High
            } else {
                Severity::Medium
            };

            Some(OutlierRecord {
                timestamp: sample.timestamp,
                observed: sample.value,
                expected: mean,
                deviation: (sample.value - mean).abs(),
                severity,
                method: OutlierMethod::Zscore,
                confidence: (0.7 + (abs_z - Z_THRESHOLD) * 0.1).min(MAX_CONFIDENCE),
                context: format!(
                    "{:.1} standard deviations {} the mean of {:.2}",
                    abs_z,
                    if z > 0.0 { "above" } else { "below" },
                    mean
                ),
            })
        })
        .collect()
}

fn iqr_outliers(series: &[MetricSample], values: &[f64]) -> Vec<OutlierRecord> {
    let (Some(q1), Some(median), Some(q3)) = (
        quantile(values, 0.25),
        quantile(values, 0.5),
        quantile(values, 0.75),
    ) else {
        return Vec::new();
    };
    let iqr = q3 - q1;
    if iqr <= f64::EPSILON {
        return Vec::new();
    }

    series
        .iter()
        .filter_map(|sample| {
            // Distance from the nearest quartile in IQR multiples
            let multiple = if sample.value > q3 {
                (sample.value - q3) / iqr
            } else if sample.value < q1 {
                (q1 - sample.value) / iqr
            } else {
                return None;
            };
            if multiple <= IQR_FENCE {
                return None;
            }

            let severity = if multiple >= 3.0 {
                Severity::Critical
            } else if multiple >= 2.5 {
                Severity::High
            } else if multiple >= 2.0 {
                Severity::Medium
            } else {
                Severity::Low
            };

            Some(OutlierRecord {
                timestamp: sample.timestamp,
                observed: sample.value,
                expected: median,
                deviation: (sample.value - median).abs(),
                severity,
                method: OutlierMethod::Iqr,
                confidence: (0.6 + (multiple - IQR_FENCE) * 0.15).min(MAX_CONFIDENCE),
                context: format!(
                    "{:.1}x IQR {} the interquartile range [{:.2}, {:.2}]",
                    multiple,
                    if sample.value > q3 { "above" } else { "below" },
                    q1,
                    q3
                ),
            })
        })
        .collect()
}

/// Merge outliers flagged by several methods on the same (timestamp, value)
///
/// Keeps one record per pair: the most severe, ties broken by confidence.
/// Output is sorted by severity (critical first), then deviation (descending).
pub fn dedup_outliers(outliers: Vec<OutlierRecord>) -> Vec<OutlierRecord> {
    let mut merged: Vec<OutlierRecord> = Vec::with_capacity(outliers.len());

    for record in outliers {
        let existing = merged.iter_mut().find(|m| {
            m.timestamp == record.timestamp && m.observed.to_bits() == record.observed.to_bits()
        });
        match existing {
            Some(current) => {
                let better = (record.severity, record.confidence) > (current.severity, current.confidence);
                if better {
                    *current = record;
                }
            }
            None => merged.push(record),
        }
    }

    merged.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.deviation.total_cmp(&a.deviation))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricKind;
    use chrono::Duration;

    fn series(values: &[f64]) -> Vec<MetricSample> {
        let start = Utc::now() - Duration::days(values.len() as i64);
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                MetricSample::new(start + Duration::days(i as i64), v, MetricKind::Revenue)
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data() {
        let s = series(&[1.0, 2.0, 100.0, 3.0]);
        assert!(detect_outliers(&s, OutlierMethod::Zscore).is_empty());
        assert!(detect_outliers(&s, OutlierMethod::Iqr).is_empty());
    }

    #[test]
    fn test_no_variance() {
        let s = series(&[50.0; 12]);
        assert!(detect_outliers(&s, OutlierMethod::Zscore).is_empty());
        assert!(detect_outliers(&s, OutlierMethod::Iqr).is_empty());
    }

    #[test]
    fn test_iqr_flags_extreme_value() {
        let mut values: Vec<f64> = (0..20).map(|i| 100.0 + (i % 5) as f64).collect();
        values.push(400.0);
        let outliers = detect_outliers(&series(&values), OutlierMethod::Iqr);

        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].observed, 400.0);
        assert_eq!(outliers[0].severity, Severity::Critical);
        assert!(outliers[0].confidence <= MAX_CONFIDENCE);
    }

    #[test]
    fn test_confidence_monotonic_in_deviation() {
        let mut base: Vec<f64> = (0..40).map(|i| 100.0 + (i % 4) as f64).collect();
        base.push(300.0);
        base.push(600.0);
        let outliers = detect_outliers(&series(&base), OutlierMethod::Iqr);
        assert_eq!(outliers.len(), 2);
        assert!(outliers[1].confidence >= outliers[0].confidence);
    }

    #[test]
    fn test_dedup_keeps_most_severe() {
        let mut values: Vec<f64> = (0..30).map(|i| 100.0 + (i % 3) as f64).collect();
        values.push(1000.0);
        let s = series(&values);

        let mut all = detect_outliers(&s, OutlierMethod::Zscore);
        all.extend(detect_outliers(&s, OutlierMethod::Iqr));
        assert_eq!(all.len(), 2, "both methods flag the spike");

        let merged = dedup_outliers(all);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].severity, Severity::Critical);
    }

    #[test]
    fn test_deviation_pct_sign() {
        let mut values = vec![100.0; 10];
        values.push(10.0);
        values.extend(vec![101.0, 99.0, 100.0]);
        let outliers = detect_outliers(&series(&values), OutlierMethod::Zscore);
        assert_eq!(outliers.len(), 1);
        assert!(!outliers[0].is_spike());
        assert!(outliers[0].deviation_pct() < 0.0);
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("ZSCORE".parse::<OutlierMethod>().unwrap(), OutlierMethod::Zscore);
        assert_eq!("iqr".parse::<OutlierMethod>().unwrap(), OutlierMethod::Iqr);
        assert!("mad".parse::<OutlierMethod>().is_err());
    }
}
