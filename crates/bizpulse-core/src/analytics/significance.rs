//! Significance testing and pairwise correlation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stats::{normal_two_tailed_p, pearson, student_t_two_tailed_p};
use crate::models::MetricSample;

/// Minimum aligned points for a correlation
pub const MIN_CORRELATION_POINTS: usize = 5;

const ALPHA: f64 = 0.05;

/// Result of comparing a current value to a baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub is_significant: bool,
    pub p_value: f64,
    /// 1 - p_value
    pub confidence_level: f64,
    /// |change| / sqrt(variance)
    pub effect_size: f64,
    pub interpretation: String,
}

impl SignificanceResult {
    fn cannot_calculate(reason: &str) -> Self {
        Self {
            is_significant: false,
            p_value: 1.0,
            confidence_level: 0.0,
            effect_size: 0.0,
            interpretation: format!("Cannot calculate significance: {}", reason),
        }
    }
}

/// Test whether `current` differs meaningfully from `previous`
///
/// Never divides by zero: a zero baseline or non-positive variance yields a
/// "cannot calculate" result (not significant, p = 1).
pub fn calculate_significance(current: f64, previous: f64, variance: f64) -> SignificanceResult {
    if !current.is_finite() || !previous.is_finite() || !variance.is_finite() {
        return SignificanceResult::cannot_calculate("non-finite input");
    }
    if previous == 0.0 {
        return SignificanceResult::cannot_calculate("zero baseline");
    }
    if variance <= 0.0 {
        return SignificanceResult::cannot_calculate("zero variance");
    }

    let change = current - previous;
    let effect_size = change.abs() / variance.sqrt();
    let p_value = normal_two_tailed_p(effect_size);
    let is_significant = p_value < ALPHA;

    let magnitude = if effect_size < 0.2 {
        "negligible"
    } else if effect_size < 0.5 {
        "small"
    } else if effect_size < 0.8 {
        "medium"
    } else {
        "large"
    };
    let pct = change / previous.abs() * 100.0;

    SignificanceResult {
        is_significant,
        p_value,
        confidence_level: 1.0 - p_value,
        effect_size,
        interpretation: format!(
            "{} effect ({:+.1}% vs baseline), {}",
            magnitude,
            pct,
            if is_significant {
                "statistically significant"
            } else {
                "not statistically significant"
            }
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    fn from_coefficient(r: f64) -> Self {
        let r = r.abs();
        if r > 0.8 {
            Self::VeryStrong
        } else if r > 0.6 {
            Self::Strong
        } else if r > 0.4 {
            Self::Moderate
        } else if r > 0.2 {
            Self::Weak
        } else {
            Self::VeryWeak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Pearson coefficient (-1.0 to 1.0)
    pub coefficient: f64,
    pub p_value: f64,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    /// Number of calendar dates present in both series
    pub sample_count: usize,
}

/// Correlate two series on their shared calendar dates
///
/// Dates present in only one series are excluded; multiple samples on the
/// same date are summed.
///
/// # Returns
/// `None` if fewer than 5 dates align or either side has no variance
pub fn perform_correlation_analysis(
    a: &[MetricSample],
    b: &[MetricSample],
) -> Option<CorrelationResult> {
    let by_date = |series: &[MetricSample]| {
        let mut map: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for s in series {
            *map.entry(s.timestamp.date_naive()).or_insert(0.0) += s.value;
        }
        map
    };
    let left = by_date(a);
    let right = by_date(b);

    let (xs, ys): (Vec<f64>, Vec<f64>) = left
        .iter()
        .filter_map(|(date, x)| right.get(date).map(|y| (*x, *y)))
        .unzip();

    if xs.len() < MIN_CORRELATION_POINTS {
        return None;
    }

    let r = pearson(&xs, &ys)?;
    let n = xs.len() as f64;
    let p_value = if (1.0 - r * r) <= f64::EPSILON {
        0.0
    } else {
        let t = r * ((n - 2.0) / (1.0 - r * r)).sqrt();
        student_t_two_tailed_p(t, n - 2.0)
    };
    if !p_value.is_finite() {
        return None;
    }

    Some(CorrelationResult {
        coefficient: r,
        p_value,
        strength: CorrelationStrength::from_coefficient(r),
        direction: if r >= 0.0 {
            CorrelationDirection::Positive
        } else {
            CorrelationDirection::Negative
        },
        sample_count: xs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significance_zero_baseline() {
        let result = calculate_significance(100.0, 0.0, 25.0);
        assert!(!result.is_significant);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_significance_zero_variance() {
        let result = calculate_significance(120.0, 100.0, 0.0);
        assert!(!result.is_significant);
        assert_eq!(result.p_value, 1.0);
        assert!(result.interpretation.contains("Cannot calculate"));
    }

    #[test]
    fn test_significance_large_effect() {
        // change 30, sd 10 -> effect 3
        let result = calculate_significance(130.0, 100.0, 100.0);
        assert!(result.is_significant);
        assert!((result.effect_size - 3.0).abs() < 1e-9);
        assert!(result.p_value < 0.01);
        assert!(result.interpretation.starts_with("large"));
    }

    #[test]
    fn test_significance_negligible_effect() {
        let result = calculate_significance(101.0, 100.0, 100.0);
        assert!(!result.is_significant);
        assert!(result.interpretation.starts_with("negligible"));
    }
}
