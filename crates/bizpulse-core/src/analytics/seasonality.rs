//! Seasonality detection by phase averaging
//!
//! The series is cut into whole cycles of the candidate period; the mean of
//! each phase position across cycles forms the seasonal pattern. Seasonal
//! strength is the share of total variance explained by that pattern.
//!
//! Periods are given in days and converted to samples with the median
//! sampling interval, so the analysis assumes roughly regular sampling.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::stats::{mean, variance};
use crate::models::MetricSample;

/// Minimum samples for seasonality detection
pub const MIN_SEASONALITY_POINTS: usize = 30;

const DETECTION_STRENGTH: f64 = 0.3;
const DETECTION_CONFIDENCE: f64 = 0.7;
const CANDIDATE_STRENGTH: f64 = 0.2;
/// Cycles needed for full data sufficiency
const FULL_SUFFICIENCY_CYCLES: f64 = 4.0;

/// Well-known seasonal periods evaluated as candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalPeriod {
    /// Intraday cycle; only measurable on sub-daily samples, since a
    /// one-sample period carries no pattern
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl SeasonalPeriod {
    pub const ALL: [SeasonalPeriod; 4] = [
        SeasonalPeriod::Daily,
        SeasonalPeriod::Weekly,
        SeasonalPeriod::Monthly,
        SeasonalPeriod::Yearly,
    ];

    pub fn days(&self) -> u32 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Yearly => 365,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalCandidate {
    pub period: SeasonalPeriod,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityResult {
    pub is_detected: bool,
    pub period_days: u32,
    /// Variance share explained by the phase pattern (0.0-1.0)
    pub strength: f64,
    /// strength x data sufficiency (0.0-1.0)
    pub confidence: f64,
    /// Mean value per phase position within one period
    pub pattern: Vec<f64>,
    /// Phase indices of local maxima
    pub peaks: Vec<usize>,
    /// Phase indices of local minima
    pub troughs: Vec<usize>,
    pub next_peak: Option<DateTime<Utc>>,
    pub next_trough: Option<DateTime<Utc>>,
    /// Standard periods with strength above 0.2
    pub candidates: Vec<SeasonalCandidate>,
}

struct PhaseDecomposition {
    strength: f64,
    cycles: usize,
    /// Index of the first sample used (start of the first whole cycle)
    offset: usize,
    pattern: Vec<f64>,
}

/// Samples per day inferred from the median spacing of timestamps
fn samples_per_day(series: &[MetricSample]) -> usize {
    let mut gaps: Vec<i64> = series
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
        .filter(|&g| g > 0)
        .collect();
    if gaps.is_empty() {
        return 1;
    }
    gaps.sort_unstable();
    let median = gaps[gaps.len() / 2] as f64;
    ((86_400.0 / median).round() as usize).max(1)
}

fn decompose(values: &[f64], period: usize) -> Option<PhaseDecomposition> {
    if period < 2 {
        return None;
    }
    let cycles = values.len() / period;
    if cycles < 2 {
        return None;
    }

    // Align whole cycles to the end of the series
    let offset = values.len() - cycles * period;
    let used = &values[offset..];
    let total_variance = variance(used)?;
    if total_variance <= f64::EPSILON {
        return None;
    }

    let pattern: Vec<f64> = (0..period)
        .map(|phase| {
            let phase_values: Vec<f64> =
                (0..cycles).map(|c| used[c * period + phase]).collect();
            mean(&phase_values).unwrap_or(0.0)
        })
        .collect();

    let strength = (variance(&pattern)? / total_variance).clamp(0.0, 1.0);
    strength.is_finite().then_some(PhaseDecomposition {
        strength,
        cycles,
        offset,
        pattern,
    })
}

fn local_extrema(pattern: &[f64]) -> (Vec<usize>, Vec<usize>) {
    let len = pattern.len();
    let mut peaks = Vec::new();
    let mut troughs = Vec::new();
    for i in 0..len {
        let prev = pattern[(i + len - 1) % len];
        let next = pattern[(i + 1) % len];
        if pattern[i] > prev && pattern[i] > next {
            peaks.push(i);
        } else if pattern[i] < prev && pattern[i] < next {
            troughs.push(i);
        }
    }
    (peaks, troughs)
}

/// Detect seasonality with the given period (in days)
///
/// # Returns
/// - `None` if fewer than 30 samples, fewer than two whole cycles, or a flat series
/// - `SeasonalityResult` otherwise; `is_detected` requires strength > 0.3 and
///   confidence > 0.7
pub fn calculate_seasonality(series: &[MetricSample], period_days: u32) -> Option<SeasonalityResult> {
    if series.len() < MIN_SEASONALITY_POINTS || period_days == 0 {
        return None;
    }
    let values: Vec<f64> = series.iter().map(|s| s.value).collect();
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let per_day = samples_per_day(series);
    let period = period_days as usize * per_day;
    let decomposition = decompose(&values, period)?;

    let sufficiency = (decomposition.cycles as f64 / FULL_SUFFICIENCY_CYCLES).min(1.0);
    let confidence = (decomposition.strength * sufficiency).clamp(0.0, 1.0);
    let is_detected =
        decomposition.strength > DETECTION_STRENGTH && confidence > DETECTION_CONFIDENCE;

    let (peaks, troughs) = local_extrema(&decomposition.pattern);

    // Last occurrence of a phase, advanced by one period
    let last_cycle_start = decomposition.offset + (decomposition.cycles - 1) * period;
    let next_occurrence = |phase: usize| {
        series
            .get(last_cycle_start + phase)
            .map(|s| s.timestamp + Duration::days(period_days as i64))
    };
    let strongest = |indices: &[usize], higher: bool| {
        indices.iter().copied().max_by(|&a, &b| {
            let ord = decomposition.pattern[a].total_cmp(&decomposition.pattern[b]);
            if higher {
                ord
            } else {
                ord.reverse()
            }
        })
    };

    let (next_peak, next_trough) = if is_detected {
        (
            strongest(&peaks, true).and_then(&next_occurrence),
            strongest(&troughs, false).and_then(&next_occurrence),
        )
    } else {
        (None, None)
    };

    let candidates = SeasonalPeriod::ALL
        .iter()
        .filter_map(|&candidate| {
            let d = decompose(&values, candidate.days() as usize * per_day)?;
            (d.strength > CANDIDATE_STRENGTH).then_some(SeasonalCandidate {
                period: candidate,
                strength: d.strength,
            })
        })
        .collect();

    Some(SeasonalityResult {
        is_detected,
        period_days,
        strength: decomposition.strength,
        confidence,
        pattern: decomposition.pattern,
        peaks,
        troughs,
        next_peak,
        next_trough,
        candidates,
    })
}
