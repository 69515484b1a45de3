//! Insight text generation
//!
//! Titles, descriptions and recommendations come from a
//! [`NarrativeGenerator`]; [`TemplateNarrator`] fills fixed templates.

use crate::analytics::TrendDirection;
use crate::models::{InsightEvidence, MetricKind, RecommendationBasis};

/// Text attached to an insight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    pub title: String,
    pub description: String,
    pub recommendation: String,
}

pub trait NarrativeGenerator: Send + Sync {
    fn narrate(&self, evidence: &InsightEvidence, metrics: &[MetricKind]) -> Narrative;
}

/// Fixed English templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

fn metric_label(metrics: &[MetricKind]) -> &'static str {
    metrics.first().map(|m| m.label()).unwrap_or("Metric")
}

fn lower(label: &str) -> String {
    label.to_lowercase()
}

fn movement(deviation_pct: f64) -> &'static str {
    if deviation_pct >= 0.0 {
        "spike"
    } else {
        "drop"
    }
}

impl NarrativeGenerator for TemplateNarrator {
    fn narrate(&self, evidence: &InsightEvidence, metrics: &[MetricKind]) -> Narrative {
        let label = metric_label(metrics);

        match evidence {
            InsightEvidence::Trend {
                direction,
                strength,
                percent_change,
                p_value,
            } => {
                let (verb, recommendation) = match direction {
                    TrendDirection::Decreasing => (
                        "declining",
                        format!(
                            "Review recent pricing and campaign changes to find what is pulling {} down.",
                            lower(label)
                        ),
                    ),
                    _ => (
                        "growing",
                        format!(
                            "Keep investing in the channels driving {} and track the trend weekly.",
                            lower(label)
                        ),
                    ),
                };
                Narrative {
                    title: format!("{} {} {:.1}%", label, verb, percent_change.abs()),
                    description: format!(
                        "{} changed {:+.1}% over the analysis window ({} trend, p = {:.3}).",
                        label,
                        percent_change,
                        strength.as_str(),
                        p_value
                    ),
                    recommendation,
                }
            }
            InsightEvidence::Anomaly {
                severity,
                deviation_pct,
                observed,
                expected,
                observed_at,
            } => Narrative {
                title: format!("Unusual {} in {}", movement(*deviation_pct), lower(label)),
                description: format!(
                    "{} was {:.0} on {}, {:+.0}% against an expected {:.0} ({} severity).",
                    label,
                    observed,
                    observed_at.format("%Y-%m-%d"),
                    deviation_pct,
                    expected,
                    severity.as_str()
                ),
                recommendation: "Check for tracking gaps or one-off events on that day before acting on it."
                    .to_string(),
            },
            InsightEvidence::Alert {
                severity,
                deviation_pct,
                observed,
                expected,
                observed_at,
                ..
            } => Narrative {
                title: format!("Critical {} in {}", movement(*deviation_pct), lower(label)),
                description: format!(
                    "{} hit {:.0} on {}, {:+.0}% against an expected {:.0} ({} severity).",
                    label,
                    observed,
                    observed_at.format("%Y-%m-%d"),
                    deviation_pct,
                    expected,
                    severity.as_str()
                ),
                recommendation:
                    "Investigate immediately: confirm data collection and look for outages or promotions on that day."
                        .to_string(),
            },
            InsightEvidence::Performance {
                channel,
                best_channel,
                monthly_revenue_gap,
                ..
            } => Narrative {
                title: format!("{} trails {} on revenue", channel, best_channel),
                description: format!(
                    "The {} channel earns about {:.0} less per month than {}.",
                    channel, monthly_revenue_gap, best_channel
                ),
                recommendation: format!(
                    "Compare pricing and promotion on {} with {} and move what works.",
                    channel, best_channel
                ),
            },
            InsightEvidence::Recommendation { basis, .. } => match basis {
                RecommendationBasis::ForecastDecline {
                    recent_mean,
                    forecast_mean,
                    horizon_days,
                } => Narrative {
                    title: format!("{} projected to decline", label),
                    description: format!(
                        "The {}-day forecast averages {:.0} per day versus {:.0} recently.",
                        horizon_days, forecast_mean, recent_mean
                    ),
                    recommendation: "Plan a promotion or retention campaign before the projected dip."
                        .to_string(),
                },
                RecommendationBasis::SeasonalPeak {
                    period_days,
                    next_peak,
                    strength,
                } => {
                    let cycle = if *period_days == 7 { "weekly" } else { "monthly" };
                    Narrative {
                        title: format!("Prepare for the next {} peak", cycle),
                        description: format!(
                            "{} follows a {} pattern (strength {:.0}%) that peaks next on {}.",
                            label,
                            cycle,
                            strength * 100.0,
                            next_peak.format("%Y-%m-%d")
                        ),
                        recommendation: format!(
                            "Schedule campaigns and stock ahead of {}.",
                            next_peak.format("%Y-%m-%d")
                        ),
                    }
                }
                RecommendationBasis::Correlation {
                    driver,
                    outcome,
                    coefficient,
                } => Narrative {
                    title: format!("{} drives {}", driver.label(), lower(outcome.label())),
                    description: format!(
                        "{} and {} move together (r = {:.2}).",
                        driver.label(),
                        lower(outcome.label()),
                        coefficient
                    ),
                    recommendation: format!(
                        "Invest in acquiring more {}; {} should follow.",
                        lower(driver.label()),
                        lower(outcome.label())
                    ),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{Severity, TrendStrength};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_trend_narrative() {
        let n = TemplateNarrator.narrate(
            &InsightEvidence::Trend {
                direction: TrendDirection::Decreasing,
                strength: TrendStrength::Strong,
                percent_change: -12.34,
                p_value: 0.004,
            },
            &[MetricKind::Revenue],
        );
        assert_eq!(n.title, "Revenue declining 12.3%");
        assert!(n.description.contains("strong trend"));
        assert!(n.recommendation.contains("revenue"));
    }

    #[test]
    fn test_alert_narrative() {
        let n = TemplateNarrator.narrate(
            &InsightEvidence::Alert {
                severity: Severity::Critical,
                deviation_pct: -65.0,
                observed: 35.0,
                expected: 100.0,
                observed_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                estimated_revenue: None,
            },
            &[MetricKind::Orders],
        );
        assert_eq!(n.title, "Critical drop in orders");
        assert!(n.description.contains("2024-03-01"));
    }

    #[test]
    fn test_correlation_narrative() {
        let n = TemplateNarrator.narrate(
            &InsightEvidence::Recommendation {
                basis: RecommendationBasis::Correlation {
                    driver: MetricKind::Sessions,
                    outcome: MetricKind::Conversions,
                    coefficient: 0.82,
                },
                estimated_revenue: None,
            },
            &[MetricKind::Sessions, MetricKind::Conversions],
        );
        assert_eq!(n.title, "Sessions drives conversions");
        assert!(n.description.contains("0.82"));
    }
}
