//! CLI output for insights and single-metric analyses
//!
//! Every formatter renders a comfy-table for humans or pretty JSON.

use bizpulse_core::analytics::{
    CorrelationResult, ForecastResult, OutlierRecord, SeasonalityResult, TrendResult,
};
use bizpulse_core::models::{GenerationOutcome, MetricKind, OrgId, Priority};
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use serde::Serialize;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    /// Analyzer preconditions not met (too few samples, flat series)
    NotEnoughData {
        metric: MetricKind,
        samples: usize,
        analysis: &'static str,
    },
    UnknownOrg {
        org: OrgId,
        available: Vec<OrgId>,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NotEnoughData {
                metric,
                samples,
                analysis,
            } => write!(
                f,
                "Not enough data for {} on {} ({} daily samples)",
                analysis, metric, samples
            ),
            CliError::UnknownOrg { org, available } => {
                let names: Vec<&str> = available.iter().map(|o| o.as_str()).collect();
                write!(
                    f,
                    "Organization '{}' not found in fixture (available: {})",
                    org,
                    names.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for CliError {}

// ============================================================================
// Formatters
// ============================================================================

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn header_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
    table
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Critical => Color::Red,
        Priority::High => Color::Yellow,
        Priority::Medium => Color::White,
        Priority::Low => Color::DarkGrey,
    }
}

/// Ranked insights (human or JSON)
pub fn format_outcome(outcome: &GenerationOutcome, json: bool) -> String {
    if json {
        return to_json(outcome);
    }
    if outcome.insights.is_empty() {
        return "No insights above the confidence threshold.".to_string();
    }

    let mut table = header_table(&["#", "Priority", "Score", "Kind", "Title", "Confidence", "Action"]);
    for (rank, scored) in outcome.insights.iter().enumerate() {
        let insight = &scored.insight;
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(scored.priority).fg(priority_color(scored.priority)),
            Cell::new(format!("{:.1}", scored.overall_score)),
            Cell::new(insight.kind()),
            Cell::new(&insight.title),
            Cell::new(format!("{:.0}%", insight.confidence * 100.0)),
            Cell::new(truncate(&insight.recommendation, 60)),
        ]);
    }

    let mut out = table.to_string();
    for issue in &outcome.report.issues {
        out.push_str(&format!(
            "\n{:?} [{}]: {}",
            issue.severity, issue.source, issue.message
        ));
        if let Some(suggestion) = &issue.suggestion {
            out.push_str(&format!("\n  → {}", suggestion));
        }
    }
    out
}

pub fn format_trend(metric: MetricKind, trend: &TrendResult, json: bool) -> String {
    if json {
        return to_json(trend);
    }

    let mut lines = vec![];
    lines.push(format!("Metric:       {}", metric.label()));
    lines.push(format!(
        "Direction:    {} ({})",
        trend.direction.as_str(),
        trend.strength.as_str()
    ));
    lines.push(format!("Slope:        {:+.2} per day", trend.slope));
    lines.push(format!("R²:           {:.3}", trend.r_squared));
    lines.push(format!(
        "p-value:      {:.4} ({:?})",
        trend.p_value, trend.significance
    ));
    lines.push(format!("Change:       {:+.1}%", trend.percent_change()));
    lines.push(format!(
        "Next value:   {:.1} [{:.1}, {:.1}]",
        trend.projected_next, trend.confidence_interval.0, trend.confidence_interval.1
    ));
    lines.push(format!("Timeframe:    {}", trend.timeframe));
    lines.join("\n")
}

pub fn format_outliers(outliers: &[OutlierRecord], json: bool) -> String {
    if json {
        return to_json(&outliers);
    }
    if outliers.is_empty() {
        return "No outliers found.".to_string();
    }

    let mut table = header_table(&["Date", "Observed", "Expected", "Deviation", "Severity", "Confidence"]);
    for outlier in outliers {
        let date = outlier.timestamp.format("%Y-%m-%d").to_string();
        let observed = format!("{:.1}", outlier.observed);
        let expected = format!("{:.1}", outlier.expected);
        let deviation = format!("{:+.1}%", outlier.deviation_pct());
        let confidence = format!("{:.0}%", outlier.confidence * 100.0);
        table.add_row(Row::from(vec![
            date.as_str(),
            &observed,
            &expected,
            &deviation,
            outlier.severity.as_str(),
            &confidence,
        ]));
    }
    table.to_string()
}

pub fn format_forecast(forecast: &ForecastResult, json: bool) -> String {
    if json {
        return to_json(forecast);
    }

    let mut table = header_table(&["Date", "Predicted", "Lower", "Upper", "Confidence"]);
    for point in &forecast.points {
        table.add_row(vec![
            point.date.format("%Y-%m-%d").to_string(),
            format!("{:.1}", point.predicted),
            format!("{:.1}", point.lower),
            format!("{:.1}", point.upper),
            format!("{:.0}%", point.confidence * 100.0),
        ]);
    }

    let mut out = table.to_string();
    out.push_str(&format!(
        "\nTotal predicted: {:.1}",
        forecast.total_predicted()
    ));
    out.push_str(&format!(
        "\nMethod: {:?}, accuracy {:.0}%",
        forecast.method,
        forecast.accuracy * 100.0
    ));
    for assumption in &forecast.assumptions {
        out.push_str(&format!("\n  - {}", assumption));
    }
    out
}

pub fn format_seasonality(result: &SeasonalityResult, json: bool) -> String {
    if json {
        return to_json(result);
    }

    let mut lines = vec![];
    lines.push(format!(
        "Period:       {} days ({})",
        result.period_days,
        if result.is_detected {
            "detected"
        } else {
            "not detected"
        }
    ));
    lines.push(format!("Strength:     {:.2}", result.strength));
    lines.push(format!("Confidence:   {:.2}", result.confidence));
    let pattern: Vec<String> = result.pattern.iter().map(|v| format!("{:+.1}", v)).collect();
    lines.push(format!("Pattern:      {}", pattern.join(" ")));
    if let Some(peak) = result.next_peak {
        lines.push(format!("Next peak:    {}", peak.format("%Y-%m-%d")));
    }
    if let Some(trough) = result.next_trough {
        lines.push(format!("Next trough:  {}", trough.format("%Y-%m-%d")));
    }
    for candidate in &result.candidates {
        lines.push(format!(
            "  candidate {:?}: strength {:.2}",
            candidate.period, candidate.strength
        ));
    }
    lines.join("\n")
}

pub fn format_correlation(
    left: MetricKind,
    right: MetricKind,
    result: &CorrelationResult,
    json: bool,
) -> String {
    if json {
        return to_json(result);
    }

    [
        format!("Metrics:      {} vs {}", left.label(), right.label()),
        format!("Coefficient:  {:+.3}", result.coefficient),
        format!("p-value:      {:.4}", result.p_value),
        format!(
            "Strength:     {:?} {:?}",
            result.strength, result.direction
        ),
        format!("Samples:      {}", result.sample_count),
    ]
    .join("\n")
}

// ============================================================================
// Utilities
// ============================================================================

fn truncate(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max {
        s.to_string()
    } else {
        // Char-based so multi-byte characters never split
        s.chars().take(max - 1).collect::<String>() + "…"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bizpulse_core::analytics::{ForecastMethod, ForecastPoint, OutlierMethod, Severity};
    use bizpulse_core::GenerationReport;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééé", 4), "ééé…");
    }

    #[test]
    fn test_empty_outcome_message() {
        let outcome = GenerationOutcome {
            org_id: OrgId::from("acme"),
            insights: Vec::new(),
            analyzed_metrics: vec![MetricKind::Revenue],
            report: GenerationReport::new(),
            generated_at: Utc::now(),
        };
        assert_eq!(
            format_outcome(&outcome, false),
            "No insights above the confidence threshold."
        );
        assert!(format_outcome(&outcome, true).contains("\"org_id\": \"acme\""));
    }

    #[test]
    fn test_outlier_table_contains_date() {
        let outliers = vec![OutlierRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            observed: 1000.0,
            expected: 100.0,
            deviation: 900.0,
            severity: Severity::Critical,
            method: OutlierMethod::Zscore,
            confidence: 0.99,
            context: String::new(),
        }];
        let table = format_outliers(&outliers, false);
        assert!(table.contains("2024-03-01"));
        assert!(table.contains("critical"));
    }

    #[test]
    fn test_forecast_shows_total() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let point = |predicted: f64| ForecastPoint {
            date,
            predicted,
            lower: predicted - 10.0,
            upper: predicted + 10.0,
            confidence: 0.9,
        };
        let forecast = ForecastResult {
            points: vec![point(100.0), point(150.5)],
            method: ForecastMethod::Linear,
            accuracy: 0.8,
            assumptions: Vec::new(),
        };
        assert!(format_forecast(&forecast, false).contains("Total predicted: 250.5"));
    }

    #[test]
    fn test_unknown_org_message() {
        let err = CliError::UnknownOrg {
            org: OrgId::from("nope"),
            available: vec![OrgId::from("acme"), OrgId::from("globex")],
        };
        assert_eq!(
            err.to_string(),
            "Organization 'nope' not found in fixture (available: acme, globex)"
        );
    }
}
