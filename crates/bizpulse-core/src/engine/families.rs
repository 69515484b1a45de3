//! Analysis families
//!
//! Each family fetches the series it needs, runs the analyzers and turns
//! findings into unscored insights. Families share only read-only inputs.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

use crate::analytics::{
    calculate_seasonality, calculate_significance, calculate_trend, dedup_outliers,
    detect_outliers, generate_forecast, perform_correlation_analysis, stats, OutlierMethod,
    OutlierRecord, Severity, Significance, TrendDirection,
};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::models::{
    daily_totals, AnalysisFamily, DateRange, Insight, InsightEvidence, InsightMetadata,
    MetricKind, MetricSample, OrgId, RecommendationBasis,
};
use crate::narrative::NarrativeGenerator;
use crate::provider::DataProvider;

/// Critical outliers this close to the end of the series become alerts
const ALERT_WINDOW_DAYS: i64 = 3;
/// A channel must trail the best one by at least this share
const CHANNEL_GAP_RATIO: f64 = 0.8;
const DAYS_PER_MONTH: f64 = 30.0;
const FORECAST_HORIZON_DAYS: usize = 30;
const RECENT_WINDOW_DAYS: usize = 14;
/// Forecast mean below this share of the recent mean counts as a decline
const DECLINE_RATIO: f64 = 0.9;
const MIN_CORRELATION: f64 = 0.6;

/// Read-only inputs shared by every family of one request
pub(crate) struct FamilyContext<'a> {
    pub org: &'a OrgId,
    pub range: &'a DateRange,
    /// Metrics the provider reports as available
    pub metrics: &'a [MetricKind],
    pub provider: &'a dyn DataProvider,
    pub narrator: &'a dyn NarrativeGenerator,
    pub config: &'a EngineConfig,
    pub quality_score: f64,
    pub now: DateTime<Utc>,
}

struct Finding {
    evidence: InsightEvidence,
    metrics: Vec<MetricKind>,
    confidence: f64,
    sample_count: usize,
    timeframe: String,
    algorithm: &'static str,
    parameters: serde_json::Value,
}

impl FamilyContext<'_> {
    fn has(&self, metric: MetricKind) -> bool {
        self.metrics.contains(&metric)
    }

    async fn raw_series(&self, metric: MetricKind) -> Result<Vec<MetricSample>, CoreError> {
        self.provider
            .fetch_series(self.org, metric, self.range)
            .await
            .map_err(|e| CoreError::provider("fetch_series", e))
    }

    async fn daily_series(&self, metric: MetricKind) -> Result<Vec<MetricSample>, CoreError> {
        Ok(daily_totals(&self.raw_series(metric).await?))
    }

    fn timeframe(&self) -> String {
        format!("{} days", self.range.days())
    }

    fn build(&self, finding: Finding) -> Insight {
        let narrative = self.narrator.narrate(&finding.evidence, &finding.metrics);
        Insight {
            id: uuid::Uuid::new_v4().to_string(),
            org_id: self.org.clone(),
            evidence: finding.evidence,
            title: narrative.title,
            description: narrative.description,
            recommendation: narrative.recommendation,
            impact_score: 1.0,
            confidence: finding.confidence.clamp(0.0, 1.0),
            affected_metrics: finding.metrics,
            timeframe: finding.timeframe,
            sample_count: finding.sample_count,
            created_at: self.now,
            metadata: InsightMetadata {
                algorithm: finding.algorithm.to_string(),
                parameters: finding.parameters,
                data_quality_score: self.quality_score,
                priority: None,
                priority_reasoning: None,
            },
        }
    }
}

/// Run one family; errors are handled by the caller
pub(crate) async fn run(
    family: AnalysisFamily,
    ctx: &FamilyContext<'_>,
) -> Result<Vec<Insight>, CoreError> {
    let insights = match family {
        AnalysisFamily::Trends => trends(ctx).await?,
        AnalysisFamily::Anomalies => anomalies(ctx).await?,
        AnalysisFamily::Performance => performance(ctx).await?,
        AnalysisFamily::Recommendations => recommendations(ctx).await?,
    };
    debug!(org = %ctx.org, family = %family, count = insights.len(), "Family finished");
    Ok(insights)
}

async fn trends(ctx: &FamilyContext<'_>) -> Result<Vec<Insight>, CoreError> {
    let mut insights = Vec::new();

    for &metric in ctx.metrics {
        let series = ctx.daily_series(metric).await?;
        if series.len() < ctx.config.min_sample_count {
            debug!(metric = %metric, samples = series.len(), "Too few samples for trend");
            continue;
        }
        let Some(trend) = calculate_trend(&series) else {
            continue;
        };
        if trend.significance == Significance::None || trend.direction == TrendDirection::Stable {
            continue;
        }

        insights.push(ctx.build(Finding {
            evidence: InsightEvidence::Trend {
                direction: trend.direction,
                strength: trend.strength,
                percent_change: trend.percent_change(),
                p_value: trend.p_value,
            },
            metrics: vec![metric],
            confidence: (1.0 - trend.p_value) * (0.5 + 0.5 * trend.r_squared),
            sample_count: trend.sample_count,
            timeframe: trend.timeframe.clone(),
            algorithm: "linear_regression",
            parameters: json!({
                "slope": trend.slope,
                "intercept": trend.intercept,
                "r_squared": trend.r_squared,
                "p_value": trend.p_value,
            }),
        }));
    }

    Ok(insights)
}

async fn anomalies(ctx: &FamilyContext<'_>) -> Result<Vec<Insight>, CoreError> {
    let mut insights = Vec::new();

    for &metric in ctx.metrics {
        let series = ctx.daily_series(metric).await?;
        let Some(last) = series.last().map(|s| s.timestamp) else {
            continue;
        };

        let mut outliers = detect_outliers(&series, OutlierMethod::Zscore);
        outliers.extend(detect_outliers(&series, OutlierMethod::Iqr));
        let outliers = dedup_outliers(outliers);

        for outlier in outliers.into_iter().take(ctx.config.max_anomalies_per_metric) {
            let is_alert = outlier.severity == Severity::Critical
                && last - outlier.timestamp < Duration::days(ALERT_WINDOW_DAYS);
            insights.push(ctx.build(anomaly_finding(metric, &outlier, is_alert, series.len())));
        }
    }

    Ok(insights)
}

fn anomaly_finding(
    metric: MetricKind,
    outlier: &OutlierRecord,
    is_alert: bool,
    sample_count: usize,
) -> Finding {
    let evidence = if is_alert {
        InsightEvidence::Alert {
            severity: outlier.severity,
            deviation_pct: outlier.deviation_pct(),
            observed: outlier.observed,
            expected: outlier.expected,
            observed_at: outlier.timestamp,
            estimated_revenue: None,
        }
    } else {
        InsightEvidence::Anomaly {
            severity: outlier.severity,
            deviation_pct: outlier.deviation_pct(),
            observed: outlier.observed,
            expected: outlier.expected,
            observed_at: outlier.timestamp,
        }
    };

    Finding {
        evidence,
        metrics: vec![metric],
        confidence: outlier.confidence,
        sample_count,
        timeframe: "1 day".to_string(),
        algorithm: match outlier.method {
            OutlierMethod::Zscore => "zscore",
            OutlierMethod::Iqr => "iqr",
        },
        parameters: json!({
            "method": outlier.method.as_str(),
            "deviation": outlier.deviation,
            "context": outlier.context,
        }),
    }
}

async fn performance(ctx: &FamilyContext<'_>) -> Result<Vec<Insight>, CoreError> {
    if !ctx.has(MetricKind::Revenue) {
        return Ok(Vec::new());
    }
    let samples = ctx.raw_series(MetricKind::Revenue).await?;

    let mut by_channel: BTreeMap<&str, Vec<MetricSample>> = BTreeMap::new();
    for sample in &samples {
        if !sample.source.is_empty() {
            by_channel
                .entry(sample.source.as_str())
                .or_default()
                .push(sample.clone());
        }
    }

    // (channel, mean daily revenue, variance, days)
    let channels: Vec<(&str, f64, f64, usize)> = by_channel
        .into_iter()
        .filter_map(|(channel, samples)| {
            let daily: Vec<f64> = daily_totals(&samples).iter().map(|s| s.value).collect();
            if daily.len() < ctx.config.min_sample_count {
                return None;
            }
            Some((
                channel,
                stats::mean(&daily)?,
                stats::variance(&daily)?,
                daily.len(),
            ))
        })
        .collect();
    if channels.len() < 2 {
        return Ok(Vec::new());
    }

    let Some(&(best, best_mean, best_var, _)) =
        channels.iter().max_by(|a, b| a.1.total_cmp(&b.1))
    else {
        return Ok(Vec::new());
    };

    let mut insights = Vec::new();
    for &(channel, mean, var, days) in &channels {
        if channel == best || mean > best_mean * CHANNEL_GAP_RATIO {
            continue;
        }
        let pooled = (var + best_var) / 2.0;
        let test = calculate_significance(mean, best_mean, pooled);
        if test.p_value >= ctx.config.significance_level {
            continue;
        }

        insights.push(ctx.build(Finding {
            evidence: InsightEvidence::Performance {
                channel: channel.to_string(),
                best_channel: best.to_string(),
                monthly_revenue_gap: (best_mean - mean) * DAYS_PER_MONTH,
                p_value: test.p_value,
            },
            metrics: vec![MetricKind::Revenue],
            confidence: test.confidence_level,
            sample_count: days,
            timeframe: ctx.timeframe(),
            algorithm: "channel_comparison",
            parameters: json!({
                "channel_mean": mean,
                "best_mean": best_mean,
                "effect_size": test.effect_size,
                "interpretation": test.interpretation,
            }),
        }));
    }

    Ok(insights)
}

async fn recommendations(ctx: &FamilyContext<'_>) -> Result<Vec<Insight>, CoreError> {
    let mut insights = Vec::new();

    if ctx.has(MetricKind::Revenue) {
        let revenue = ctx.daily_series(MetricKind::Revenue).await?;
        if let Some(finding) = forecast_decline(&revenue) {
            insights.push(ctx.build(finding));
        }
        if let Some(finding) = seasonal_peak(MetricKind::Revenue, &revenue) {
            insights.push(ctx.build(finding));
        }
    }

    if ctx.has(MetricKind::Sessions) {
        let outcomes: Vec<MetricKind> = [MetricKind::Orders, MetricKind::Conversions]
            .into_iter()
            .filter(|m| ctx.has(*m))
            .collect();
        if !outcomes.is_empty() {
            let sessions = ctx.daily_series(MetricKind::Sessions).await?;
            for outcome in outcomes {
                let series = ctx.daily_series(outcome).await?;
                if let Some(finding) = correlation(ctx, &sessions, outcome, &series) {
                    insights.push(ctx.build(finding));
                }
            }
        }
    }

    Ok(insights)
}

fn forecast_decline(revenue: &[MetricSample]) -> Option<Finding> {
    let forecast = generate_forecast(revenue, FORECAST_HORIZON_DAYS)?;
    let forecast_mean = forecast.mean_predicted()?;
    let recent: Vec<f64> = revenue
        .iter()
        .rev()
        .take(RECENT_WINDOW_DAYS)
        .map(|s| s.value)
        .collect();
    let recent_mean = stats::mean(&recent)?;
    if recent_mean <= 0.0 || forecast_mean >= recent_mean * DECLINE_RATIO {
        return None;
    }

    Some(Finding {
        evidence: InsightEvidence::Recommendation {
            basis: RecommendationBasis::ForecastDecline {
                recent_mean,
                forecast_mean,
                horizon_days: FORECAST_HORIZON_DAYS,
            },
            estimated_revenue: Some((recent_mean - forecast_mean) * DAYS_PER_MONTH),
        },
        metrics: vec![MetricKind::Revenue],
        confidence: forecast.accuracy,
        sample_count: revenue.len(),
        timeframe: format!("{} days", FORECAST_HORIZON_DAYS),
        algorithm: "forecast",
        parameters: json!({
            "method": forecast.method,
            "horizon_days": FORECAST_HORIZON_DAYS,
            "assumptions": forecast.assumptions,
        }),
    })
}

fn seasonal_peak(metric: MetricKind, series: &[MetricSample]) -> Option<Finding> {
    [7u32, 30].into_iter().find_map(|period| {
        let result = calculate_seasonality(series, period)?;
        let next_peak = result.next_peak.filter(|_| result.is_detected)?;
        Some(Finding {
            evidence: InsightEvidence::Recommendation {
                basis: RecommendationBasis::SeasonalPeak {
                    period_days: period,
                    next_peak,
                    strength: result.strength,
                },
                estimated_revenue: None,
            },
            metrics: vec![metric],
            confidence: result.confidence,
            sample_count: series.len(),
            timeframe: format!("{} days", period),
            algorithm: "seasonal_decomposition",
            parameters: json!({
                "period_days": period,
                "strength": result.strength,
                "peaks": result.peaks,
            }),
        })
    })
}

fn correlation(
    ctx: &FamilyContext<'_>,
    sessions: &[MetricSample],
    outcome: MetricKind,
    series: &[MetricSample],
) -> Option<Finding> {
    let result = perform_correlation_analysis(sessions, series)?;
    if result.coefficient.abs() <= MIN_CORRELATION
        || result.p_value >= ctx.config.significance_level
    {
        return None;
    }

    Some(Finding {
        evidence: InsightEvidence::Recommendation {
            basis: RecommendationBasis::Correlation {
                driver: MetricKind::Sessions,
                outcome,
                coefficient: result.coefficient,
            },
            estimated_revenue: None,
        },
        metrics: vec![MetricKind::Sessions, outcome],
        confidence: result.coefficient.abs() * (1.0 - result.p_value),
        sample_count: result.sample_count,
        timeframe: ctx.timeframe(),
        algorithm: "pearson_correlation",
        parameters: json!({
            "coefficient": result.coefficient,
            "p_value": result.p_value,
            "strength": result.strength,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BusinessContext;
    use crate::narrative::TemplateNarrator;
    use crate::provider::{InMemoryDataProvider, OrgFixture, ProviderOperation};
    use chrono::TimeZone;

    fn day(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
    }

    fn provider_with(samples: Vec<MetricSample>) -> (InMemoryDataProvider, OrgId) {
        let provider = InMemoryDataProvider::new();
        let org = OrgId::from("acme");
        provider.insert_org(
            org.clone(),
            OrgFixture {
                context: BusinessContext::default(),
                samples,
                ..Default::default()
            },
        );
        (provider, org)
    }

    fn series(metric: MetricKind, values: impl IntoIterator<Item = f64>) -> Vec<MetricSample> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(day(i as i64), v, metric))
            .collect()
    }

    async fn run_family(
        provider: &InMemoryDataProvider,
        org: &OrgId,
        metrics: &[MetricKind],
        family: AnalysisFamily,
    ) -> Vec<Insight> {
        let config = EngineConfig::default();
        let range = DateRange::new(day(-1), day(60));
        let ctx = FamilyContext {
            org,
            range: &range,
            metrics,
            provider,
            narrator: &TemplateNarrator,
            config: &config,
            quality_score: 1.0,
            now: day(30),
        };
        run(family, &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_trend_family_emits_growth() {
        let (provider, org) =
            provider_with(series(MetricKind::Revenue, (0..30).map(|i| 100.0 + 5.0 * i as f64)));
        let insights =
            run_family(&provider, &org, &[MetricKind::Revenue], AnalysisFamily::Trends).await;

        assert_eq!(insights.len(), 1);
        let insight = &insights[0];
        assert!(matches!(
            insight.evidence,
            InsightEvidence::Trend {
                direction: TrendDirection::Increasing,
                ..
            }
        ));
        assert!(insight.confidence > 0.9);
        assert_eq!(insight.metadata.algorithm, "linear_regression");
        assert!(insight.title.starts_with("Revenue growing"));
    }

    #[tokio::test]
    async fn test_recent_critical_outlier_becomes_alert() {
        let mut values: Vec<f64> = (0..30).map(|i| 100.0 + (i % 3) as f64).collect();
        values[29] = 1000.0;
        let (provider, org) = provider_with(series(MetricKind::Orders, values));
        let insights =
            run_family(&provider, &org, &[MetricKind::Orders], AnalysisFamily::Anomalies).await;

        assert!(!insights.is_empty());
        assert!(matches!(insights[0].evidence, InsightEvidence::Alert { .. }));
        assert_eq!(insights[0].affected_metrics, vec![MetricKind::Orders]);
    }

    #[tokio::test]
    async fn test_old_outlier_stays_anomaly() {
        let mut values: Vec<f64> = (0..30).map(|i| 100.0 + (i % 3) as f64).collect();
        values[10] = 1000.0;
        let (provider, org) = provider_with(series(MetricKind::Orders, values));
        let insights =
            run_family(&provider, &org, &[MetricKind::Orders], AnalysisFamily::Anomalies).await;

        assert!(insights
            .iter()
            .all(|i| matches!(i.evidence, InsightEvidence::Anomaly { .. })));
        assert!(insights.len() <= EngineConfig::default().max_anomalies_per_metric);
    }

    #[tokio::test]
    async fn test_underperforming_channel() {
        let mut samples = Vec::new();
        for i in 0..30 {
            let jitter = (i % 4) as f64;
            samples.push(
                MetricSample::new(day(i), 1000.0 + jitter, MetricKind::Revenue).with_source("web"),
            );
            samples.push(
                MetricSample::new(day(i), 400.0 + jitter, MetricKind::Revenue)
                    .with_source("retail"),
            );
        }
        let (provider, org) = provider_with(samples);
        let insights =
            run_family(&provider, &org, &[MetricKind::Revenue], AnalysisFamily::Performance).await;

        assert_eq!(insights.len(), 1);
        match &insights[0].evidence {
            InsightEvidence::Performance {
                channel,
                best_channel,
                monthly_revenue_gap,
                ..
            } => {
                assert_eq!(channel, "retail");
                assert_eq!(best_channel, "web");
                assert!((monthly_revenue_gap - 600.0 * 30.0).abs() < 1e-6);
            }
            other => panic!("unexpected evidence {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sessions_correlation_recommendation() {
        let sessions: Vec<f64> = (0..30).map(|i| 1000.0 + ((i * 37) % 11) as f64 * 20.0).collect();
        let orders: Vec<f64> = sessions.iter().map(|s| s * 0.05 + 1.0).collect();
        let mut samples = series(MetricKind::Sessions, sessions);
        samples.extend(series(MetricKind::Orders, orders));
        let (provider, org) = provider_with(samples);

        let insights = run_family(
            &provider,
            &org,
            &[MetricKind::Orders, MetricKind::Sessions],
            AnalysisFamily::Recommendations,
        )
        .await;

        assert_eq!(insights.len(), 1);
        assert!(matches!(
            insights[0].evidence,
            InsightEvidence::Recommendation {
                basis: RecommendationBasis::Correlation {
                    outcome: MetricKind::Orders,
                    ..
                },
                ..
            }
        ));
        assert!(insights[0].recommendation.starts_with("Invest"));
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces() {
        let (provider, org) = provider_with(series(MetricKind::Revenue, [1.0; 10]));
        provider.fail_operation(ProviderOperation::FetchSeries);

        let config = EngineConfig::default();
        let range = DateRange::new(day(-1), day(60));
        let metrics = [MetricKind::Revenue];
        let ctx = FamilyContext {
            org: &org,
            range: &range,
            metrics: &metrics,
            provider: &provider,
            narrator: &TemplateNarrator,
            config: &config,
            quality_score: 1.0,
            now: day(30),
        };
        let err = run(AnalysisFamily::Trends, &ctx).await.unwrap_err();
        assert!(matches!(err, CoreError::Provider { .. }));
    }
}
