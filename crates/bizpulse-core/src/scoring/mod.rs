//! Impact scoring
//!
//! Turns an insight into four components (revenue impact, urgency,
//! implementation ease, confidence), combines them into a 1-10 overall
//! score with diminishing returns above 7, and buckets the result into a
//! priority with a short explanation.

use std::sync::Arc;

use crate::models::{
    BusinessContext, ImpactComponents, Insight, InsightEvidence, InsightKind, Priority,
    ScoredInsight, TimeContext,
};

pub mod signals;

pub use signals::{ComplexitySignal, ComplexitySignals, TextPatternSignals};

const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 10.0;

const PERFORMANCE_CAPTURE_RATE: f64 = 0.5;
const DEFAULT_RECOMMENDATION_SHARE: f64 = 0.05;
const DEFAULT_ALERT_SHARE: f64 = 0.10;

const DIMINISHING_THRESHOLD: f64 = 7.0;
const DIMINISHING_RATE: f64 = 0.7;

/// Revenue percent thresholds mapped to scores, highest first
const REVENUE_BUCKETS: [(f64, f64); 9] = [
    (50.0, 10.0),
    (30.0, 9.0),
    (20.0, 8.0),
    (15.0, 7.0),
    (10.0, 6.0),
    (5.0, 5.0),
    (3.0, 4.0),
    (2.0, 3.0),
    (1.0, 2.0),
];

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(MIN_SCORE, MAX_SCORE)
    } else {
        MIN_SCORE
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Multi-factor insight scorer
#[derive(Clone)]
pub struct ImpactScorer {
    signals: Arc<dyn ComplexitySignals>,
}

impl Default for ImpactScorer {
    fn default() -> Self {
        Self::new(Arc::new(TextPatternSignals))
    }
}

impl ImpactScorer {
    pub fn new(signals: Arc<dyn ComplexitySignals>) -> Self {
        Self { signals }
    }

    /// Estimated monthly revenue at stake before weighting
    fn revenue_at_stake(insight: &Insight, monthly_revenue: f64) -> f64 {
        match &insight.evidence {
            InsightEvidence::Trend {
                strength,
                percent_change,
                ..
            } => strength.factor() * percent_change.abs() / 100.0 * monthly_revenue,
            InsightEvidence::Anomaly {
                severity,
                deviation_pct,
                ..
            } => severity.factor() * deviation_pct.abs() / 100.0 * monthly_revenue,
            InsightEvidence::Performance {
                monthly_revenue_gap,
                ..
            } => monthly_revenue_gap.abs() * PERFORMANCE_CAPTURE_RATE,
            InsightEvidence::Recommendation {
                estimated_revenue, ..
            } => estimated_revenue
                .map(f64::abs)
                .unwrap_or(monthly_revenue * DEFAULT_RECOMMENDATION_SHARE),
            InsightEvidence::Alert {
                estimated_revenue, ..
            } => estimated_revenue
                .map(f64::abs)
                .unwrap_or(monthly_revenue * DEFAULT_ALERT_SHARE),
        }
    }

    /// Revenue impact score (1-10) as a share of monthly revenue
    pub fn revenue_impact(&self, insight: &Insight, context: &BusinessContext) -> f64 {
        let monthly = context.monthly_revenue;
        if monthly <= 0.0 || !monthly.is_finite() {
            return MIN_SCORE;
        }

        let importance = if insight.affected_metrics.is_empty() {
            1.0
        } else {
            insight
                .affected_metrics
                .iter()
                .map(|m| m.importance())
                .sum::<f64>()
                / insight.affected_metrics.len() as f64
        };

        let amount = Self::revenue_at_stake(insight, monthly)
            * context.business_size.impact_multiplier()
            * importance
            * insight.confidence.clamp(0.0, 1.0).sqrt();
        let percent = amount / monthly * 100.0;

        REVENUE_BUCKETS
            .iter()
            .find(|(threshold, _)| percent >= *threshold)
            .map(|(_, score)| *score)
            .unwrap_or(MIN_SCORE)
    }

    /// Urgency score (1-10) from insight kind, age and the time context
    pub fn urgency_score(&self, insight: &Insight, time: &TimeContext) -> f64 {
        let kind = insight.kind();
        let mut score: f64 = match kind {
            InsightKind::Alert => 9.0,
            InsightKind::Anomaly => 8.0,
            InsightKind::Trend => 6.0,
            InsightKind::Performance => 5.0,
            InsightKind::Recommendation => 4.0,
        };

        if let Some(observed_at) = insight.evidence.observed_at() {
            let age_hours = (time.now - observed_at).num_hours();
            if age_hours > 72 {
                score -= 2.0;
            } else if age_hours > 24 {
                score -= 1.0;
            }
        }

        score *= time
            .business_cycle
            .map(|c| c.urgency_multiplier())
            .unwrap_or(1.0);
        score *= time
            .seasonal_context
            .map(|s| s.urgency_multiplier())
            .unwrap_or(1.0);
        if time.competitive_event {
            score += 1.0;
        }
        score *= time
            .market_condition
            .map(|m| m.urgency_multiplier())
            .unwrap_or(1.0);

        if kind == InsightKind::Alert && time.is_weekend() {
            score *= 0.9;
        }

        clamp_score(score.round())
    }

    /// Implementation ease (1-10); higher means easier to act on
    pub fn implementation_score(&self, insight: &Insight, context: &BusinessContext) -> f64 {
        let mut score = 5.0;

        for signal in self.signals.detect(insight) {
            score += signal.delta();
        }

        let threshold = context.business_size.budget_threshold();
        if context.monthly_revenue >= threshold * 2.0 {
            score += 1.0;
        } else if context.monthly_revenue < threshold {
            score -= 1.0;
        }

        if context.primary_channels.len() > 3 {
            score -= 1.0;
        }

        clamp_score(score)
    }

    pub fn components(
        &self,
        insight: &Insight,
        context: &BusinessContext,
        time: &TimeContext,
    ) -> ImpactComponents {
        ImpactComponents {
            revenue_impact: self.revenue_impact(insight, context),
            urgency_score: self.urgency_score(insight, time),
            implementation_score: self.implementation_score(insight, context),
            confidence_level: if insight.confidence.is_finite() {
                insight.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Weighted combination with diminishing returns above 7, one decimal
    pub fn calculate_overall_impact(&self, components: &ImpactComponents) -> f64 {
        let mut score = 0.4 * components.revenue_impact
            + 0.3 * components.urgency_score
            + 0.2 * components.implementation_score
            + 0.1 * (components.confidence_level * 10.0);

        if score > DIMINISHING_THRESHOLD {
            score = DIMINISHING_THRESHOLD + (score - DIMINISHING_THRESHOLD) * DIMINISHING_RATE;
        }

        round1(clamp_score(score))
    }

    /// Priority bucket and a templated explanation
    pub fn calculate_insight_priority(
        &self,
        components: &ImpactComponents,
        overall: f64,
    ) -> (Priority, String) {
        let revenue = components.revenue_impact;
        let urgency = components.urgency_score;

        let priority = if (urgency >= 8.0 && revenue >= 7.0) || overall >= 9.0 {
            Priority::Critical
        } else if overall >= 7.0 || (urgency >= 7.0 && revenue >= 6.0) {
            Priority::High
        } else if overall >= 5.0 {
            Priority::Medium
        } else {
            Priority::Low
        };

        let mut factors = Vec::new();
        if revenue >= 7.0 {
            factors.push(format!("high revenue impact ({:.0}/10)", revenue));
        }
        if urgency >= 7.0 {
            factors.push(format!("time-sensitive ({:.0}/10)", urgency));
        }
        if components.implementation_score >= 7.0 {
            factors.push("easy to act on".to_string());
        } else if components.implementation_score <= 3.0 {
            factors.push("complex to implement".to_string());
        }
        if components.confidence_level >= 0.8 {
            factors.push(format!(
                "high confidence ({:.0}%)",
                components.confidence_level * 100.0
            ));
        } else if components.confidence_level < 0.5 {
            factors.push("low confidence".to_string());
        }

        let drivers = if factors.is_empty() {
            "no single dominant factor".to_string()
        } else {
            factors.join(", ")
        };

        let reasoning = format!(
            "{} priority (score {:.1}/10): {}",
            capitalize(priority.as_str()),
            overall,
            drivers
        );
        (priority, reasoning)
    }

    /// Score one insight; writes the score and priority back into it
    pub fn score_insight(
        &self,
        mut insight: Insight,
        context: &BusinessContext,
        time: &TimeContext,
    ) -> ScoredInsight {
        let components = self.components(&insight, context, time);
        let overall = self.calculate_overall_impact(&components);
        let (priority, reasoning) = self.calculate_insight_priority(&components, overall);

        insight.impact_score = overall;
        insight.confidence = components.confidence_level;
        insight.metadata.priority = Some(priority);
        insight.metadata.priority_reasoning = Some(reasoning.clone());

        ScoredInsight {
            insight,
            components,
            overall_score: overall,
            priority,
            reasoning,
        }
    }

    /// Score a batch; stable sort by overall score, descending
    pub fn score_insights_batch(
        &self,
        insights: Vec<Insight>,
        context: &BusinessContext,
        time: &TimeContext,
    ) -> Vec<ScoredInsight> {
        let mut scored: Vec<ScoredInsight> = insights
            .into_iter()
            .map(|insight| self.score_insight(insight, context, time))
            .collect();
        scored.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
        scored
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{Severity, TrendDirection, TrendStrength};
    use crate::models::{
        BusinessCycle, BusinessSize, InsightMetadata, MarketCondition, MetricKind, OrgId,
        RecommendationBasis, SeasonalContext,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};

    /// Wednesday noon
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap()
    }

    fn insight(evidence: InsightEvidence, metrics: Vec<MetricKind>, confidence: f64) -> Insight {
        Insight {
            id: "test".to_string(),
            org_id: OrgId::from("acme"),
            evidence,
            title: String::new(),
            description: String::new(),
            recommendation: String::new(),
            impact_score: 1.0,
            confidence,
            affected_metrics: metrics,
            timeframe: "30 days".to_string(),
            sample_count: 30,
            created_at: now(),
            metadata: InsightMetadata {
                algorithm: "test".to_string(),
                parameters: serde_json::Value::Null,
                data_quality_score: 1.0,
                priority: None,
                priority_reasoning: None,
            },
        }
    }

    fn trend(percent_change: f64, strength: TrendStrength) -> InsightEvidence {
        InsightEvidence::Trend {
            direction: TrendDirection::Increasing,
            strength,
            percent_change,
            p_value: 0.001,
        }
    }

    fn alert(observed_at: DateTime<Utc>) -> InsightEvidence {
        InsightEvidence::Alert {
            severity: Severity::Critical,
            deviation_pct: -70.0,
            observed: 30.0,
            expected: 100.0,
            observed_at,
            estimated_revenue: None,
        }
    }

    fn context(size: BusinessSize, monthly_revenue: f64) -> BusinessContext {
        BusinessContext {
            business_size: size,
            monthly_revenue,
            ..Default::default()
        }
    }

    #[test]
    fn test_revenue_impact_buckets() {
        let scorer = ImpactScorer::default();
        let ctx = context(BusinessSize::Small, 10_000.0);

        // 25% of monthly revenue
        let strong = insight(trend(25.0, TrendStrength::Strong), vec![MetricKind::Revenue], 1.0);
        assert_eq!(scorer.revenue_impact(&strong, &ctx), 8.0);

        // 0.3 x 20% = 6%
        let weak = insight(trend(20.0, TrendStrength::Weak), vec![MetricKind::Revenue], 1.0);
        assert_eq!(scorer.revenue_impact(&weak, &ctx), 5.0);

        // Tiny change
        let tiny = insight(trend(0.5, TrendStrength::Strong), vec![MetricKind::Revenue], 1.0);
        assert_eq!(scorer.revenue_impact(&tiny, &ctx), 1.0);
    }

    #[test]
    fn test_revenue_impact_size_and_confidence() {
        let scorer = ImpactScorer::default();
        let gap = InsightEvidence::Performance {
            channel: "retail".to_string(),
            best_channel: "online".to_string(),
            monthly_revenue_gap: 4_000.0,
            p_value: 0.01,
        };
        // 2000 x sqrt(0.81) = 1800 -> 18%
        let perf = insight(gap, vec![MetricKind::Revenue], 0.81);
        assert_eq!(
            scorer.revenue_impact(&perf, &context(BusinessSize::Small, 10_000.0)),
            7.0
        );
        // x 1.3 -> 23.4%
        assert_eq!(
            scorer.revenue_impact(&perf, &context(BusinessSize::Micro, 10_000.0)),
            8.0
        );
    }

    #[test]
    fn test_revenue_impact_defaults_and_zero_revenue() {
        let scorer = ImpactScorer::default();
        let rec = insight(
            InsightEvidence::Recommendation {
                basis: RecommendationBasis::Correlation {
                    driver: MetricKind::Sessions,
                    outcome: MetricKind::Orders,
                    coefficient: 0.9,
                },
                estimated_revenue: None,
            },
            vec![],
            1.0,
        );
        // 5% default share
        assert_eq!(
            scorer.revenue_impact(&rec, &context(BusinessSize::Small, 10_000.0)),
            5.0
        );
        assert_eq!(scorer.revenue_impact(&rec, &context(BusinessSize::Small, 0.0)), 1.0);
        assert_eq!(
            scorer.revenue_impact(&rec, &context(BusinessSize::Small, -50.0)),
            1.0
        );
    }

    #[test]
    fn test_urgency_age_decay() {
        let scorer = ImpactScorer::default();
        let time = TimeContext::at(now());

        let fresh = insight(alert(now() - Duration::hours(2)), vec![], 0.9);
        assert_eq!(scorer.urgency_score(&fresh, &time), 9.0);

        let day_old = insight(alert(now() - Duration::hours(30)), vec![], 0.9);
        assert_eq!(scorer.urgency_score(&day_old, &time), 8.0);

        let stale = insight(alert(now() - Duration::hours(100)), vec![], 0.9);
        assert_eq!(scorer.urgency_score(&stale, &time), 7.0);

        let rec = insight(trend(10.0, TrendStrength::Strong), vec![], 0.9);
        assert_eq!(scorer.urgency_score(&rec, &time), 6.0);
    }

    #[test]
    fn test_urgency_multipliers_and_clamp() {
        let scorer = ImpactScorer::default();
        let mut time = TimeContext::at(now());
        time.business_cycle = Some(BusinessCycle::Peak);

        // 6 x 1.3 = 7.8
        let t = insight(trend(10.0, TrendStrength::Strong), vec![], 0.9);
        assert_eq!(scorer.urgency_score(&t, &time), 8.0);

        time.seasonal_context = Some(SeasonalContext::HighSeason);
        time.competitive_event = true;
        time.market_condition = Some(MarketCondition::Volatile);
        let a = insight(alert(now()), vec![], 0.9);
        assert_eq!(scorer.urgency_score(&a, &time), 10.0);
    }

    #[test]
    fn test_urgency_weekend_alert() {
        let scorer = ImpactScorer::default();
        let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let time = TimeContext::at(saturday);

        // 9 x 0.9 = 8.1
        let a = insight(alert(saturday), vec![], 0.9);
        assert_eq!(scorer.urgency_score(&a, &time), 8.0);
    }

    #[test]
    fn test_implementation_score() {
        let scorer = ImpactScorer::default();

        let mut hard = insight(trend(10.0, TrendStrength::Strong), vec![], 0.9);
        hard.recommendation = "Integrate your POS with a new platform".to_string();
        // 5 - 2 - 1.5 - 1 (micro below budget threshold) = 0.5 -> 1
        assert_eq!(
            scorer.implementation_score(&hard, &context(BusinessSize::Micro, 8_000.0)),
            1.0
        );

        let mut easy = insight(trend(10.0, TrendStrength::Strong), vec![], 0.9);
        easy.recommendation = "Adjust prices immediately".to_string();
        // 5 + 2 + 1 (at least twice the threshold)
        assert_eq!(
            scorer.implementation_score(&easy, &context(BusinessSize::Small, 120_000.0)),
            8.0
        );

        let mut ctx = context(BusinessSize::Small, 60_000.0);
        ctx.primary_channels = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let plain = insight(trend(10.0, TrendStrength::Strong), vec![], 0.9);
        assert_eq!(scorer.implementation_score(&plain, &ctx), 4.0);
    }

    struct AlwaysImmediate;

    impl ComplexitySignals for AlwaysImmediate {
        fn detect(&self, _insight: &Insight) -> Vec<ComplexitySignal> {
            vec![ComplexitySignal::Immediate]
        }
    }

    #[test]
    fn test_custom_signal_detector() {
        let scorer = ImpactScorer::new(Arc::new(AlwaysImmediate));
        let plain = insight(trend(10.0, TrendStrength::Strong), vec![], 0.9);
        assert_eq!(
            scorer.implementation_score(&plain, &context(BusinessSize::Small, 60_000.0)),
            7.0
        );
    }

    #[test]
    fn test_overall_impact_diminishing_returns() {
        let scorer = ImpactScorer::default();
        let components = ImpactComponents {
            revenue_impact: 8.0,
            urgency_score: 9.0,
            implementation_score: 5.0,
            confidence_level: 0.9,
        };
        // 3.2 + 2.7 + 1.0 + 0.9 = 7.8 -> 7 + 0.8 x 0.7 = 7.56
        assert_eq!(scorer.calculate_overall_impact(&components), 7.6);

        let max = ImpactComponents {
            revenue_impact: 10.0,
            urgency_score: 10.0,
            implementation_score: 10.0,
            confidence_level: 1.0,
        };
        assert_eq!(scorer.calculate_overall_impact(&max), 9.1);

        let min = ImpactComponents {
            revenue_impact: 1.0,
            urgency_score: 1.0,
            implementation_score: 1.0,
            confidence_level: 0.0,
        };
        assert_eq!(scorer.calculate_overall_impact(&min), 1.0);
    }

    #[test]
    fn test_priority_rules() {
        let scorer = ImpactScorer::default();
        let c = |revenue, urgency| ImpactComponents {
            revenue_impact: revenue,
            urgency_score: urgency,
            implementation_score: 5.0,
            confidence_level: 0.7,
        };

        assert_eq!(scorer.calculate_insight_priority(&c(7.0, 8.0), 6.0).0, Priority::Critical);
        assert_eq!(scorer.calculate_insight_priority(&c(3.0, 3.0), 9.0).0, Priority::Critical);
        assert_eq!(scorer.calculate_insight_priority(&c(6.0, 7.0), 6.0).0, Priority::High);
        assert_eq!(scorer.calculate_insight_priority(&c(5.0, 5.0), 7.0).0, Priority::High);
        assert_eq!(scorer.calculate_insight_priority(&c(5.0, 5.0), 5.0).0, Priority::Medium);
        assert_eq!(scorer.calculate_insight_priority(&c(2.0, 2.0), 4.9).0, Priority::Low);

        let (_, reasoning) = scorer.calculate_insight_priority(&c(7.0, 8.0), 6.0);
        assert!(reasoning.starts_with("Critical priority"));
        assert!(reasoning.contains("high revenue impact"));
    }

    #[test]
    fn test_batch_sorted_and_bounded() {
        let scorer = ImpactScorer::default();
        let ctx = context(BusinessSize::Small, 10_000.0);
        let time = TimeContext::at(now());

        let insights = vec![
            insight(trend(1.0, TrendStrength::Weak), vec![MetricKind::Sessions], 0.3),
            insight(alert(now()), vec![MetricKind::Revenue], 0.95),
            insight(trend(40.0, TrendStrength::Strong), vec![MetricKind::Revenue], 1.4),
            insight(trend(1.0, TrendStrength::Weak), vec![MetricKind::Sessions], 0.3),
        ];

        let scored = scorer.score_insights_batch(insights, &ctx, &time);
        assert_eq!(scored.len(), 4);
        for pair in scored.windows(2) {
            assert!(pair[0].overall_score >= pair[1].overall_score);
        }
        for s in &scored {
            assert!((1.0..=10.0).contains(&s.overall_score));
            assert!((0.0..=1.0).contains(&s.insight.confidence));
            assert_eq!(s.insight.impact_score, s.overall_score);
            assert_eq!(s.insight.metadata.priority, Some(s.priority));
        }

        let again = scorer.score_insights_batch(
            scored.iter().map(|s| s.insight.clone()).collect(),
            &ctx,
            &time,
        );
        let scores: Vec<f64> = scored.iter().map(|s| s.overall_score).collect();
        let scores_again: Vec<f64> = again.iter().map(|s| s.overall_score).collect();
        assert_eq!(scores, scores_again);
    }
}
