//! Insights engine
//!
//! Orchestrates one generation request: cache lookup, single-flight
//! deduplication, data quality gate, analysis families, scoring and
//! filtering. Every request is tracked as a job that can be polled.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheRegistry, CacheStats, InvalidationTrigger};
use crate::config::EngineConfig;
use crate::error::{CoreError, GenerationReport, ReportIssue};
use crate::event::{EngineEvent, EventBus};
use crate::models::{
    AnalysisFamily, BusinessContext, DateRange, GenerationJob, GenerationOutcome, Insight,
    JobStatusView, OrgId, TimeContext,
};
use crate::narrative::{NarrativeGenerator, TemplateNarrator};
use crate::provider::DataProvider;
use crate::scoring::ImpactScorer;

mod families;
pub mod jobs;
pub mod options;

use families::FamilyContext;
pub use jobs::JobTable;
pub use options::GenerationOptions;

const BUSINESS_CONTEXT_KEY: &str = "business_context";

/// Entry point for insight generation
///
/// Cheap to clone; clones share caches, jobs and the event bus.
#[derive(Clone)]
pub struct InsightsEngine {
    config: Arc<EngineConfig>,
    provider: Arc<dyn DataProvider>,
    narrator: Arc<dyn NarrativeGenerator>,
    scorer: ImpactScorer,
    insights_cache: Arc<CacheRegistry<Arc<GenerationOutcome>>>,
    context_cache: Arc<CacheRegistry<BusinessContext>>,
    jobs: JobTable,
    events: EventBus,
}

impl InsightsEngine {
    pub fn new(config: EngineConfig, provider: Arc<dyn DataProvider>) -> Result<Self, CoreError> {
        config.validate()?;
        let max_entries = config.cache.max_entries;
        let jobs = JobTable::new(config.job_retention());

        Ok(Self {
            config: Arc::new(config),
            provider,
            narrator: Arc::new(TemplateNarrator),
            scorer: ImpactScorer::default(),
            insights_cache: Arc::new(CacheRegistry::new(max_entries)),
            context_cache: Arc::new(CacheRegistry::new(max_entries)),
            jobs,
            events: EventBus::default_capacity(),
        })
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn NarrativeGenerator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn with_scorer(mut self, scorer: ImpactScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Generate insights and wait for the result
    pub async fn generate_insights(
        &self,
        org: &OrgId,
        options: GenerationOptions,
    ) -> Result<Arc<GenerationOutcome>, CoreError> {
        let job = self.jobs.create(org).await;
        self.execute(&job.id, org.clone(), options).await
    }

    /// Start generation in the background and return the job id
    pub async fn start_generation(&self, org: OrgId, options: GenerationOptions) -> String {
        let job = self.jobs.create(&org).await;
        let engine = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            // Outcome and error are recorded on the job
            if let Err(e) = engine.execute(&job_id, org, options).await {
                debug!(job_id = %job_id, error = %e, "Background generation ended with an error");
            }
        });
        job.id
    }

    pub async fn get_job_status(&self, job_id: &str) -> Result<JobStatusView, CoreError> {
        self.jobs
            .get(job_id)
            .await
            .map(|job| JobStatusView::from(&job))
            .ok_or_else(|| CoreError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Drop cached results and context for `org` per the triggers
    pub fn invalidate_cache(&self, org: &OrgId, triggers: &[InvalidationTrigger]) -> usize {
        let removed = self.insights_cache.invalidate(org, triggers)
            + self.context_cache.invalidate(org, triggers);
        let global = triggers.contains(&InvalidationTrigger::Global);
        info!(org = %org, removed, global, "Invalidated cache");
        self.events.publish(EngineEvent::CacheInvalidated {
            org_id: (!global).then(|| org.clone()),
            removed,
        });
        removed
    }

    /// Cached outcome for these options, if any
    pub fn cached_outcome(
        &self,
        org: &OrgId,
        options: &GenerationOptions,
    ) -> Option<Arc<GenerationOutcome>> {
        let key = options.clone().normalized().fingerprint(org);
        self.insights_cache.get(org)?.get(&key)
    }

    /// Counters across both caches
    pub fn cache_stats(&self) -> CacheStats {
        let mut stats = self.insights_cache.stats();
        stats.merge(&self.context_cache.stats());
        stats
    }

    /// Remove an organization's caches entirely
    pub fn destroy_org_cache(&self, org: &OrgId) -> bool {
        let insights = self.insights_cache.destroy(org);
        let context = self.context_cache.destroy(org);
        insights || context
    }

    /// Periodically sweep expired cache entries and finished jobs
    pub fn start_maintenance(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let interval = self.config.cache.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed =
                    engine.insights_cache.sweep_expired() + engine.context_cache.sweep_expired();
                engine.jobs.run_pending_tasks().await;
                if removed > 0 {
                    info!(removed, "Swept expired cache entries");
                    engine.events.publish(EngineEvent::CacheSwept { removed });
                }
            }
        })
    }

    /// Drive one job from pending to a terminal state
    async fn execute(
        &self,
        job_id: &str,
        org: OrgId,
        options: GenerationOptions,
    ) -> Result<Arc<GenerationOutcome>, CoreError> {
        self.jobs.update(job_id, GenerationJob::start).await;
        self.events.publish(EngineEvent::JobStarted {
            job_id: job_id.to_string(),
            org_id: org.clone(),
        });

        match self.generate(&org, options, job_id).await {
            Ok(outcome) => {
                let insight_count = outcome.insights.len();
                let stored = Arc::clone(&outcome);
                self.jobs.update(job_id, move |j| j.complete(stored)).await;
                info!(org = %org, job_id, insight_count, "Generation completed");
                self.events.publish(EngineEvent::JobCompleted {
                    job_id: job_id.to_string(),
                    org_id: org,
                    insight_count,
                });
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                let stored = message.clone();
                self.jobs.update(job_id, move |j| j.fail(stored)).await;
                warn!(org = %org, job_id, error = %message, "Generation failed");
                self.events.publish(EngineEvent::JobFailed {
                    job_id: job_id.to_string(),
                    org_id: org,
                    error: message,
                });
                Err(e)
            }
        }
    }

    /// Cache lookup, then one shared computation per fingerprint
    async fn generate(
        &self,
        org: &OrgId,
        options: GenerationOptions,
        job_id: &str,
    ) -> Result<Arc<GenerationOutcome>, CoreError> {
        let options = options.normalized();
        if !self.config.cache.enabled {
            return self.compute(org, &options, job_id).await.map(Arc::new);
        }

        let key = options.fingerprint(org);
        let cache = self.insights_cache.get_or_create(org);
        if !options.force_refresh {
            if let Some(hit) = cache.get(&key) {
                debug!(org = %org, "Serving insights from cache");
                return Ok(hit);
            }
        }

        let engine = self.clone();
        let org_owned = org.clone();
        let key_owned = key.clone();
        let leader_job = job_id.to_string();
        cache
            .deduplicate(&key, move || async move {
                let cache = engine.insights_cache.get_or_create(&org_owned);
                // A leader may have finished between our lookup and joining
                if !options.force_refresh {
                    if let Some(hit) = cache.get(&key_owned) {
                        return Ok(hit);
                    }
                }
                let outcome = Arc::new(engine.compute(&org_owned, &options, &leader_job).await?);
                cache.set(
                    key_owned,
                    Arc::clone(&outcome),
                    engine.config.cache.ttl(),
                    outcome_tags(&outcome),
                );
                Ok(outcome)
            })
            .await
    }

    async fn compute(
        &self,
        org: &OrgId,
        options: &GenerationOptions,
        job_id: &str,
    ) -> Result<GenerationOutcome, CoreError> {
        let window_days = options.window_days.unwrap_or(self.config.window_days);
        let range = match options.as_of {
            Some(as_of) => DateRange::ending_at(as_of, window_days),
            None => DateRange::last_days(window_days),
        };
        let now = range.end;
        info!(org = %org, window_days, "Generating insights");

        let (context, fetched) = self.business_context(org).await?;
        self.progress(job_id, 10).await;

        let metrics = self
            .provider
            .list_available_metrics(org)
            .await
            .map_err(|e| CoreError::provider("list_available_metrics", e))?;
        self.progress(job_id, 20).await;

        let quality = self
            .provider
            .validate_data_quality(org, &range)
            .await
            .map_err(|e| CoreError::provider("validate_data_quality", e))?;
        // NaN scores fail the gate too
        if !quality.score.is_finite() || quality.score < self.config.min_data_quality {
            warn!(
                org = %org,
                score = quality.score,
                threshold = self.config.min_data_quality,
                "Data quality below threshold"
            );
            return Err(CoreError::DataQualityTooLow {
                score: quality.score,
                threshold: self.config.min_data_quality,
                issues: quality.issues,
            });
        }
        if fetched {
            self.remember_business_context(org, &context);
        }
        self.progress(job_id, 30).await;

        let mut report = GenerationReport::new();
        report.data_quality_score = Some(quality.score);
        for issue in &quality.issues {
            report.add_issue(
                ReportIssue::warning("data_quality", issue.clone())
                    .with_suggestion("Results may be partial until the feed recovers"),
            );
        }

        let ctx = FamilyContext {
            org,
            range: &range,
            metrics: &metrics,
            provider: self.provider.as_ref(),
            narrator: self.narrator.as_ref(),
            config: &self.config,
            quality_score: quality.score,
            now,
        };
        let insights = self.run_families(&ctx, &mut report).await;
        self.progress(job_id, 70).await;

        let time = TimeContext::from_business(now, &context);
        let mut scored = self.scorer.score_insights_batch(insights, &context, &time);

        let min_confidence = options
            .min_confidence
            .unwrap_or(self.config.confidence_threshold);
        scored.retain(|s| s.insight.confidence >= min_confidence);
        if let Some(allowed) = &options.metrics {
            scored.retain(|s| s.insight.touches_any(allowed));
        }
        if let Some(max) = options.max_insights {
            scored.truncate(max);
        }
        self.progress(job_id, 90).await;

        debug!(
            org = %org,
            kept = scored.len(),
            produced = report.total_produced(),
            "Scored and filtered insights"
        );

        Ok(GenerationOutcome {
            org_id: org.clone(),
            insights: scored,
            analyzed_metrics: metrics,
            report,
            generated_at: now,
        })
    }

    /// Run enabled families; failures become report entries, never errors
    async fn run_families(
        &self,
        ctx: &FamilyContext<'_>,
        report: &mut GenerationReport,
    ) -> Vec<Insight> {
        let results: Vec<(AnalysisFamily, Result<Vec<Insight>, CoreError>)> =
            if self.config.parallel_processing {
                let (trends, anomalies, performance, recommendations) = tokio::join!(
                    self.run_family(AnalysisFamily::Trends, ctx),
                    self.run_family(AnalysisFamily::Anomalies, ctx),
                    self.run_family(AnalysisFamily::Performance, ctx),
                    self.run_family(AnalysisFamily::Recommendations, ctx),
                );
                [trends, anomalies, performance, recommendations]
                    .into_iter()
                    .flatten()
                    .collect()
            } else {
                let mut results = Vec::new();
                for family in AnalysisFamily::ALL {
                    results.extend(self.run_family(family, ctx).await);
                }
                results
            };

        let mut insights = Vec::new();
        for (family, result) in results {
            match result {
                Ok(produced) => {
                    report.record_success(family, produced.len());
                    insights.extend(produced);
                }
                Err(e) => {
                    warn!(org = %ctx.org, family = %family, error = %e, "Analysis family failed");
                    report.record_failure(
                        family,
                        &CoreError::AnalysisFailed {
                            family,
                            message: e.to_string(),
                        },
                    );
                }
            }
        }
        insights
    }

    async fn run_family(
        &self,
        family: AnalysisFamily,
        ctx: &FamilyContext<'_>,
    ) -> Option<(AnalysisFamily, Result<Vec<Insight>, CoreError>)> {
        if !self.config.analyses.is_enabled(family) {
            return None;
        }
        Some((family, families::run(family, ctx).await))
    }

    /// Cached context, or a fresh fetch flagged `true`
    ///
    /// Fresh contexts are only cached once the request passes the quality
    /// gate, so a failed request leaves no entry behind.
    async fn business_context(&self, org: &OrgId) -> Result<(BusinessContext, bool), CoreError> {
        if self.config.cache.enabled {
            let cached = self
                .context_cache
                .get_or_create(org)
                .get(BUSINESS_CONTEXT_KEY);
            if let Some(hit) = cached {
                return Ok((hit, false));
            }
        }

        let context = self
            .provider
            .fetch_business_context(org)
            .await
            .map_err(|e| CoreError::provider("fetch_business_context", e))?;
        Ok((context, true))
    }

    fn remember_business_context(&self, org: &OrgId, context: &BusinessContext) {
        if !self.config.cache.enabled {
            return;
        }
        self.context_cache.get_or_create(org).set(
            BUSINESS_CONTEXT_KEY,
            context.clone(),
            self.config.cache.context_ttl(),
            [org.as_str(), "business_context", "settings"],
        );
    }

    async fn progress(&self, job_id: &str, progress: u8) {
        if self
            .jobs
            .update(job_id, |j| j.advance(progress))
            .await
            .is_some()
        {
            self.events.publish(EngineEvent::JobProgress {
                job_id: job_id.to_string(),
                progress,
            });
        }
    }
}

/// Tags for a cached outcome: org, `insights`, every analyzed metric and
/// the kinds and metrics of the kept insights
fn outcome_tags(outcome: &GenerationOutcome) -> Vec<String> {
    let mut tags = vec![outcome.org_id.to_string(), "insights".to_string()];
    tags.extend(outcome.analyzed_metrics.iter().map(|m| m.as_str().to_string()));
    for scored in &outcome.insights {
        tags.push(scored.insight.kind().as_str().to_string());
        tags.extend(
            scored
                .insight
                .affected_metrics
                .iter()
                .map(|m| m.as_str().to_string()),
        );
    }
    tags.sort();
    tags.dedup();
    tags
}
