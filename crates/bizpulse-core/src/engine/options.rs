//! Per-request generation options

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MetricKind, OrgId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Keep only insights touching these metrics
    pub metrics: Option<Vec<MetricKind>>,
    /// Overrides the configured confidence threshold
    pub min_confidence: Option<f64>,
    pub max_insights: Option<usize>,
    /// Overrides the configured analysis window
    pub window_days: Option<u32>,
    /// End of the analysis window; now when unset
    pub as_of: Option<DateTime<Utc>>,
    /// Skip the cache lookup (the result is still cached)
    pub force_refresh: bool,
}

/// Options that determine the result, in canonical form
#[derive(Serialize)]
struct FingerprintKey<'a> {
    metrics: &'a Option<Vec<MetricKind>>,
    min_confidence: Option<f64>,
    max_insights: Option<usize>,
    window_days: Option<u32>,
    as_of: Option<DateTime<Utc>>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = MetricKind>) -> Self {
        self.metrics = Some(metrics.into_iter().collect());
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    pub fn with_max_insights(mut self, max_insights: usize) -> Self {
        self.max_insights = Some(max_insights);
        self
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = Some(days);
        self
    }

    pub fn as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    /// Sorted, deduplicated metric list; an empty list means no filter
    pub fn normalized(mut self) -> Self {
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.sort();
            metrics.dedup();
        }
        if self.metrics.as_ref().is_some_and(|m| m.is_empty()) {
            self.metrics = None;
        }
        if let Some(min) = self.min_confidence {
            self.min_confidence = Some(min.clamp(0.0, 1.0));
        }
        self
    }

    /// Cache key for these options; `force_refresh` does not participate
    ///
    /// Call on normalized options so equivalent requests share a key.
    pub fn fingerprint(&self, org: &OrgId) -> String {
        let key = FingerprintKey {
            metrics: &self.metrics,
            min_confidence: self.min_confidence,
            max_insights: self.max_insights,
            window_days: self.window_days,
            as_of: self.as_of,
        };
        let encoded = serde_json::to_string(&key).unwrap_or_default();
        format!("insights:{}:{}", org, encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_metric_order_and_refresh() {
        let org = OrgId::from("acme");
        let a = GenerationOptions::new()
            .with_metrics([MetricKind::Orders, MetricKind::Revenue, MetricKind::Orders])
            .normalized();
        let b = GenerationOptions::new()
            .with_metrics([MetricKind::Revenue, MetricKind::Orders])
            .force_refresh()
            .normalized();

        assert_eq!(a.fingerprint(&org), b.fingerprint(&org));
        assert_eq!(a.metrics, Some(vec![MetricKind::Revenue, MetricKind::Orders]));
    }

    #[test]
    fn test_fingerprint_distinguishes_org_and_options() {
        let opts = GenerationOptions::new().normalized();
        assert_ne!(
            opts.fingerprint(&OrgId::from("acme")),
            opts.fingerprint(&OrgId::from("globex"))
        );
        assert_ne!(
            opts.fingerprint(&OrgId::from("acme")),
            opts.clone()
                .with_max_insights(3)
                .fingerprint(&OrgId::from("acme"))
        );
        assert!(opts.fingerprint(&OrgId::from("acme")).starts_with("insights:acme:"));
    }

    #[test]
    fn test_empty_metric_list_means_no_filter() {
        let opts = GenerationOptions::new()
            .with_metrics(Vec::new())
            .normalized();
        assert!(opts.metrics.is_none());
        assert_eq!(
            opts.fingerprint(&OrgId::from("acme")),
            GenerationOptions::new().normalized().fingerprint(&OrgId::from("acme"))
        );
    }
}
