//! Data provider seam
//!
//! The engine reads metrics and tenant context through [`DataProvider`].
//! [`InMemoryDataProvider`] serves JSON fixtures, counts calls per operation
//! and can inject latency or failures.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::error::CoreError;
use crate::models::{BusinessContext, DataQualityReport, DateRange, MetricKind, MetricSample, OrgId};

/// Read-only access to a tenant's metrics and settings
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Samples for one metric within `range`, ordered by time
    async fn fetch_series(
        &self,
        org: &OrgId,
        metric: MetricKind,
        range: &DateRange,
    ) -> Result<Vec<MetricSample>>;

    async fn fetch_business_context(&self, org: &OrgId) -> Result<BusinessContext>;

    async fn validate_data_quality(&self, org: &OrgId, range: &DateRange)
        -> Result<DataQualityReport>;

    async fn list_available_metrics(&self, org: &OrgId) -> Result<Vec<MetricKind>>;
}

/// Provider operations, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOperation {
    FetchSeries,
    FetchBusinessContext,
    ValidateDataQuality,
    ListAvailableMetrics,
}

impl ProviderOperation {
    const ALL: [ProviderOperation; 4] = [
        ProviderOperation::FetchSeries,
        ProviderOperation::FetchBusinessContext,
        ProviderOperation::ValidateDataQuality,
        ProviderOperation::ListAvailableMetrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchSeries => "fetch_series",
            Self::FetchBusinessContext => "fetch_business_context",
            Self::ValidateDataQuality => "validate_data_quality",
            Self::ListAvailableMetrics => "list_available_metrics",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::FetchSeries => 0,
            Self::FetchBusinessContext => 1,
            Self::ValidateDataQuality => 2,
            Self::ListAvailableMetrics => 3,
        }
    }
}

impl fmt::Display for ProviderOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact daily series in a fixture: one value per day from `start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySeries {
    pub metric: MetricKind,
    #[serde(default)]
    pub source: String,
    pub start: NaiveDate,
    pub values: Vec<f64>,
}

impl DailySeries {
    fn expand(&self) -> impl Iterator<Item = MetricSample> + '_ {
        self.start
            .iter_days()
            .zip(self.values.iter())
            .map(move |(date, &value)| {
                MetricSample::new(date.and_time(NaiveTime::MIN).and_utc(), value, self.metric)
                    .with_source(self.source.clone())
            })
    }
}

/// One organization's data in a fixture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgFixture {
    pub context: BusinessContext,
    /// Computed from coverage when absent
    pub data_quality: Option<DataQualityReport>,
    pub samples: Vec<MetricSample>,
    pub series: Vec<DailySeries>,
}

impl OrgFixture {
    /// Expand compact series into samples and sort by time
    fn normalized(mut self) -> Self {
        let expanded: Vec<MetricSample> = self.series.iter().flat_map(|s| s.expand()).collect();
        self.samples.extend(expanded);
        self.series.clear();
        self.samples.sort_by_key(|s| s.timestamp);
        self
    }
}

/// Fixture file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    pub organizations: BTreeMap<String, OrgFixture>,
}

/// Fixture-backed provider for tests and the CLI
#[derive(Debug, Default)]
pub struct InMemoryDataProvider {
    orgs: RwLock<HashMap<OrgId, OrgFixture>>,
    latency: Option<Duration>,
    failing: RwLock<HashSet<ProviderOperation>>,
    calls: [AtomicUsize; 4],
}

impl InMemoryDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let provider = Self::new();
        for (org, data) in fixture.organizations {
            provider.insert_org(OrgId::new(org), data);
        }
        provider
    }

    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self, CoreError> {
        let fixture: Fixture =
            serde_json::from_str(json).map_err(|e| CoreError::FixtureParse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self::from_fixture(fixture))
    }

    /// Load a JSON fixture file
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::FixtureRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content, path)
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert_org(&self, org: OrgId, data: OrgFixture) {
        self.orgs.write().insert(org, data.normalized());
    }

    pub fn set_context(&self, org: &OrgId, context: BusinessContext) {
        self.orgs.write().entry(org.clone()).or_default().context = context;
    }

    pub fn set_data_quality(&self, org: &OrgId, report: DataQualityReport) {
        self.orgs.write().entry(org.clone()).or_default().data_quality = Some(report);
    }

    /// Append samples, keeping time order
    pub fn push_samples(&self, org: &OrgId, samples: impl IntoIterator<Item = MetricSample>) {
        let mut orgs = self.orgs.write();
        let data = orgs.entry(org.clone()).or_default();
        data.samples.extend(samples);
        data.samples.sort_by_key(|s| s.timestamp);
    }

    /// Make every subsequent `operation` call fail
    pub fn fail_operation(&self, operation: ProviderOperation) {
        self.failing.write().insert(operation);
    }

    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }

    pub fn call_count(&self, operation: ProviderOperation) -> usize {
        self.calls[operation.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        ProviderOperation::ALL
            .iter()
            .map(|op| self.call_count(*op))
            .sum()
    }

    pub fn organizations(&self) -> Vec<OrgId> {
        let mut orgs: Vec<OrgId> = self.orgs.read().keys().cloned().collect();
        orgs.sort();
        orgs
    }

    /// Timestamp of the newest sample for `org`
    pub fn latest_timestamp(&self, org: &OrgId) -> Option<DateTime<Utc>> {
        self.orgs
            .read()
            .get(org)
            .and_then(|d| d.samples.iter().map(|s| s.timestamp).max())
    }

    async fn enter(&self, operation: ProviderOperation, org: &OrgId) -> Result<()> {
        self.calls[operation.index()].fetch_add(1, Ordering::SeqCst);
        debug!(org = %org, operation = %operation, "Provider call");
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.read().contains(&operation) {
            return Err(anyhow!("injected failure for {}", operation));
        }
        Ok(())
    }

    fn with_org<T>(&self, org: &OrgId, f: impl FnOnce(&OrgFixture) -> T) -> Result<T> {
        let orgs = self.orgs.read();
        let data = orgs
            .get(org)
            .ok_or_else(|| anyhow!("unknown organization '{}'", org))?;
        Ok(f(data))
    }
}

/// Share of days in `range` with at least one sample
fn coverage_report(samples: &[MetricSample], range: &DateRange) -> DataQualityReport {
    let expected_days = range.days().max(1) as usize;
    let covered: BTreeSet<NaiveDate> = samples
        .iter()
        .filter(|s| range.contains(&s.timestamp))
        .map(|s| s.timestamp.date_naive())
        .collect();

    if covered.is_empty() {
        return DataQualityReport {
            score: 0.0,
            issues: vec!["No data in the requested range".to_string()],
        };
    }

    let score = (covered.len() as f64 / expected_days as f64).min(1.0);
    let mut issues = Vec::new();
    let missing = expected_days.saturating_sub(covered.len());
    if missing > 0 {
        issues.push(format!("{} of {} days have no data", missing, expected_days));
    }
    DataQualityReport { score, issues }
}

#[async_trait]
impl DataProvider for InMemoryDataProvider {
    async fn fetch_series(
        &self,
        org: &OrgId,
        metric: MetricKind,
        range: &DateRange,
    ) -> Result<Vec<MetricSample>> {
        self.enter(ProviderOperation::FetchSeries, org).await?;
        self.with_org(org, |data| {
            data.samples
                .iter()
                .filter(|s| s.metric == metric && range.contains(&s.timestamp))
                .cloned()
                .collect()
        })
    }

    async fn fetch_business_context(&self, org: &OrgId) -> Result<BusinessContext> {
        self.enter(ProviderOperation::FetchBusinessContext, org).await?;
        self.with_org(org, |data| data.context.clone())
    }

    async fn validate_data_quality(
        &self,
        org: &OrgId,
        range: &DateRange,
    ) -> Result<DataQualityReport> {
        self.enter(ProviderOperation::ValidateDataQuality, org).await?;
        self.with_org(org, |data| {
            data.data_quality
                .clone()
                .unwrap_or_else(|| coverage_report(&data.samples, range))
        })
    }

    async fn list_available_metrics(&self, org: &OrgId) -> Result<Vec<MetricKind>> {
        self.enter(ProviderOperation::ListAvailableMetrics, org).await?;
        self.with_org(org, |data| {
            let metrics: BTreeSet<MetricKind> = data.samples.iter().map(|s| s.metric).collect();
            metrics.into_iter().collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FIXTURE: &str = r#"{
        "organizations": {
            "acme": {
                "context": {"business_size": "micro", "monthly_revenue": 9000},
                "series": [
                    {"metric": "revenue", "source": "web", "start": "2024-01-01", "values": [100, 110, 120]},
                    {"metric": "orders", "start": "2024-01-02", "values": [5, 6]}
                ],
                "samples": [
                    {"timestamp": "2024-01-01T15:00:00Z", "value": 40, "source": "pos", "metric": "revenue"}
                ]
            }
        }
    }"#;

    fn provider() -> InMemoryDataProvider {
        InMemoryDataProvider::from_json_str(FIXTURE, Path::new("inline.json")).unwrap()
    }

    fn january() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fixture_series_are_expanded_and_ordered() {
        let p = provider();
        let org = OrgId::from("acme");

        let revenue = p.fetch_series(&org, MetricKind::Revenue, &january()).await.unwrap();
        assert_eq!(revenue.len(), 4);
        assert!(revenue.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(revenue[1].source, "pos");

        let metrics = p.list_available_metrics(&org).await.unwrap();
        assert_eq!(metrics, vec![MetricKind::Revenue, MetricKind::Orders]);

        let ctx = p.fetch_business_context(&org).await.unwrap();
        assert_eq!(ctx.monthly_revenue, 9000.0);
        assert_eq!(p.call_count(ProviderOperation::FetchSeries), 1);
        assert_eq!(p.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_coverage_quality_when_not_given() {
        let p = provider();
        let report = p
            .validate_data_quality(&OrgId::from("acme"), &january())
            .await
            .unwrap();
        // 3 covered days out of 30
        assert!((report.score - 0.1).abs() < 1e-9);
        assert_eq!(report.issues.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_org_and_injected_failures() {
        let p = provider();
        assert!(p
            .fetch_business_context(&OrgId::from("nobody"))
            .await
            .is_err());

        p.fail_operation(ProviderOperation::FetchSeries);
        let err = p
            .fetch_series(&OrgId::from("acme"), MetricKind::Revenue, &january())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fetch_series"));

        p.clear_failures();
        assert!(p
            .fetch_series(&OrgId::from("acme"), MetricKind::Revenue, &january())
            .await
            .is_ok());
    }

    #[test]
    fn test_load_missing_fixture() {
        let err = InMemoryDataProvider::load(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert!(matches!(err, CoreError::FixtureRead { .. }));
    }

    #[test]
    fn test_latest_timestamp() {
        let p = provider();
        assert_eq!(
            p.latest_timestamp(&OrgId::from("acme")),
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
        );
    }
}
