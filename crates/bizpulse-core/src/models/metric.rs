//! Metric series models
//!
//! Samples arrive from the data provider ordered by time. Analyses run on
//! per-day totals built with [`daily_totals`].

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Newtype for organization (tenant) ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OrgId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OrgId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrgId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Business metric kinds understood by the engine
///
/// The snake_case name doubles as the cache tag for the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Revenue,
    Orders,
    Sessions,
    Conversions,
    Customers,
    AverageOrderValue,
}

impl MetricKind {
    /// All known metric kinds
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Revenue,
        MetricKind::Orders,
        MetricKind::Sessions,
        MetricKind::Conversions,
        MetricKind::Customers,
        MetricKind::AverageOrderValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Orders => "orders",
            Self::Sessions => "sessions",
            Self::Conversions => "conversions",
            Self::Customers => "customers",
            Self::AverageOrderValue => "average_order_value",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Revenue => "Revenue",
            Self::Orders => "Orders",
            Self::Sessions => "Sessions",
            Self::Conversions => "Conversions",
            Self::Customers => "Customers",
            Self::AverageOrderValue => "Average order value",
        }
    }

    /// Relative business importance, used to weight revenue impact
    pub fn importance(&self) -> f64 {
        match self {
            Self::Revenue => 1.0,
            Self::Conversions => 0.9,
            Self::Orders => 0.8,
            Self::AverageOrderValue => 0.8,
            Self::Customers => 0.7,
            Self::Sessions => 0.5,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "revenue" => Ok(Self::Revenue),
            "orders" => Ok(Self::Orders),
            "sessions" => Ok(Self::Sessions),
            "conversions" => Ok(Self::Conversions),
            "customers" => Ok(Self::Customers),
            "average_order_value" | "aov" => Ok(Self::AverageOrderValue),
            other => Err(format!("unknown metric '{}'", other)),
        }
    }
}

/// One observation of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// Originating channel/integration (e.g. "shopify", "google_ads")
    #[serde(default)]
    pub source: String,
    pub metric: MetricKind,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64, metric: MetricKind) -> Self {
        Self {
            timestamp,
            value,
            source: String::new(),
            metric,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Inclusive time range for provider fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Last N days up to now
    pub fn last_days(days: u32) -> Self {
        Self::ending_at(Utc::now(), days)
    }

    /// N days up to and including `end`
    pub fn ending_at(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - Duration::days(days as i64),
            end,
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Sum samples by UTC calendar date
///
/// Returns one sample per date (timestamp = midnight UTC), sorted
/// chronologically. The source tag of aggregated samples is dropped.
pub fn daily_totals(samples: &[MetricSample]) -> Vec<MetricSample> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let metric = first.metric;

    let mut by_day: BTreeMap<chrono::NaiveDate, f64> = BTreeMap::new();
    for sample in samples {
        if !sample.value.is_finite() {
            tracing::warn!(ts = %sample.timestamp, "Non-finite sample value, skipping");
            continue;
        }
        *by_day.entry(sample.timestamp.date_naive()).or_insert(0.0) += sample.value;
    }

    by_day
        .into_iter()
        .map(|(date, value)| MetricSample {
            timestamp: date.and_time(NaiveTime::MIN).and_utc(),
            value,
            source: String::new(),
            metric,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metric_kind_roundtrip_names() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_daily_totals_sums_sources_per_day() {
        let day1 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let day1_late = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();

        let samples = vec![
            MetricSample::new(day1, 100.0, MetricKind::Revenue).with_source("shop"),
            MetricSample::new(day1_late, 50.0, MetricKind::Revenue).with_source("ads"),
            MetricSample::new(day2, 70.0, MetricKind::Revenue).with_source("shop"),
        ];

        let daily = daily_totals(&samples);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].value, 150.0);
        assert_eq!(daily[1].value, 70.0);
        assert_eq!(daily[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_daily_totals_empty() {
        assert!(daily_totals(&[]).is_empty());
    }

    #[test]
    fn test_last_days_ends_now() {
        let before = Utc::now();
        let range = DateRange::last_days(30);
        assert!(range.end >= before);
        assert_eq!(range.end - range.start, Duration::days(30));
    }
}
