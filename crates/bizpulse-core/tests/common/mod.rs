//! Shared fixture for integration tests

#![allow(dead_code)]

use bizpulse_core::models::{BusinessContext, BusinessSize, MetricKind, MetricSample, OrgId};
use bizpulse_core::{EngineConfig, GenerationOptions, InMemoryDataProvider, InsightsEngine, OrgFixture};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

pub const DAYS: i64 = 60;

pub fn day(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
}

/// Midday after the last sample
pub fn as_of() -> DateTime<Utc> {
    day(DAYS - 1) + Duration::hours(12)
}

pub fn options() -> GenerationOptions {
    GenerationOptions::new().as_of(as_of())
}

/// Growing web revenue, flat retail revenue, sessions driving orders and a
/// customer spike two days before the end
pub fn acme_fixture() -> OrgFixture {
    let mut samples = Vec::new();
    for i in 0..DAYS {
        let ts = day(i);
        let weekly = [1.0, 0.95, 1.0, 1.05, 1.1, 1.2, 0.8][(i % 7) as usize];
        samples.push(
            MetricSample::new(ts, (1000.0 + 12.0 * i as f64) * weekly, MetricKind::Revenue)
                .with_source("web"),
        );
        samples.push(
            MetricSample::new(ts, 400.0 + (i % 5) as f64, MetricKind::Revenue)
                .with_source("retail"),
        );

        let sessions = 2000.0 + ((i * 37) % 11) as f64 * 50.0;
        samples.push(MetricSample::new(ts, sessions, MetricKind::Sessions));
        samples.push(MetricSample::new(ts, sessions * 0.04, MetricKind::Orders));

        let customers = if i == DAYS - 2 { 500.0 } else { 50.0 + (i % 3) as f64 };
        samples.push(MetricSample::new(ts, customers, MetricKind::Customers));
    }

    OrgFixture {
        context: BusinessContext {
            business_size: BusinessSize::Medium,
            primary_channels: vec!["web".to_string(), "retail".to_string()],
            monthly_revenue: 45_000.0,
            ..Default::default()
        },
        samples,
        ..Default::default()
    }
}

pub fn acme_provider() -> (InMemoryDataProvider, OrgId) {
    let provider = InMemoryDataProvider::new();
    let org = OrgId::from("acme");
    provider.insert_org(org.clone(), acme_fixture());
    (provider, org)
}

pub fn engine_with(provider: InMemoryDataProvider) -> (InsightsEngine, Arc<InMemoryDataProvider>) {
    let provider = Arc::new(provider);
    let engine = InsightsEngine::new(EngineConfig::default(), provider.clone()).unwrap();
    (engine, provider)
}
