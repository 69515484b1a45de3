//! Tenant business context and time context used for scoring

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Business size bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusinessSize {
    Micro,
    #[default]
    Small,
    Medium,
}

impl BusinessSize {
    /// Revenue impact multiplier: smaller businesses feel the same change harder
    pub fn impact_multiplier(&self) -> f64 {
        match self {
            Self::Micro => 1.3,
            Self::Small => 1.0,
            Self::Medium => 0.8,
        }
    }

    /// Monthly revenue below which budget-heavy actions are hard to fund
    pub fn budget_threshold(&self) -> f64 {
        match self {
            Self::Micro => 10_000.0,
            Self::Small => 50_000.0,
            Self::Medium => 250_000.0,
        }
    }
}

/// Where the business sits in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessCycle {
    Peak,
    Growth,
    Decline,
    Recovery,
}

impl BusinessCycle {
    pub fn urgency_multiplier(&self) -> f64 {
        match self {
            Self::Peak => 1.3,
            Self::Growth => 1.1,
            Self::Decline => 1.2,
            Self::Recovery => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalContext {
    HighSeason,
    Normal,
    LowSeason,
}

impl SeasonalContext {
    pub fn urgency_multiplier(&self) -> f64 {
        match self {
            Self::HighSeason => 1.2,
            Self::Normal => 1.0,
            Self::LowSeason => 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCondition {
    Volatile,
    Stable,
    Downturn,
}

impl MarketCondition {
    pub fn urgency_multiplier(&self) -> f64 {
        match self {
            Self::Volatile => 1.2,
            Self::Stable => 1.0,
            Self::Downturn => 1.1,
        }
    }
}

/// Tenant attributes fetched from the data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BusinessContext {
    pub business_size: BusinessSize,
    /// Sales/marketing channels the tenant actively uses
    pub primary_channels: Vec<String>,
    /// Average monthly revenue
    pub monthly_revenue: f64,
    pub industry: Option<String>,
    pub business_cycle: Option<BusinessCycle>,
    pub seasonal_context: Option<SeasonalContext>,
    pub market_condition: Option<MarketCondition>,
    /// A competitor launch/promotion is currently running
    pub competitive_event: bool,
}

/// Aggregate data quality assessment from the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    /// Quality score (0.0-1.0)
    pub score: f64,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl DataQualityReport {
    pub fn perfect() -> Self {
        Self {
            score: 1.0,
            issues: Vec::new(),
        }
    }
}

/// Time-dependent inputs to urgency scoring
#[derive(Debug, Clone, PartialEq)]
pub struct TimeContext {
    pub now: DateTime<Utc>,
    pub business_cycle: Option<BusinessCycle>,
    pub seasonal_context: Option<SeasonalContext>,
    pub market_condition: Option<MarketCondition>,
    pub competitive_event: bool,
}

impl TimeContext {
    /// Neutral context at the given instant
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            business_cycle: None,
            seasonal_context: None,
            market_condition: None,
            competitive_event: false,
        }
    }

    /// Derive from the tenant's business context
    pub fn from_business(now: DateTime<Utc>, context: &BusinessContext) -> Self {
        Self {
            now,
            business_cycle: context.business_cycle,
            seasonal_context: context.seasonal_context,
            market_condition: context.market_condition,
            competitive_event: context.competitive_event,
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.now.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_business_context_defaults_from_partial_json() {
        let ctx: BusinessContext =
            serde_json::from_str(r#"{"business_size": "micro", "monthly_revenue": 8000}"#)
                .unwrap();
        assert_eq!(ctx.business_size, BusinessSize::Micro);
        assert_eq!(ctx.monthly_revenue, 8000.0);
        assert!(ctx.primary_channels.is_empty());
        assert!(ctx.business_cycle.is_none());
    }

    #[test]
    fn test_weekend_detection() {
        // 2024-03-02 is a Saturday
        let sat = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let mon = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        assert!(TimeContext::at(sat).is_weekend());
        assert!(!TimeContext::at(mon).is_weekend());
    }
}
