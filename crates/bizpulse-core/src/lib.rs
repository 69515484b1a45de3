//! bizpulse-core - Core library for bizpulse
//!
//! Provides statistical analyzers, impact scoring, an organization-scoped
//! cache, and the insights engine that ties them to a data provider.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod models;
pub mod narrative;
pub mod provider;
pub mod scoring;

pub use cache::{CacheManager, CacheRegistry, CacheStats, InvalidationTrigger};
pub use config::{AnalysisToggles, CacheConfig, EngineConfig};
pub use engine::{GenerationOptions, InsightsEngine};
pub use error::{CoreError, GenerationReport, ReportIssue};
pub use event::{EngineEvent, EventBus};
pub use narrative::{Narrative, NarrativeGenerator, TemplateNarrator};
pub use provider::{DataProvider, Fixture, InMemoryDataProvider, OrgFixture, ProviderOperation};
pub use scoring::{ComplexitySignals, ImpactScorer, TextPatternSignals};
