//! Integration tests for loading engine configuration from disk

use bizpulse_core::models::AnalysisFamily;
use bizpulse_core::{CoreError, EngineConfig, InMemoryDataProvider, InsightsEngine};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

#[test]
fn test_load_partial_file_keeps_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
confidence_threshold = 0.75
parallel_processing = false

[cache]
ttl_secs = 60

[analyses]
performance = false
"#
    )
    .unwrap();

    let config = EngineConfig::load(file.path()).unwrap();

    assert_eq!(config.confidence_threshold, 0.75);
    assert!(!config.parallel_processing);
    assert_eq!(config.cache.ttl_secs, 60);
    assert_eq!(config.cache.max_entries, 100);
    assert_eq!(config.min_sample_count, 7);
    assert!(!config.analyses.is_enabled(AnalysisFamily::Performance));
    assert!(config.analyses.is_enabled(AnalysisFamily::Trends));

    let engine = InsightsEngine::new(config, Arc::new(InMemoryDataProvider::new())).unwrap();
    assert_eq!(engine.config().cache.ttl_secs, 60);
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "significance_level = 1.5").unwrap();

    let err = EngineConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfig { .. }));
}

#[test]
fn test_malformed_toml_reports_path() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "confidence_threshold = [").unwrap();

    match EngineConfig::load(file.path()).unwrap_err() {
        CoreError::ConfigParse { path, .. } => assert_eq!(path, file.path()),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, EngineConfig::default());
}
