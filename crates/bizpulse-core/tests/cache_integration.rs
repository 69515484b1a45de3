//! Integration tests for the organization cache and its registry

use bizpulse_core::cache::{CacheManager, CacheRegistry, InvalidationTrigger};
use bizpulse_core::models::OrgId;
use bizpulse_core::CoreError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

#[test]
fn test_get_is_idempotent() {
    let cache: CacheManager<String> = CacheManager::new(OrgId::from("acme"), 10);
    cache.set("summary", "revenue up".to_string(), HOUR, ["revenue"]);

    let first = cache.get("summary");
    let second = cache.get("summary");
    assert_eq!(first, second);
    assert_eq!(first.as_deref(), Some("revenue up"));
    assert_eq!(cache.stats().hits, 2);
}

#[test]
fn test_data_update_keeps_context_entries() {
    let registry: CacheRegistry<u32> = CacheRegistry::new(100);
    let org = OrgId::from("acme");
    let cache = registry.get_or_create(&org);
    cache.set("revenue_trend", 1, HOUR, ["revenue", "insights"]);
    cache.set("orders_trend", 2, HOUR, ["orders"]);
    cache.set("customer_mix", 3, HOUR, ["customers"]);
    cache.set("traffic", 4, HOUR, ["sessions"]);
    cache.set("business_context", 5, HOUR, ["business_context"]);

    let removed = registry.invalidate(&org, &[InvalidationTrigger::DataUpdate]);

    assert_eq!(removed, 4);
    assert_eq!(cache.get("business_context"), Some(5));
    assert!(cache.get("revenue_trend").is_none());
    assert!(cache.get("traffic").is_none());
}

#[test]
fn test_registry_lifecycle() {
    let registry: CacheRegistry<u32> = CacheRegistry::new(100);
    let acme = OrgId::from("acme");
    let globex = OrgId::from("globex");
    registry.get_or_create(&acme).set("a", 1, HOUR, ["revenue"]);
    registry.get_or_create(&globex).set("b", 2, HOUR, ["revenue"]);

    assert_eq!(
        registry.invalidate(&acme, &[InvalidationTrigger::ManualRefresh]),
        1
    );
    assert_eq!(registry.get_or_create(&globex).get("b"), Some(2));

    assert!(registry.destroy(&globex));
    assert!(registry.get(&globex).is_none());
    assert_eq!(registry.organizations(), vec![acme]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_errors_reach_every_waiter() {
    let cache: Arc<CacheManager<u32>> = Arc::new(CacheManager::new(OrgId::from("acme"), 10));
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .deduplicate("insights", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<u32, _>(CoreError::InvalidConfig {
                            message: "boom".to_string(),
                        })
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.in_flight_count(), 0);
}
