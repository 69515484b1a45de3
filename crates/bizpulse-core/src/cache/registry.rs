//! Organization-scoped cache registry and invalidation rules

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::manager::{CacheManager, CacheStats};
use crate::models::{MetricKind, OrgId};

/// Tags removed by a settings change
const SETTINGS_TAGS: [&str; 3] = ["business_context", "settings", "insights"];

/// Why cached data became stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationTrigger {
    /// New metric data arrived
    DataUpdate,
    /// Business settings changed
    SettingsChange,
    /// A data source was connected
    NewIntegration,
    /// User asked for fresh results
    ManualRefresh,
    /// Every organization
    Global,
}

/// Which entries a trigger removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Entries carrying any of these tags
    Tags(Vec<String>),
    /// Every entry of the organization
    Organization,
    /// Every entry of every organization
    Global,
}

impl InvalidationTrigger {
    pub fn scope(&self) -> InvalidationScope {
        match self {
            Self::DataUpdate => InvalidationScope::Tags(
                MetricKind::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            ),
            Self::SettingsChange => {
                InvalidationScope::Tags(SETTINGS_TAGS.iter().map(|t| t.to_string()).collect())
            }
            Self::NewIntegration | Self::ManualRefresh => InvalidationScope::Organization,
            Self::Global => InvalidationScope::Global,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataUpdate => "data_update",
            Self::SettingsChange => "settings_change",
            Self::NewIntegration => "new_integration",
            Self::ManualRefresh => "manual_refresh",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for InvalidationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidationTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data_update" => Ok(Self::DataUpdate),
            "settings_change" => Ok(Self::SettingsChange),
            "new_integration" => Ok(Self::NewIntegration),
            "manual_refresh" => Ok(Self::ManualRefresh),
            "global" => Ok(Self::Global),
            other => Err(format!("unknown invalidation trigger: {}", other)),
        }
    }
}

/// Explicitly managed set of per-organization caches
pub struct CacheRegistry<V> {
    managers: DashMap<OrgId, Arc<CacheManager<V>>>,
    max_entries: usize,
}

impl<V> CacheRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_entries: usize) -> Self {
        Self {
            managers: DashMap::new(),
            max_entries,
        }
    }

    /// Cache for `org`, created on first use
    pub fn get_or_create(&self, org: &OrgId) -> Arc<CacheManager<V>> {
        self.managers
            .entry(org.clone())
            .or_insert_with(|| {
                debug!(org = %org, "Creating organization cache");
                Arc::new(CacheManager::new(org.clone(), self.max_entries))
            })
            .clone()
    }

    pub fn get(&self, org: &OrgId) -> Option<Arc<CacheManager<V>>> {
        self.managers.get(org).map(|m| Arc::clone(m.value()))
    }

    /// Drop an organization's cache entirely
    pub fn destroy(&self, org: &OrgId) -> bool {
        self.managers.remove(org).is_some()
    }

    pub fn organizations(&self) -> Vec<OrgId> {
        self.managers.iter().map(|m| m.key().clone()).collect()
    }

    /// Apply triggers to one organization (or all, for `Global`)
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, org: &OrgId, triggers: &[InvalidationTrigger]) -> usize {
        let mut removed = 0;
        for trigger in triggers {
            removed += match trigger.scope() {
                InvalidationScope::Global => self.clear_all(),
                InvalidationScope::Organization => {
                    self.get(org).map(|cache| cache.clear()).unwrap_or(0)
                }
                InvalidationScope::Tags(tags) => self
                    .get(org)
                    .map(|cache| cache.invalidate_tags(tags.as_slice()))
                    .unwrap_or(0),
            };
        }
        debug!(org = %org, removed, "Cache invalidated");
        removed
    }

    pub fn clear_all(&self) -> usize {
        self.managers.iter().map(|m| m.value().clear()).sum()
    }

    /// Remove expired entries from every organization
    pub fn sweep_expired(&self) -> usize {
        let caches: Vec<Arc<CacheManager<V>>> =
            self.managers.iter().map(|m| Arc::clone(m.value())).collect();
        caches.iter().map(|c| c.sweep_expired()).sum()
    }

    /// Counters summed across organizations
    pub fn stats(&self) -> CacheStats {
        let mut total = CacheStats::default();
        for manager in self.managers.iter() {
            total.merge(&manager.value().stats());
        }
        total
    }
}
