//! Target registry
//!
//! Maps a target-type name to the storage collection holding it and the set
//! of counter fields it exposes. Genericity over target families is an
//! explicit map of accessors resolved at startup; adding a family means
//! registering an accessor, not introspecting a live schema.

pub mod builtin;
pub mod memory;
pub mod mongo;

pub use builtin::{builtin_configs, register_mongo_targets};
pub use memory::MemoryTargetAccessor;
pub use mongo::MongoTargetAccessor;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ledger::kinds::DeclarationKind;
use crate::types::{Result, StanceError};

/// Static configuration for one target family, supplied at startup by the
/// owning module
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Target-type name used by callers (e.g. "Mod", "Rate")
    pub name: String,
    /// Storage collection holding the family
    pub collection: String,
    /// Named counter fields the family exposes; increments for kinds whose
    /// field is not listed land only in the free-form `declareCounts` map
    pub counter_fields: Vec<String>,
}

impl TargetConfig {
    pub fn new(name: &str, collection: &str, counter_fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            collection: collection.to_string(),
            counter_fields: counter_fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn exposes(&self, field: &str) -> bool {
        self.counter_fields.iter().any(|f| f == field)
    }
}

/// Refreshed view of a target's denormalized counters, returned to callers
/// of declare/cancel
#[derive(Debug, Clone, Default)]
pub struct TargetSnapshot {
    pub target_type: String,
    pub target_id: String,
    /// Named counter fields (likeCount, dislikeCount, ...)
    pub counters: HashMap<String, f64>,
    /// Free-form per-kind counts
    pub declare_counts: HashMap<String, f64>,
}

impl TargetSnapshot {
    pub fn counter(&self, field: &str) -> f64 {
        self.counters.get(field).copied().unwrap_or(0.0)
    }

    pub fn declare_count(&self, key: &str) -> f64 {
        self.declare_counts.get(key).copied().unwrap_or(0.0)
    }
}

/// Storage access for one target family
///
/// Counter mutations go through `increment_counters` as atomic increments,
/// never through read-modify-write of the whole target document.
#[async_trait]
pub trait TargetAccessor: Send + Sync {
    /// Family configuration this accessor serves
    fn config(&self) -> &TargetConfig;

    /// Whether the target instance exists
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Apply counter deltas atomically as one storage operation
    async fn increment_counters(&self, id: &str, deltas: &[(DeclarationKind, f64)]) -> Result<()>;

    /// Read the current counter state
    async fn snapshot(&self, id: &str) -> Result<TargetSnapshot>;

    /// Overwrite counters with reconciled values (safety-net job)
    async fn set_counters(
        &self,
        id: &str,
        counters: &HashMap<String, f64>,
        declare_counts: &HashMap<String, f64>,
    ) -> Result<()>;
}

/// Name-to-accessor map, fixed for the process lifetime
#[derive(Clone, Default)]
pub struct TargetRegistry {
    accessors: HashMap<String, Arc<dyn TargetAccessor>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accessor under its configured family name
    pub fn register(&mut self, accessor: Arc<dyn TargetAccessor>) {
        self.accessors
            .insert(accessor.config().name.clone(), accessor);
    }

    /// Resolve a target-type name; unregistered names are a caller error
    pub fn resolve(&self, target_type: &str) -> Result<Arc<dyn TargetAccessor>> {
        self.accessors
            .get(target_type)
            .cloned()
            .ok_or_else(|| StanceError::UnknownTargetType(target_type.to_string()))
    }

    /// Registered family names
    pub fn target_types(&self) -> Vec<&str> {
        self.accessors.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unknown_target_type() {
        let registry = TargetRegistry::new();
        let err = registry.resolve("Widget").err().unwrap();
        assert_eq!(err.code(), "unknown_target_type");
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_resolve_registered_accessor() {
        let mut registry = TargetRegistry::new();
        let accessor = Arc::new(MemoryTargetAccessor::new(TargetConfig::new(
            "Mod",
            "mods",
            &["likeCount", "dislikeCount"],
        )));
        registry.register(accessor.clone());

        accessor.put_target("m1");
        let resolved = registry.resolve("Mod").unwrap();
        assert!(resolved.exists("m1").await.unwrap());
        assert!(!resolved.exists("m2").await.unwrap());
    }

    #[test]
    fn test_config_exposure() {
        let config = TargetConfig::new("Rate", "rates", &["likeCount", "dislikeCount"]);
        assert!(config.exposes("likeCount"));
        assert!(!config.exposes("followerCount"));
    }
}
