//! In-memory target accessor
//!
//! Backs embedded use and tests; the counter semantics mirror the MongoDB
//! accessor, including the single atomic application of multi-field deltas.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

use super::{TargetAccessor, TargetConfig, TargetSnapshot};
use crate::ledger::kinds::DeclarationKind;
use crate::types::{Result, StanceError};

#[derive(Debug, Clone, Default)]
struct MemoryTarget {
    counters: HashMap<String, f64>,
    declare_counts: HashMap<String, f64>,
}

/// Accessor over an in-process map of targets
pub struct MemoryTargetAccessor {
    config: TargetConfig,
    targets: DashMap<String, MemoryTarget>,
}

impl MemoryTargetAccessor {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            targets: DashMap::new(),
        }
    }

    /// Create a target instance with zeroed counters
    pub fn put_target(&self, id: &str) {
        self.targets
            .entry(id.to_string())
            .or_insert_with(MemoryTarget::default);
    }
}

#[async_trait]
impl TargetAccessor for MemoryTargetAccessor {
    fn config(&self) -> &TargetConfig {
        &self.config
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.targets.contains_key(id))
    }

    async fn increment_counters(&self, id: &str, deltas: &[(DeclarationKind, f64)]) -> Result<()> {
        let mut entry = self
            .targets
            .get_mut(id)
            .ok_or_else(|| StanceError::TargetNotFound(format!("{}/{}", self.config.name, id)))?;

        // One map mutation under the shard lock keeps the multi-field
        // transition atomic to readers, like the $inc document in Mongo.
        for (kind, delta) in deltas {
            let field = kind.counter_field();
            if self.config.exposes(field) {
                *entry.counters.entry(field.to_string()).or_insert(0.0) += delta;
            }
            *entry
                .declare_counts
                .entry(kind.declare_key().to_string())
                .or_insert(0.0) += delta;
        }

        Ok(())
    }

    async fn snapshot(&self, id: &str) -> Result<TargetSnapshot> {
        let entry = self
            .targets
            .get(id)
            .ok_or_else(|| StanceError::TargetNotFound(format!("{}/{}", self.config.name, id)))?;

        Ok(TargetSnapshot {
            target_type: self.config.name.clone(),
            target_id: id.to_string(),
            counters: entry.counters.clone(),
            declare_counts: entry.declare_counts.clone(),
        })
    }

    async fn set_counters(
        &self,
        id: &str,
        counters: &HashMap<String, f64>,
        declare_counts: &HashMap<String, f64>,
    ) -> Result<()> {
        let mut entry = self
            .targets
            .get_mut(id)
            .ok_or_else(|| StanceError::TargetNotFound(format!("{}/{}", self.config.name, id)))?;

        entry.counters = counters.clone();
        entry.declare_counts = declare_counts.clone();
        Ok(())
    }
}
