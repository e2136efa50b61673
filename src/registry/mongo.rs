//! MongoDB-backed target accessor
//!
//! Works on raw documents because target families are heterogeneous; the
//! only fields this core touches are the counters. Increments use a single
//! `$inc` document so multi-field deltas (the exclusive-kind switch) land
//! as one atomic transition.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::Collection;
use std::collections::HashMap;

use super::{TargetAccessor, TargetConfig, TargetSnapshot};
use crate::db::MongoClient;
use crate::ledger::kinds::DeclarationKind;
use crate::types::{Result, StanceError};

/// Accessor for one target family's MongoDB collection
pub struct MongoTargetAccessor {
    config: TargetConfig,
    collection: Collection<Document>,
}

impl MongoTargetAccessor {
    pub fn new(mongo: &MongoClient, config: TargetConfig) -> Self {
        let collection = mongo.raw_collection(&config.collection);
        Self { config, collection }
    }

    /// Build an `_id` filter, preferring ObjectId when the id parses as one
    fn id_filter(id: &str) -> Document {
        match ObjectId::parse_str(id) {
            Ok(oid) => doc! { "_id": oid },
            Err(_) => doc! { "_id": id },
        }
    }

    fn numeric(value: &Bson) -> Option<f64> {
        match value {
            Bson::Double(v) => Some(*v),
            Bson::Int32(v) => Some(f64::from(*v)),
            Bson::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }
}

#[async_trait]
impl TargetAccessor for MongoTargetAccessor {
    fn config(&self) -> &TargetConfig {
        &self.config
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let found = self
            .collection
            .find_one(Self::id_filter(id))
            .await
            .map_err(|e| StanceError::Storage(format!("Target lookup failed: {}", e)))?;
        Ok(found.is_some())
    }

    async fn increment_counters(&self, id: &str, deltas: &[(DeclarationKind, f64)]) -> Result<()> {
        let mut inc = Document::new();
        for (kind, delta) in deltas {
            let field = kind.counter_field();
            if self.config.exposes(field) {
                let current = inc.get_f64(field).unwrap_or(0.0);
                inc.insert(field, current + delta);
            }
            let declare_field = format!("declareCounts.{}", kind.declare_key());
            let current = inc.get_f64(&declare_field).unwrap_or(0.0);
            inc.insert(declare_field, current + delta);
        }

        if inc.is_empty() {
            return Ok(());
        }

        self.collection
            .update_one(Self::id_filter(id), doc! { "$inc": inc })
            .await
            .map_err(|e| StanceError::Storage(format!("Counter update failed: {}", e)))?;

        Ok(())
    }

    async fn snapshot(&self, id: &str) -> Result<TargetSnapshot> {
        let document = self
            .collection
            .find_one(Self::id_filter(id))
            .await
            .map_err(|e| StanceError::Storage(format!("Target read failed: {}", e)))?
            .ok_or_else(|| StanceError::TargetNotFound(format!("{}/{}", self.config.name, id)))?;

        let mut counters = HashMap::new();
        for field in &self.config.counter_fields {
            if let Some(value) = document.get(field).and_then(Self::numeric) {
                counters.insert(field.clone(), value);
            }
        }

        let mut declare_counts = HashMap::new();
        if let Ok(map) = document.get_document("declareCounts") {
            for (key, value) in map {
                if let Some(value) = Self::numeric(value) {
                    declare_counts.insert(key.clone(), value);
                }
            }
        }

        Ok(TargetSnapshot {
            target_type: self.config.name.clone(),
            target_id: id.to_string(),
            counters,
            declare_counts,
        })
    }

    async fn set_counters(
        &self,
        id: &str,
        counters: &HashMap<String, f64>,
        declare_counts: &HashMap<String, f64>,
    ) -> Result<()> {
        let mut set = Document::new();
        for field in &self.config.counter_fields {
            set.insert(field, counters.get(field).copied().unwrap_or(0.0));
        }
        let mut declare_doc = Document::new();
        for (key, value) in declare_counts {
            declare_doc.insert(key, *value);
        }
        set.insert("declareCounts", declare_doc);

        self.collection
            .update_one(Self::id_filter(id), doc! { "$set": set })
            .await
            .map_err(|e| StanceError::Storage(format!("Counter reconcile failed: {}", e)))?;

        Ok(())
    }
}
