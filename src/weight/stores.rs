//! Rating and mod aggregate storage seams
//!
//! The engine reads ratings and writes derived scores through these traits;
//! production wires them to the `rates` and `mods` collections, tests and
//! embedded use get in-memory twins. The in-memory rating store doubles as
//! the Rate target accessor so ledger counter updates and engine reads see
//! the same documents, as they do in MongoDB.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::db::schemas::{ModDoc, RatingDoc, MOD_COLLECTION, RATING_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::ledger::kinds::DeclarationKind;
use crate::registry::{TargetAccessor, TargetConfig, TargetSnapshot};
use crate::types::{Result, StanceError};

/// Derived aggregate for one mod
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModAggregate {
    pub rate_avg: f64,
    pub rate_count: i64,
    pub mark_count: i64,
    pub valid_rate_count: i64,
    pub rate_info: HashMap<String, i64>,
}

/// Rating reads and derived-score writes
#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn get(&self, rating_id: &str) -> Result<Option<RatingDoc>>;

    /// Persist the derived fields; never touches caller-owned fields
    async fn set_scores(&self, rating_id: &str, wilson_score: f64, weight: f64) -> Result<()>;

    /// Public, non-deleted ratings for one mod
    async fn list_public_for_mod(&self, mod_id: &str) -> Result<Vec<RatingDoc>>;

    /// Distinct mod ids with non-deleted ratings (full-sweep maintenance)
    async fn list_mod_ids(&self) -> Result<Vec<String>>;
}

/// Mod aggregate writes
#[async_trait]
pub trait ModStore: Send + Sync {
    async fn exists(&self, mod_id: &str) -> Result<bool>;

    async fn set_aggregate(&self, mod_id: &str, aggregate: &ModAggregate) -> Result<()>;

    async fn get_aggregate(&self, mod_id: &str) -> Result<Option<ModAggregate>>;
}

fn parse_object_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id)
        .map_err(|_| StanceError::InvalidArgument(format!("not an object id: {}", id)))
}

/// MongoDB-backed rating store
pub struct MongoRatingStore {
    collection: MongoCollection<RatingDoc>,
}

impl MongoRatingStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection(RATING_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl RatingStore for MongoRatingStore {
    async fn get(&self, rating_id: &str) -> Result<Option<RatingDoc>> {
        let oid = parse_object_id(rating_id)?;
        self.collection.find_one(doc! { "_id": oid }).await
    }

    async fn set_scores(&self, rating_id: &str, wilson_score: f64, weight: f64) -> Result<()> {
        let oid = parse_object_id(rating_id)?;
        self.collection
            .update_one(
                doc! { "_id": oid },
                doc! { "$set": {
                    "wilson_score": wilson_score,
                    "weight": weight,
                    "metadata.updated_at": bson::DateTime::now(),
                } },
            )
            .await?;
        Ok(())
    }

    async fn list_public_for_mod(&self, mod_id: &str) -> Result<Vec<RatingDoc>> {
        self.collection
            .find_many(doc! { "mod_id": mod_id, "access_level": "public" })
            .await
    }

    async fn list_mod_ids(&self) -> Result<Vec<String>> {
        let values = self
            .collection
            .inner()
            .distinct("mod_id", doc! { "metadata.is_deleted": { "$ne": true } })
            .await
            .map_err(|e| StanceError::Storage(format!("Distinct failed: {}", e)))?;

        Ok(values
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect())
    }
}

/// MongoDB-backed mod aggregate store
pub struct MongoModStore {
    collection: MongoCollection<ModDoc>,
}

impl MongoModStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection(MOD_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl ModStore for MongoModStore {
    async fn exists(&self, mod_id: &str) -> Result<bool> {
        let oid = parse_object_id(mod_id)?;
        Ok(self.collection.find_one(doc! { "_id": oid }).await?.is_some())
    }

    async fn set_aggregate(&self, mod_id: &str, aggregate: &ModAggregate) -> Result<()> {
        let oid = parse_object_id(mod_id)?;

        let mut rate_info = Document::new();
        for (bucket, count) in &aggregate.rate_info {
            rate_info.insert(bucket, *count);
        }

        self.collection
            .update_one(
                doc! { "_id": oid },
                doc! { "$set": {
                    "rate_avg": aggregate.rate_avg,
                    "rate_count": aggregate.rate_count,
                    "mark_count": aggregate.mark_count,
                    "valid_rate_count": aggregate.valid_rate_count,
                    "rate_info": rate_info,
                } },
            )
            .await?;
        Ok(())
    }

    async fn get_aggregate(&self, mod_id: &str) -> Result<Option<ModAggregate>> {
        let oid = parse_object_id(mod_id)?;
        let found = self.collection.find_one(doc! { "_id": oid }).await?;
        Ok(found.map(|doc| ModAggregate {
            rate_avg: doc.rate_avg,
            rate_count: doc.rate_count,
            mark_count: doc.mark_count,
            valid_rate_count: doc.valid_rate_count,
            rate_info: doc.rate_info,
        }))
    }
}

/// In-memory rating store
///
/// Also serves as the Rate family's target accessor so the ledger's counter
/// increments land on the same documents the engine reads.
pub struct MemoryRatingStore {
    config: TargetConfig,
    ratings: DashMap<String, RatingDoc>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self {
            config: TargetConfig::new("Rate", "rates", &["likeCount", "dislikeCount", "reportedCount"]),
            ratings: DashMap::new(),
        }
    }

    pub fn put_rating(&self, id: &str, rating: RatingDoc) {
        self.ratings.insert(id.to_string(), rating);
    }

    pub fn get_rating(&self, id: &str) -> Option<RatingDoc> {
        self.ratings.get(id).map(|r| r.clone())
    }
}

impl Default for MemoryRatingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RatingStore for MemoryRatingStore {
    async fn get(&self, rating_id: &str) -> Result<Option<RatingDoc>> {
        Ok(self
            .ratings
            .get(rating_id)
            .filter(|r| !r.metadata.is_deleted)
            .map(|r| r.clone()))
    }

    async fn set_scores(&self, rating_id: &str, wilson_score: f64, weight: f64) -> Result<()> {
        let mut rating = self
            .ratings
            .get_mut(rating_id)
            .ok_or_else(|| StanceError::Storage(format!("rating vanished: {}", rating_id)))?;
        rating.wilson_score = wilson_score;
        rating.weight = weight;
        rating.metadata.touch();
        Ok(())
    }

    async fn list_public_for_mod(&self, mod_id: &str) -> Result<Vec<RatingDoc>> {
        Ok(self
            .ratings
            .iter()
            .filter(|entry| entry.mod_id == mod_id && entry.is_aggregatable())
            .map(|entry| entry.clone())
            .collect())
    }

    async fn list_mod_ids(&self) -> Result<Vec<String>> {
        let ids: HashSet<String> = self
            .ratings
            .iter()
            .filter(|entry| !entry.metadata.is_deleted)
            .map(|entry| entry.mod_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl TargetAccessor for MemoryRatingStore {
    fn config(&self) -> &TargetConfig {
        &self.config
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.ratings.contains_key(id))
    }

    async fn increment_counters(&self, id: &str, deltas: &[(DeclarationKind, f64)]) -> Result<()> {
        let mut rating = self
            .ratings
            .get_mut(id)
            .ok_or_else(|| StanceError::TargetNotFound(format!("Rate/{}", id)))?;
        for (kind, delta) in deltas {
            match kind {
                DeclarationKind::Like => rating.like_count += delta,
                DeclarationKind::Dislike => rating.dislike_count += delta,
                _ => {}
            }
        }
        Ok(())
    }

    async fn snapshot(&self, id: &str) -> Result<TargetSnapshot> {
        let rating = self
            .ratings
            .get(id)
            .ok_or_else(|| StanceError::TargetNotFound(format!("Rate/{}", id)))?;

        let mut counters = HashMap::new();
        counters.insert("likeCount".to_string(), rating.like_count);
        counters.insert("dislikeCount".to_string(), rating.dislike_count);

        Ok(TargetSnapshot {
            target_type: "Rate".to_string(),
            target_id: id.to_string(),
            counters,
            declare_counts: HashMap::new(),
        })
    }

    async fn set_counters(
        &self,
        id: &str,
        counters: &HashMap<String, f64>,
        _declare_counts: &HashMap<String, f64>,
    ) -> Result<()> {
        let mut rating = self
            .ratings
            .get_mut(id)
            .ok_or_else(|| StanceError::TargetNotFound(format!("Rate/{}", id)))?;
        rating.like_count = counters.get("likeCount").copied().unwrap_or(0.0);
        rating.dislike_count = counters.get("dislikeCount").copied().unwrap_or(0.0);
        Ok(())
    }
}

/// In-memory mod aggregate store
#[derive(Default)]
pub struct MemoryModStore {
    mods: DashMap<String, ModAggregate>,
}

impl MemoryModStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mod with a zeroed aggregate
    pub fn put_mod(&self, id: &str) {
        self.mods
            .entry(id.to_string())
            .or_insert_with(ModAggregate::default);
    }
}

#[async_trait]
impl ModStore for MemoryModStore {
    async fn exists(&self, mod_id: &str) -> Result<bool> {
        Ok(self.mods.contains_key(mod_id))
    }

    async fn set_aggregate(&self, mod_id: &str, aggregate: &ModAggregate) -> Result<()> {
        self.mods.insert(mod_id.to_string(), aggregate.clone());
        Ok(())
    }

    async fn get_aggregate(&self, mod_id: &str) -> Result<Option<ModAggregate>> {
        Ok(self.mods.get(mod_id).map(|a| a.clone()))
    }
}
