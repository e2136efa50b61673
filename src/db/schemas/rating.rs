//! Rating document schema
//!
//! The one target family whose declarations feed a derived weight. The
//! `weight` and `wilson_score` fields are recomputed by the weight engine,
//! never set by callers.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for ratings
pub const RATING_COLLECTION: &str = "rates";

/// Whether a rating carries a numeric score or only marks the mod
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    #[default]
    Rate,
    Mark,
}

/// Rating visibility
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Public,
    Private,
}

/// Rating stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RatingDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (soft delete, timestamps)
    #[serde(default)]
    pub metadata: Metadata,

    /// Parent mod id
    pub mod_id: String,

    /// Author of the rating
    pub user_id: String,

    /// Score on the 1-10 scale; 0 means mark only, no numeric score
    pub rate: i32,

    /// Rate or Mark
    #[serde(rename = "type")]
    pub rate_type: RateType,

    /// Length of the remark text, buckets the weight multiplier
    pub remark_length: i64,

    /// Denormalized like counter, maintained by the declaration ledger
    /// ($inc'd under the registry's camelCase counter field name)
    #[serde(default, rename = "likeCount")]
    pub like_count: f64,

    /// Denormalized dislike counter, maintained by the declaration ledger
    #[serde(default, rename = "dislikeCount")]
    pub dislike_count: f64,

    /// Derived composite weight; mutated only by the weight engine
    #[serde(default)]
    pub weight: f64,

    /// Derived Wilson confidence score; mutated only by the weight engine
    #[serde(default)]
    pub wilson_score: f64,

    /// Rating visibility
    #[serde(default)]
    pub access_level: AccessLevel,
}

impl RatingDoc {
    /// Whether this rating participates in its mod's aggregate
    pub fn is_aggregatable(&self) -> bool {
        !self.metadata.is_deleted && self.access_level == AccessLevel::Public
    }
}

impl IntoIndexes for RatingDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One rating per user per mod
            (
                doc! { "mod_id": 1, "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("rating_per_user_unique".to_string())
                        .build(),
                ),
            ),
            // Aggregate recompute scans per mod
            (
                doc! { "mod_id": 1, "access_level": 1 },
                Some(
                    IndexOptions::builder()
                        .name("mod_ratings_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for RatingDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
