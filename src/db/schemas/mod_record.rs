//! Mod document schema
//!
//! Only the aggregate fields this core owns are modeled; the rest of the mod
//! document (title, files, tags) belongs to other modules and survives
//! untouched because aggregate writes use `$set` on these fields only.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for mods
pub const MOD_COLLECTION: &str = "mods";

/// Mod aggregate fields, mutated only by the weight engine
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ModDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Weighted mean of public, non-deleted rating scores
    #[serde(default)]
    pub rate_avg: f64,

    /// Count of ratings with a numeric score (type == Rate)
    #[serde(default)]
    pub rate_count: i64,

    /// Count of ratings with rate > 0
    #[serde(default)]
    pub valid_rate_count: i64,

    /// Count of mark-only ratings
    #[serde(default)]
    pub mark_count: i64,

    /// Histogram of rate value (raw "1".."10" buckets) to count
    #[serde(default)]
    pub rate_info: HashMap<String, i64>,
}

impl IntoIndexes for ModDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // Mods are owned by another module; this core only $sets aggregate
        // fields and adds no indexes of its own.
        vec![]
    }
}

impl MutMetadata for ModDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
