//! Builtin target family configurations
//!
//! Each owning module supplies its family here at startup. The set is fixed
//! at build/deploy time.

use std::sync::Arc;

use super::{MongoTargetAccessor, TargetConfig, TargetRegistry};
use crate::db::MongoClient;

/// Configurations for the six builtin target families
pub fn builtin_configs() -> Vec<TargetConfig> {
    vec![
        TargetConfig::new(
            "Mod",
            "mods",
            &["likeCount", "dislikeCount", "happyCount", "followerCount", "reportedCount"],
        ),
        TargetConfig::new("Rate", "rates", &["likeCount", "dislikeCount", "reportedCount"]),
        TargetConfig::new("Comment", "comments", &["likeCount", "dislikeCount", "reportedCount"]),
        TargetConfig::new("User", "users", &["followerCount", "blockCount", "reportedCount"]),
        TargetConfig::new("Topic", "topics", &["likeCount", "followerCount", "reportedCount"]),
        TargetConfig::new(
            "Collection",
            "collections",
            &["likeCount", "followerCount", "reportedCount"],
        ),
    ]
}

/// Register a MongoDB accessor for every builtin family
pub fn register_mongo_targets(registry: &mut TargetRegistry, mongo: &MongoClient) {
    for config in builtin_configs() {
        registry.register(Arc::new(MongoTargetAccessor::new(mongo, config)));
    }
}
