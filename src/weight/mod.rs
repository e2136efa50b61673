//! Rating weight subsystem
//!
//! Wilson scoring, per-rating weight derivation, and mod aggregate
//! recomputation, driven by declaration events.

pub mod engine;
pub mod stores;
pub mod wilson;

pub use engine::{
    rating_weight, rating_wilson_score, spawn_weight_engine, RatingWeightEngine, RemarkBucket,
    MIN_VALID_RATE_COUNT, RATE_TARGET_TYPE,
};
pub use stores::{
    MemoryModStore, MemoryRatingStore, ModAggregate, ModStore, MongoModStore, MongoRatingStore,
    RatingStore,
};
pub use wilson::{wilson_score, WILSON_Z};
