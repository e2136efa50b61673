//! Stance - declaration ledger and rating weight engine
//!
//! Stance records typed declarations (likes, dislikes, follows, blocks,
//! reports) against registered target families, keeps each target's
//! denormalized counters in lockstep with the ledger, and derives rating
//! weights and mod aggregates from the resulting like/dislike tallies.
//!
//! ## Services
//!
//! - **Registry**: name-to-accessor map over target families in MongoDB
//! - **Ledger**: declare/cancel with exclusivity groups and atomic counters
//! - **Events**: NATS notifications for every declaration transition
//! - **Weight**: Wilson-scored rating weights and per-mod aggregates

pub mod config;
pub mod db;
pub mod events;
pub mod ledger;
pub mod registry;
pub mod types;
pub mod weight;

pub use config::Args;
pub use ledger::DeclarationLedger;
pub use registry::TargetRegistry;
pub use types::{Result, StanceError};
pub use weight::RatingWeightEngine;
