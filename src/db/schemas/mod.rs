//! Database schemas for the stance core
//!
//! Defines MongoDB document structures for declarations, ratings, and the
//! mod aggregate fields this core owns.

mod declaration;
mod metadata;
mod mod_record;
mod rating;

pub use declaration::{DeclarationDoc, DECLARATION_COLLECTION};
pub use metadata::Metadata;
pub use mod_record::{ModDoc, MOD_COLLECTION};
pub use rating::{AccessLevel, RateType, RatingDoc, RATING_COLLECTION};
