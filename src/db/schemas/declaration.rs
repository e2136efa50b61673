//! Declaration ledger row schema
//!
//! One row per unique kind per user per target. Two unique indexes back the
//! ledger's invariants: one on the full kind (no duplicate of the same
//! stance) and a partial one on the exclusivity group column, so a losing
//! concurrent writer of an exclusive-kind switch fails at the storage layer.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::ledger::kinds::DeclarationKind;

/// Collection name for declarations
pub const DECLARATION_COLLECTION: &str = "declarations";

/// Ledger entry stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DeclarationDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Target family name, key into the TargetRegistry
    pub target_type: String,

    /// Target instance identifier
    pub target_id: String,

    /// Declaring user
    pub user_id: String,

    /// The declared stance, serialized as its string form
    pub kind: DeclarationKind,

    /// Exclusivity group occupied by this row, present only when the kind
    /// is an exclusive member of a group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusivity_group: Option<String>,

    /// Counter delta captured at declare time; cancel is symmetric on it
    pub weight: f64,
}

impl DeclarationDoc {
    pub fn new(
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kind: DeclarationKind,
        exclusivity_group: Option<String>,
        weight: f64,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            user_id: user_id.to_string(),
            kind,
            exclusivity_group,
            weight,
        }
    }
}

impl IntoIndexes for DeclarationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // At most one row per kind per user per target
            (
                doc! { "target_type": 1, "target_id": 1, "user_id": 1, "kind": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("declaration_unique".to_string())
                        .build(),
                ),
            ),
            // At most one row per exclusivity group per user per target;
            // partial so compatible/ungrouped kinds (no group column) are exempt
            (
                doc! { "target_type": 1, "target_id": 1, "user_id": 1, "exclusivity_group": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! {
                            "exclusivity_group": { "$exists": true }
                        })
                        .name("exclusivity_group_unique".to_string())
                        .build(),
                ),
            ),
            // User declaration listings
            (
                doc! { "target_type": 1, "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_declarations_index".to_string())
                        .build(),
                ),
            ),
            // Reconciliation scans per target
            (
                doc! { "target_type": 1, "target_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("target_declarations_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for DeclarationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
