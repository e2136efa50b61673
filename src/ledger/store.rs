//! Declaration row storage
//!
//! The ledger owns its rows exclusively; targets only carry derived
//! counters. Uniqueness (per kind and per exclusivity group) is enforced by
//! the store itself, so a losing concurrent writer gets `AlreadyDeclared`
//! no matter which process it raced.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use std::sync::Mutex;

use super::kinds::DeclarationKind;
use crate::db::schemas::{DeclarationDoc, DECLARATION_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{Result, StanceError};

/// Persistence seam for ledger rows
#[async_trait]
pub trait DeclarationStore: Send + Sync {
    /// Insert a row; duplicate kind or occupied exclusivity group yields
    /// `AlreadyDeclared`
    async fn insert(&self, declaration: DeclarationDoc) -> Result<()>;

    /// Find the row for an exact kind
    async fn find(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kind: &DeclarationKind,
    ) -> Result<Option<DeclarationDoc>>;

    /// Find a row whose kind is any of the given kinds
    async fn find_any(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kinds: &[DeclarationKind],
    ) -> Result<Option<DeclarationDoc>>;

    /// Delete a row; returns false when it was already gone
    async fn delete(&self, declaration: &DeclarationDoc) -> Result<bool>;

    /// All rows a user holds on one target family, optionally narrowed to
    /// specific target ids and to one kind
    async fn list_for_user(
        &self,
        target_type: &str,
        user_id: &str,
        target_ids: Option<&[String]>,
        kind: Option<&DeclarationKind>,
    ) -> Result<Vec<DeclarationDoc>>;

    /// All rows on one target (reconciliation scans)
    async fn list_for_target(&self, target_type: &str, target_id: &str)
        -> Result<Vec<DeclarationDoc>>;
}

/// MongoDB-backed declaration store
pub struct MongoDeclarationStore {
    collection: MongoCollection<DeclarationDoc>,
}

impl MongoDeclarationStore {
    /// Open the declarations collection, applying its unique indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection(DECLARATION_COLLECTION).await?;
        Ok(Self { collection })
    }

    fn kind_strings(kinds: &[DeclarationKind]) -> Vec<String> {
        kinds.iter().map(|k| k.to_string()).collect()
    }
}

#[async_trait]
impl DeclarationStore for MongoDeclarationStore {
    async fn insert(&self, declaration: DeclarationDoc) -> Result<()> {
        self.collection.insert_one(declaration).await.map(|_| ())
    }

    async fn find(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kind: &DeclarationKind,
    ) -> Result<Option<DeclarationDoc>> {
        self.collection
            .find_one(doc! {
                "target_type": target_type,
                "target_id": target_id,
                "user_id": user_id,
                "kind": kind.to_string(),
            })
            .await
    }

    async fn find_any(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kinds: &[DeclarationKind],
    ) -> Result<Option<DeclarationDoc>> {
        self.collection
            .find_one(doc! {
                "target_type": target_type,
                "target_id": target_id,
                "user_id": user_id,
                "kind": { "$in": Self::kind_strings(kinds) },
            })
            .await
    }

    async fn delete(&self, declaration: &DeclarationDoc) -> Result<bool> {
        let filter = match declaration._id {
            Some(id) => doc! { "_id": id },
            None => doc! {
                "target_type": &declaration.target_type,
                "target_id": &declaration.target_id,
                "user_id": &declaration.user_id,
                "kind": declaration.kind.to_string(),
            },
        };
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_for_user(
        &self,
        target_type: &str,
        user_id: &str,
        target_ids: Option<&[String]>,
        kind: Option<&DeclarationKind>,
    ) -> Result<Vec<DeclarationDoc>> {
        let mut filter = doc! {
            "target_type": target_type,
            "user_id": user_id,
        };
        if let Some(ids) = target_ids {
            filter.insert("target_id", doc! { "$in": ids });
        }
        if let Some(kind) = kind {
            filter.insert("kind", kind.to_string());
        }
        self.collection.find_many(filter).await
    }

    async fn list_for_target(
        &self,
        target_type: &str,
        target_id: &str,
    ) -> Result<Vec<DeclarationDoc>> {
        self.collection
            .find_many(doc! {
                "target_type": target_type,
                "target_id": target_id,
            })
            .await
    }
}

/// In-process declaration store for embedded use and tests
///
/// Enforces the same uniqueness rules the Mongo indexes do.
#[derive(Default)]
pub struct MemoryDeclarationStore {
    rows: Mutex<Vec<DeclarationDoc>>,
}

impl MemoryDeclarationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn same_identity(a: &DeclarationDoc, target_type: &str, target_id: &str, user_id: &str) -> bool {
        a.target_type == target_type && a.target_id == target_id && a.user_id == user_id
    }
}

#[async_trait]
impl DeclarationStore for MemoryDeclarationStore {
    async fn insert(&self, mut declaration: DeclarationDoc) -> Result<()> {
        let mut rows = self.rows.lock().expect("row lock poisoned");

        let conflict = rows.iter().any(|row| {
            Self::same_identity(
                row,
                &declaration.target_type,
                &declaration.target_id,
                &declaration.user_id,
            ) && (row.kind == declaration.kind
                || (row.exclusivity_group.is_some()
                    && row.exclusivity_group == declaration.exclusivity_group))
        });
        if conflict {
            return Err(StanceError::AlreadyDeclared("duplicate declaration".to_string()));
        }

        declaration._id = Some(ObjectId::new());
        rows.push(declaration);
        Ok(())
    }

    async fn find(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kind: &DeclarationKind,
    ) -> Result<Option<DeclarationDoc>> {
        let rows = self.rows.lock().expect("row lock poisoned");
        Ok(rows
            .iter()
            .find(|row| {
                Self::same_identity(row, target_type, target_id, user_id) && row.kind == *kind
            })
            .cloned())
    }

    async fn find_any(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kinds: &[DeclarationKind],
    ) -> Result<Option<DeclarationDoc>> {
        let rows = self.rows.lock().expect("row lock poisoned");
        Ok(rows
            .iter()
            .find(|row| {
                Self::same_identity(row, target_type, target_id, user_id)
                    && kinds.contains(&row.kind)
            })
            .cloned())
    }

    async fn delete(&self, declaration: &DeclarationDoc) -> Result<bool> {
        let mut rows = self.rows.lock().expect("row lock poisoned");
        let before = rows.len();
        rows.retain(|row| {
            !(Self::same_identity(
                row,
                &declaration.target_type,
                &declaration.target_id,
                &declaration.user_id,
            ) && row.kind == declaration.kind)
        });
        Ok(rows.len() < before)
    }

    async fn list_for_user(
        &self,
        target_type: &str,
        user_id: &str,
        target_ids: Option<&[String]>,
        kind: Option<&DeclarationKind>,
    ) -> Result<Vec<DeclarationDoc>> {
        let rows = self.rows.lock().expect("row lock poisoned");
        Ok(rows
            .iter()
            .filter(|row| {
                row.target_type == target_type
                    && row.user_id == user_id
                    && target_ids.is_none_or(|ids| ids.contains(&row.target_id))
                    && kind.is_none_or(|k| row.kind == *k)
            })
            .cloned()
            .collect())
    }

    async fn list_for_target(
        &self,
        target_type: &str,
        target_id: &str,
    ) -> Result<Vec<DeclarationDoc>> {
        let rows = self.rows.lock().expect("row lock poisoned");
        Ok(rows
            .iter()
            .filter(|row| row.target_type == target_type && row.target_id == target_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: DeclarationKind, group: Option<&str>) -> DeclarationDoc {
        DeclarationDoc::new("Mod", "m1", "u1", kind, group.map(|g| g.to_string()), 1.0)
    }

    #[tokio::test]
    async fn test_duplicate_kind_rejected() {
        let store = MemoryDeclarationStore::new();
        store.insert(row(DeclarationKind::Happy, None)).await.unwrap();
        let err = store.insert(row(DeclarationKind::Happy, None)).await.unwrap_err();
        assert_eq!(err.code(), "already_declared");
    }

    #[tokio::test]
    async fn test_occupied_group_rejected() {
        let store = MemoryDeclarationStore::new();
        store
            .insert(row(DeclarationKind::Like, Some("attitude")))
            .await
            .unwrap();
        let err = store
            .insert(row(DeclarationKind::Dislike, Some("attitude")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "already_declared");
    }

    #[tokio::test]
    async fn test_ungrouped_kinds_coexist() {
        let store = MemoryDeclarationStore::new();
        store
            .insert(row(DeclarationKind::Like, Some("attitude")))
            .await
            .unwrap();
        store.insert(row(DeclarationKind::Happy, None)).await.unwrap();
        store.insert(row(DeclarationKind::Follow, None)).await.unwrap();

        let all = store.list_for_target("Mod", "m1").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_list_for_user_filters_by_kind() {
        let store = MemoryDeclarationStore::new();
        store
            .insert(row(DeclarationKind::Like, Some("attitude")))
            .await
            .unwrap();
        store.insert(row(DeclarationKind::Follow, None)).await.unwrap();

        let likes = store
            .list_for_user("Mod", "u1", None, Some(&DeclarationKind::Like))
            .await
            .unwrap();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].kind, DeclarationKind::Like);

        let all = store.list_for_user("Mod", "u1", None, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryDeclarationStore::new();
        let declaration = row(DeclarationKind::Like, Some("attitude"));
        store.insert(declaration.clone()).await.unwrap();

        assert!(store.delete(&declaration).await.unwrap());
        assert!(!store.delete(&declaration).await.unwrap());
    }
}
