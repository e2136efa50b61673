//! Declaration ledger
//!
//! Append-only record of typed stances, one row per unique kind per user
//! per target, owning the counter increments on the referenced target and
//! the event emission that drives downstream recomputes. The counter on a
//! target always equals the sum of ledger-row weights for that kind, and is
//! re-derivable from the rows alone (`reconcile_target`).

pub mod kinds;
pub mod store;

pub use kinds::{DeclarationKind, ExclusivityPolicy, KindGroup};
pub use store::{DeclarationStore, MemoryDeclarationStore, MongoDeclarationStore};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::schemas::DeclarationDoc;
use crate::events::{
    DeclarationEvent, EventBus, SUBJECT_DECLARATION_CANCELLED, SUBJECT_DECLARATION_CREATED,
    SUBJECT_REPORT_CREATED,
};
use crate::registry::{TargetRegistry, TargetSnapshot};
use crate::types::{Result, StanceError};

/// Default declaration weight
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// The declaration ledger service
pub struct DeclarationLedger {
    store: Arc<dyn DeclarationStore>,
    registry: Arc<TargetRegistry>,
    bus: Arc<dyn EventBus>,
    policy: ExclusivityPolicy,
}

impl DeclarationLedger {
    pub fn new(
        store: Arc<dyn DeclarationStore>,
        registry: Arc<TargetRegistry>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            registry,
            bus,
            policy: ExclusivityPolicy::standard(),
        }
    }

    /// Replace the exclusivity policy (target families with custom groups)
    pub fn with_policy(mut self, policy: ExclusivityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Declare a stance on a target
    ///
    /// If the user already holds the same kind the call conflicts. If the
    /// user holds a different, mutually exclusive kind, the existing
    /// declaration is cancelled and replaced in the same call; the two
    /// counter deltas are applied as one atomic increment so readers see a
    /// single net transition.
    pub async fn declare(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kind: DeclarationKind,
        weight: f64,
    ) -> Result<TargetSnapshot> {
        if user_id.is_empty() {
            return Err(StanceError::InvalidArgument("user_id must not be empty".into()));
        }
        if !(weight > 0.0) {
            return Err(StanceError::InvalidArgument(format!(
                "weight must be positive, got {}",
                weight
            )));
        }

        let accessor = self.registry.resolve(target_type)?;
        if !accessor.exists(target_id).await? {
            return Err(StanceError::TargetNotFound(format!(
                "{}/{}",
                target_type, target_id
            )));
        }

        if let Some(existing) = self
            .store
            .find(target_type, target_id, user_id, &kind)
            .await?
        {
            return Err(StanceError::AlreadyDeclared(format!(
                "{} already declared {} on {}/{}",
                user_id, existing.kind, target_type, target_id
            )));
        }

        let group = self.policy.group_for(target_type, &kind);
        let replaced = match group {
            Some(group) => {
                let peers: Vec<DeclarationKind> = group
                    .exclusive_members()
                    .filter(|k| **k != kind)
                    .cloned()
                    .collect();
                self.store
                    .find_any(target_type, target_id, user_id, &peers)
                    .await?
            }
            None => None,
        };

        // The decrement is keyed on this delete actually removing the row;
        // a cancel racing the switch may win, and then it owns both the
        // decrement and the cancelled event.
        let replaced = match replaced {
            Some(previous) => {
                if self.store.delete(&previous).await? {
                    debug!(
                        "Replacing {} with {} for {} on {}/{}",
                        previous.kind, kind, user_id, target_type, target_id
                    );
                    Some(previous)
                } else {
                    None
                }
            }
            None => None,
        };

        let declaration = DeclarationDoc::new(
            target_type,
            target_id,
            user_id,
            kind.clone(),
            group.map(|g| g.name.clone()),
            weight,
        );
        self.store.insert(declaration).await?;

        // Single atomic transition: the replaced kind's decrement and the
        // new kind's increment land in one storage operation.
        let mut deltas: Vec<(DeclarationKind, f64)> = Vec::with_capacity(2);
        if let Some(previous) = &replaced {
            deltas.push((previous.kind.clone(), -previous.weight));
        }
        deltas.push((kind.clone(), weight));
        accessor.increment_counters(target_id, &deltas).await?;

        if let Some(previous) = &replaced {
            self.bus
                .publish(
                    SUBJECT_DECLARATION_CANCELLED,
                    &DeclarationEvent::new(target_type, target_id, user_id, previous.kind.clone()),
                )
                .await?;
        }

        let event = DeclarationEvent::new(target_type, target_id, user_id, kind.clone());
        self.bus.publish(SUBJECT_DECLARATION_CREATED, &event).await?;
        if kind.is_report() {
            self.bus.publish(SUBJECT_REPORT_CREATED, &event).await?;
        }

        accessor.snapshot(target_id).await
    }

    /// Declare with the default weight of 1
    pub async fn declare_default(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kind: DeclarationKind,
    ) -> Result<TargetSnapshot> {
        self.declare(target_type, target_id, user_id, kind, DEFAULT_WEIGHT)
            .await
    }

    /// Cancel a previously declared stance
    ///
    /// The counter is decremented by the weight captured at declare time,
    /// never a fixed 1.
    pub async fn cancel(
        &self,
        target_type: &str,
        target_id: &str,
        user_id: &str,
        kind: DeclarationKind,
    ) -> Result<TargetSnapshot> {
        let accessor = self.registry.resolve(target_type)?;
        if !accessor.exists(target_id).await? {
            return Err(StanceError::TargetNotFound(format!(
                "{}/{}",
                target_type, target_id
            )));
        }

        let declaration = self
            .store
            .find(target_type, target_id, user_id, &kind)
            .await?
            .ok_or_else(|| {
                StanceError::NotDeclared(format!(
                    "{} has not declared {} on {}/{}",
                    user_id, kind, target_type, target_id
                ))
            })?;

        // Delete first: the decrement is keyed on the row actually going
        // away, so a racing cancel cannot decrement twice.
        if !self.store.delete(&declaration).await? {
            return Err(StanceError::NotDeclared(format!(
                "{} has not declared {} on {}/{}",
                user_id, kind, target_type, target_id
            )));
        }

        accessor
            .increment_counters(target_id, &[(kind.clone(), -declaration.weight)])
            .await?;

        self.bus
            .publish(
                SUBJECT_DECLARATION_CANCELLED,
                &DeclarationEvent::new(target_type, target_id, user_id, kind),
            )
            .await?;

        accessor.snapshot(target_id).await
    }

    /// Map of target id to the kinds a user has declared on it
    ///
    /// Used by presentation layers to mark already-liked/followed state.
    /// Anonymous (empty) user ids get an empty map, not an error.
    pub async fn list_user_declarations(
        &self,
        target_type: &str,
        user_id: &str,
        target_ids: Option<&[String]>,
    ) -> Result<HashMap<String, Vec<DeclarationKind>>> {
        if user_id.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = self
            .store
            .list_for_user(target_type, user_id, target_ids, None)
            .await?;

        let mut map: HashMap<String, Vec<DeclarationKind>> = HashMap::new();
        for row in rows {
            map.entry(row.target_id).or_default().push(row.kind);
        }
        Ok(map)
    }

    /// Ids of targets a user declared with one specific kind
    pub async fn list_user_target_ids(
        &self,
        target_type: &str,
        user_id: &str,
        kind: &DeclarationKind,
    ) -> Result<Vec<String>> {
        if user_id.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .store
            .list_for_user(target_type, user_id, None, Some(kind))
            .await?;
        Ok(rows.into_iter().map(|row| row.target_id).collect())
    }

    /// Recompute a target's counters from its ledger rows and overwrite the
    /// denormalized values
    ///
    /// Safety net for a crash between a row write and its counter delta;
    /// the ledger is the source of truth.
    pub async fn reconcile_target(
        &self,
        target_type: &str,
        target_id: &str,
    ) -> Result<TargetSnapshot> {
        let accessor = self.registry.resolve(target_type)?;
        let rows = self.store.list_for_target(target_type, target_id).await?;

        let mut counters: HashMap<String, f64> = HashMap::new();
        let mut declare_counts: HashMap<String, f64> = HashMap::new();
        for row in &rows {
            let field = row.kind.counter_field();
            if accessor.config().exposes(field) {
                *counters.entry(field.to_string()).or_insert(0.0) += row.weight;
            }
            *declare_counts
                .entry(row.kind.declare_key().to_string())
                .or_insert(0.0) += row.weight;
        }

        accessor
            .set_counters(target_id, &counters, &declare_counts)
            .await?;
        info!(
            "Reconciled {} counters for {}/{} from {} rows",
            counters.len(),
            target_type,
            target_id,
            rows.len()
        );

        accessor.snapshot(target_id).await
    }
}
