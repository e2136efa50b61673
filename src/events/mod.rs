//! Declaration events and the event bus seam
//!
//! The ledger publishes declaration-created/cancelled notifications after
//! every successful mutation; the weight engine and other listeners consume
//! them with at-least-once semantics, so consumers must be idempotent.

pub mod local;
pub mod nats;

pub use local::LocalEventBus;
pub use nats::NatsEventBus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ledger::kinds::DeclarationKind;
use crate::types::Result;

/// Subject for declaration creation
pub const SUBJECT_DECLARATION_CREATED: &str = "stance.declare.created";

/// Subject for declaration cancellation
pub const SUBJECT_DECLARATION_CANCELLED: &str = "stance.declare.cancelled";

/// Subject for report creation (reports are declarations of a report kind,
/// published on their own subject so report-only listeners can filter)
pub const SUBJECT_REPORT_CREATED: &str = "stance.report.created";

/// Wildcard filter matching every stance subject
pub const SUBJECT_ALL: &str = "stance.>";

/// Notification payload for a declaration transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationEvent {
    pub target_type: String,
    pub target_id: String,
    pub user_id: String,
    pub kind: DeclarationKind,
}

impl DeclarationEvent {
    pub fn new(target_type: &str, target_id: &str, user_id: &str, kind: DeclarationKind) -> Self {
        Self {
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            user_id: user_id.to_string(),
            kind,
        }
    }
}

/// A delivered event: the subject it arrived on plus the payload
pub type Delivery = (String, DeclarationEvent);

/// At-least-once event bus
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event on a subject
    async fn publish(&self, subject: &str, event: &DeclarationEvent) -> Result<()>;

    /// Subscribe to a subject filter (NATS wildcard syntax)
    async fn subscribe(&self, filter: &str) -> Result<mpsc::UnboundedReceiver<Delivery>>;
}

/// NATS-style subject matching: `*` matches one token, a trailing `>`
/// matches the rest
pub fn subject_matches(filter: &str, subject: &str) -> bool {
    let mut filter_tokens = filter.split('.').peekable();
    let mut subject_tokens = subject.split('.');

    loop {
        match (filter_tokens.next(), subject_tokens.next()) {
            (Some(">"), _) => return true,
            (Some(f), Some(s)) if f == "*" || f == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_matching() {
        assert!(subject_matches("stance.>", SUBJECT_DECLARATION_CREATED));
        assert!(subject_matches("stance.>", SUBJECT_REPORT_CREATED));
        assert!(subject_matches("stance.declare.*", SUBJECT_DECLARATION_CANCELLED));
        assert!(subject_matches(
            SUBJECT_DECLARATION_CREATED,
            SUBJECT_DECLARATION_CREATED
        ));
        assert!(!subject_matches("stance.declare.*", SUBJECT_REPORT_CREATED));
        assert!(!subject_matches("stance.declare.created", "stance.declare"));
        assert!(!subject_matches("other.>", SUBJECT_DECLARATION_CREATED));
    }

    #[test]
    fn test_event_json_shape() {
        let event = DeclarationEvent::new("Rate", "r1", "u1", DeclarationKind::Like);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["target_type"], "Rate");
        assert_eq!(json["kind"], "like");
    }
}
