//! In-process event bus
//!
//! Fan-out over unbounded channels for embedded use and tests. Delivery is
//! at-least-once within the process; a dropped receiver is pruned on the
//! next publish.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::{subject_matches, DeclarationEvent, Delivery, EventBus};
use crate::types::Result;

#[derive(Default)]
pub struct LocalEventBus {
    subscribers: Mutex<Vec<(String, mpsc::UnboundedSender<Delivery>)>>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn publish(&self, subject: &str, event: &DeclarationEvent) -> Result<()> {
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        subscribers.retain(|(filter, sender)| {
            if !subject_matches(filter, subject) {
                return true;
            }
            sender.send((subject.to_string(), event.clone())).is_ok()
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<mpsc::UnboundedReceiver<Delivery>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push((filter.to_string(), tx));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SUBJECT_ALL, SUBJECT_DECLARATION_CREATED, SUBJECT_REPORT_CREATED};
    use crate::ledger::kinds::DeclarationKind;

    #[tokio::test]
    async fn test_filtered_delivery() {
        let bus = LocalEventBus::new();
        let mut all = bus.subscribe(SUBJECT_ALL).await.unwrap();
        let mut reports = bus.subscribe(SUBJECT_REPORT_CREATED).await.unwrap();

        let event = DeclarationEvent::new("Rate", "r1", "u1", DeclarationKind::Like);
        bus.publish(SUBJECT_DECLARATION_CREATED, &event).await.unwrap();

        let (subject, delivered) = all.recv().await.unwrap();
        assert_eq!(subject, SUBJECT_DECLARATION_CREATED);
        assert_eq!(delivered, event);

        // report-only subscriber saw nothing
        assert!(reports.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_pruned() {
        let bus = LocalEventBus::new();
        let rx = bus.subscribe(SUBJECT_ALL).await.unwrap();
        drop(rx);

        let event = DeclarationEvent::new("Mod", "m1", "u1", DeclarationKind::Like);
        bus.publish(SUBJECT_DECLARATION_CREATED, &event).await.unwrap();
        assert_eq!(bus.subscribers.lock().unwrap().len(), 0);
    }
}
