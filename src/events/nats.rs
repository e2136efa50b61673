//! NATS event bus
//!
//! Connection management mirrors the gateway client: fast failure on the
//! initial connect, keep-alive pings, optional credentials. Payloads are
//! JSON-encoded `DeclarationEvent`s.

use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{DeclarationEvent, Delivery, EventBus};
use crate::config::NatsArgs;
use crate::types::{Result, StanceError};

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// Event bus backed by a NATS connection
#[derive(Clone)]
pub struct NatsEventBus {
    client: Client,
}

impl NatsEventBus {
    /// Connect to NATS
    pub async fn connect(args: &NatsArgs, name: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", args.nats_url);

        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| StanceError::Bus(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self { client })
    }

    /// Get the underlying NATS client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn publish(&self, subject: &str, event: &DeclarationEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(async_nats::Error::from)?;
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<mpsc::UnboundedReceiver<Delivery>> {
        let mut subscription = self
            .client
            .subscribe(filter.to_string())
            .await
            .map_err(async_nats::Error::from)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let filter = filter.to_string();

        tokio::spawn(async move {
            while let Some(message) = subscription.next().await {
                match serde_json::from_slice::<DeclarationEvent>(&message.payload) {
                    Ok(event) => {
                        if tx.send((message.subject.to_string(), event)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Dropping undecodable event on {}: {}", message.subject, e);
                    }
                }
            }
            info!("NATS subscription on '{}' closed", filter);
        });

        Ok(rx)
    }
}
