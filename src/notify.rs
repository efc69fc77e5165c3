//! Order event publishing.
//!
//! Events go to NATS as JSON on `storefront.orders.<kind>`. Without a NATS
//! connection they are only logged.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::domain::OrderEvent;

pub const SUBJECT_PREFIX: &str = "storefront.orders";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to publish event: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError>;
}

pub fn subject_for(event: &OrderEvent) -> String { format!("{SUBJECT_PREFIX}.{}", event.kind()) }

pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        let subject = subject_for(event);
        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        debug!(subject = %subject, order_id = %event.order_id(), "Published order event");
        Ok(())
    }
}

/// Used when no broker is configured.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        debug!(subject = %subject_for(event), order_id = %event.order_id(), "Order event (no broker configured)");
        Ok(())
    }
}
