//! Server-side order creation.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::checkout::{OrderSubmitter, SubmissionError};
use crate::domain::{Order, OrderEvent, OrderId, OrderPayload, ShippingPolicy, ValidationError};
use crate::notify::EventPublisher;
use crate::storage::{OrderRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum CreateOrderError {
    #[error("Order rejected: {0}")]
    Rejected(ValidationError),
    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    events: Arc<dyn EventPublisher>,
    policy: ShippingPolicy,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>, events: Arc<dyn EventPublisher>, policy: ShippingPolicy) -> Self {
        Self { repo, events, policy }
    }

    /// Accept a payload, re-checking everything the client claims.
    ///
    /// Stock is checked again inside the storage write; a line that exceeds it
    /// rejects the whole order. A replayed idempotency key returns the order
    /// already on file and publishes nothing.
    #[instrument(skip(self, payload), fields(items = payload.items.len(), total = %payload.total))]
    pub async fn create_order(&self, payload: OrderPayload) -> Result<Order, CreateOrderError> {
        payload.verify(&self.policy).map_err(CreateOrderError::Rejected)?;

        let order = Order::place(OrderId::new(), payload, Utc::now());
        let inserted = match self.repo.insert_order(order).await {
            Ok(inserted) => inserted,
            Err(RepositoryError::InsufficientStock { product_id, requested, available }) => {
                return Err(CreateOrderError::Rejected(ValidationError::new(
                    "items",
                    format!("only {available} left of product {product_id} (requested {requested})"),
                )));
            }
            Err(RepositoryError::PriceChanged { product_id, current, .. }) => {
                return Err(CreateOrderError::Rejected(ValidationError::new(
                    "items",
                    format!("price of product {product_id} is now {current}"),
                )));
            }
            Err(RepositoryError::ProductNotFound(product_id)) => {
                return Err(CreateOrderError::Rejected(ValidationError::new(
                    "items",
                    format!("product {product_id} is no longer available"),
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let order = inserted.order;
        if inserted.replayed {
            info!(order_id = %order.id(), "Duplicate submission; returning existing order");
            return Ok(order);
        }

        info!(order_id = %order.id(), "Order created");
        let event = OrderEvent::Created {
            order_id: order.id(),
            customer_email: order.customer_email().to_string(),
            total: order.total(),
        };
        if let Err(e) = self.events.publish(&event).await {
            warn!(order_id = %order.id(), error = %e, "Failed to publish order created event");
        }
        Ok(order)
    }
}

#[async_trait]
impl OrderSubmitter for OrderService {
    async fn create_order(&self, payload: OrderPayload) -> Result<OrderId, SubmissionError> {
        OrderService::create_order(self, payload).await.map(|o| o.id()).map_err(|e| match e {
            CreateOrderError::Rejected(v) => SubmissionError::Rejected(v),
            CreateOrderError::Storage(e) => SubmissionError::Unavailable(e.to_string()),
        })
    }
}
