//! Back-office order management: listing, status changes and deletion.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::auth::{AdminAuthority, Unauthorized};
use crate::domain::{InvalidStatusError, Order, OrderEvent, OrderId, OrderStatus};
use crate::notify::EventPublisher;
use crate::storage::{OrderRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Order not found: {0}")]
    NotFound(OrderId),
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatusError),
    #[error("Deletion must be confirmed")]
    ConfirmationRequired,
    #[error("Storage error: {0}")]
    Storage(RepositoryError),
}

impl From<Unauthorized> for AdminError {
    fn from(_: Unauthorized) -> Self { Self::Unauthorized }
}

impl From<RepositoryError> for AdminError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OrderNotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}

pub struct OrderAdmin {
    repo: Arc<dyn OrderRepository>,
    authority: Arc<dyn AdminAuthority>,
    events: Arc<dyn EventPublisher>,
}

impl OrderAdmin {
    pub fn new(repo: Arc<dyn OrderRepository>, authority: Arc<dyn AdminAuthority>, events: Arc<dyn EventPublisher>) -> Self {
        Self { repo, authority, events }
    }

    /// All orders, newest first.
    pub async fn list_orders(&self, token: Option<&str>) -> Result<Vec<Order>, AdminError> {
        self.authority.authorize(token)?;
        Ok(self.repo.list_orders().await?)
    }

    pub async fn get_order(&self, token: Option<&str>, id: OrderId) -> Result<Order, AdminError> {
        self.authority.authorize(token)?;
        self.repo.find_order(id).await?.ok_or(AdminError::NotFound(id))
    }

    /// Set the status label. Any status may follow any other; the last write wins.
    #[instrument(skip(self, token))]
    pub async fn set_status(&self, token: Option<&str>, id: OrderId, status: &str) -> Result<Order, AdminError> {
        self.authority.authorize(token)?;
        let status: OrderStatus = status.parse()?;
        let (order, previous) = self.repo.update_status(id, status).await?;
        info!(order_id = %id, from = %previous, to = %status, "Order status updated");
        self.emit(OrderEvent::StatusChanged { order_id: id, from: previous, to: status }).await;
        Ok(order)
    }

    /// Irreversibly remove an order. `confirmed` must be set by the caller.
    #[instrument(skip(self, token))]
    pub async fn delete_order(&self, token: Option<&str>, id: OrderId, confirmed: bool) -> Result<(), AdminError> {
        self.authority.authorize(token)?;
        if !confirmed {
            return Err(AdminError::ConfirmationRequired);
        }
        self.repo.delete_order(id).await?;
        info!(order_id = %id, "Order deleted");
        self.emit(OrderEvent::Deleted { order_id: id }).await;
        Ok(())
    }

    async fn emit(&self, event: OrderEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!(order_id = %event.order_id(), error = %e, "Failed to publish order event");
        }
    }
}
