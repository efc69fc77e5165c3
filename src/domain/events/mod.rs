//! Domain events
use serde::Serialize;
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{Money, OrderId};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: OrderId, customer_email: String, total: Money },
    StatusChanged { order_id: OrderId, from: OrderStatus, to: OrderStatus },
    Deleted { order_id: OrderId },
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            Self::Created { order_id, .. } | Self::StatusChanged { order_id, .. } | Self::Deleted { order_id } => *order_id,
        }
    }

    /// Subject suffix, e.g. `created`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::StatusChanged { .. } => "status_changed",
            Self::Deleted { .. } => "deleted",
        }
    }
}
