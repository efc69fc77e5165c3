//! Storefront domain model: catalog snapshots, cart, pricing and orders.
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod validation;
pub mod value_objects;

pub use aggregates::*;
pub use events::OrderEvent;
pub use pricing::{AmountOutOfRange, PriceBreakdown, Priced, ShippingPolicy};
pub use validation::ValidationError;
pub use value_objects::{CategoryId, Money, OrderId, ProductId};
