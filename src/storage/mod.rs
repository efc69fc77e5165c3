//! Storage seams: the catalog read boundary and order persistence.
//!
//! Two implementations share these traits: [`PgStore`] for production and
//! [`InMemoryStore`] for tests and database-less runs.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Category, CategoryId, Money, Order, OrderId, OrderStatus, Product, ProductId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Product not found or inactive: {0}")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: ProductId, requested: u32, available: u32 },

    #[error("Price of product {product_id} is {current}, order charged {charged}")]
    PriceChanged { product_id: ProductId, charged: Money, current: Money },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of an insert. `replayed` is set when the idempotency key matched an
/// existing order and nothing new was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    pub order: Order,
    pub replayed: bool,
}

/// Read-only catalog access. The core never writes products.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Active products, optionally restricted to one category.
    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<Product>, RepositoryError>;

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the order and all of its items as one unit.
    ///
    /// Every item's product must exist, be active, have at least the ordered
    /// quantity in stock and still sell at the item's unit price at write time,
    /// otherwise nothing is written. An order
    /// carrying an idempotency key already on file returns that order instead.
    async fn insert_order(&self, order: Order) -> Result<Inserted, RepositoryError>;

    /// All orders, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Overwrite the status, returning the updated order and the previous status.
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(Order, OrderStatus), RepositoryError>;

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError>;
}
