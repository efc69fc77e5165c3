//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Category, Product};
pub use order::{InvalidStatusError, Order, OrderItem, OrderPayload, OrderStatus, PaymentMethod};
pub use cart::{Cart, CartAdjustment, CartError, CartLine, CartStore};
