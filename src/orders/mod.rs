//! Order services: creation on the storefront side and the admin status machine.
pub mod admin;
pub mod service;

pub use admin::{AdminError, OrderAdmin};
pub use service::{CreateOrderError, OrderService};
