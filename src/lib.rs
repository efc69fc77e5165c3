//! Storefront Orders
//!
//! Cart, pricing and order lifecycle for a small single-currency storefront.
//!
//! ## Features
//! - Session cart with stock-bounded quantities
//! - Decimal pricing with configurable free-shipping threshold
//! - Checkout validation and idempotent order submission
//! - Admin order status management over a REST API

pub mod api;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod notify;
pub mod orders;
pub mod storage;

use thiserror::Error;

use crate::checkout::{CheckoutError, SubmissionError};
use crate::domain::ValidationError;
use crate::orders::{AdminError, CreateOrderError};
use crate::storage::RepositoryError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{0} not found")]
    NotFound(String),
}

impl From<CreateOrderError> for StorefrontError {
    fn from(err: CreateOrderError) -> Self {
        match err {
            CreateOrderError::Rejected(v) => Self::Validation(v),
            CreateOrderError::Storage(e) => Self::Repository(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
