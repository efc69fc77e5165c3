//! Order builder.
//!
//! Turns the session cart and the checkout form into a priced
//! [`OrderPayload`], submits it through an [`OrderSubmitter`] and clears the
//! cart only once the order is acknowledged.

pub mod form;

pub use form::{CardDetails, CheckoutForm, PaymentSelection};

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::{
    AmountOutOfRange, Cart, CartStore, Money, OrderId, OrderItem, OrderPayload, OrderStatus, PriceBreakdown, Priced,
    ShippingPolicy, ValidationError,
};

pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Why a submission did not produce an order. The cart is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("An order submission is already in progress")]
    InFlight,
    #[error("Order submission timed out")]
    Timeout,
    #[error("Order rejected: {0}")]
    Rejected(ValidationError),
    #[error("Order service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Invalid checkout input: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Where finished payloads go. The server's order service implements this
/// in-process; a remote client would implement it over HTTP.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    async fn create_order(&self, payload: OrderPayload) -> Result<OrderId, SubmissionError>;
}

/// What the confirmation view shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub total: Money,
    pub customer_email: String,
    /// The cart was edited while the order was being submitted. Those edits
    /// were cleared with the rest of the cart.
    pub cart_changed: bool,
}

/// Assemble the order payload for `cart`. Pure; no network.
pub fn build_payload(cart: &Cart, form: &CheckoutForm, policy: &ShippingPolicy) -> Result<OrderPayload, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let payment = form.validate_input()?;

    let items: Vec<OrderItem> = cart
        .lines()
        .iter()
        .map(|line| OrderItem {
            product_id: line.product_id,
            product_name: line.name.clone(),
            quantity: line.quantity,
            price: line.effective_price(),
        })
        .collect();
    let priced = policy.breakdown(items.iter().map(|i| (i.price, i.quantity))).map_err(ValidationError::from)?;

    Ok(OrderPayload {
        customer_name: form.customer_name.trim().to_string(),
        customer_email: form.customer_email.trim().to_string(),
        customer_phone: form.customer_phone.trim().to_string(),
        shipping_address: form.shipping_address.trim().to_string(),
        city: form.city.trim().to_string(),
        notes: form.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(String::from),
        items,
        subtotal: priced.subtotal,
        shipping_cost: priced.shipping_cost,
        total: priced.total,
        payment_method: payment.method(),
        status: OrderStatus::Pending,
        idempotency_key: Some(cart.checkout_key()),
    })
}

pub struct Checkout {
    submitter: Arc<dyn OrderSubmitter>,
    policy: ShippingPolicy,
    timeout: Duration,
    in_flight: Mutex<()>,
}

impl Checkout {
    pub fn new(submitter: Arc<dyn OrderSubmitter>, policy: ShippingPolicy) -> Self {
        Self { submitter, policy, timeout: DEFAULT_SUBMIT_TIMEOUT, in_flight: Mutex::new(()) }
    }

    /// Shipping policy and submission timeout taken from service configuration.
    pub fn from_config(submitter: Arc<dyn OrderSubmitter>, config: &AppConfig) -> Self {
        Self::new(submitter, config.shipping).with_timeout(config.submit_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Price the cart as the checkout summary shows it, including the
    /// free-shipping hint.
    pub fn quote(&self, cart: &CartStore) -> Result<PriceBreakdown, AmountOutOfRange> {
        let cart = cart.snapshot();
        self.policy.breakdown(cart.lines().iter().map(|l| (l.effective_price(), l.quantity)))
    }

    /// Validate, price and submit the cart as one order.
    ///
    /// Only one submission runs at a time; a second call while one is
    /// outstanding fails with [`SubmissionError::InFlight`]. The cart stays
    /// usable throughout and is cleared only after the order is acknowledged.
    pub async fn place_order(&self, cart: &CartStore, form: &CheckoutForm) -> Result<OrderReceipt, CheckoutError> {
        let snapshot = cart.snapshot();
        let payload = build_payload(&snapshot, form, &self.policy)?;
        let _guard = self.in_flight.try_lock().map_err(|_| SubmissionError::InFlight)?;

        let total = payload.total;
        let customer_email = payload.customer_email.clone();
        let submitted = tokio::time::timeout(self.timeout, self.submitter.create_order(payload))
            .await
            .map_err(|_| SubmissionError::Timeout)
            .and_then(|result| result);

        let order_id = match submitted {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Order submission failed; cart kept");
                return Err(e.into());
            }
        };

        let cart_changed = cart.clear_after_checkout(snapshot.checkout_key());
        info!(order_id = %order_id, total = %total, cart_changed, "Order placed");
        Ok(OrderReceipt { order_id, total, customer_email, cart_changed })
    }
}
