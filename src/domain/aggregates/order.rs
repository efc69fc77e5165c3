//! Order Aggregate
//!
//! An order is created once from a priced [`OrderPayload`]. Its business fields
//! and totals are frozen at that point; only `status` moves afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::pricing::ShippingPolicy;
use crate::domain::validation::{first_failure, not_blank, ValidationError};
use crate::domain::value_objects::{Money, OrderId, ProductId};

/// Order lifecycle label. Any status may be set from any other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Confirmed, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| InvalidStatusError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid order status: {0:?}")]
pub struct InvalidStatusError(pub String);

/// Payment method recorded on the order. Only the label is stored; no charge is made.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Bit,
    CreditCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Bit => "bit",
            Self::CreditCard => "credit_card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cash" => Ok(Self::Cash),
            "bank_transfer" => Ok(Self::BankTransfer),
            "bit" => Ok(Self::Bit),
            "credit_card" => Ok(Self::CreditCard),
            "" => Err(ValidationError::missing("payment_method")),
            _ => Err(ValidationError::new("payment_method", "is not a supported payment method")),
        }
    }
}

/// A purchased line, frozen at order time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price: Money,
}

/// The `createOrder` request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OrderPayload {
    #[validate(custom = "not_blank")]
    pub customer_name: String,
    #[validate(custom = "not_blank", email)]
    pub customer_email: String,
    #[validate(custom = "not_blank")]
    pub customer_phone: String,
    #[validate(custom = "not_blank")]
    pub shipping_address: String,
    #[validate(custom = "not_blank")]
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<Uuid>,
}

pub const CUSTOMER_FIELDS: [&str; 5] = ["customer_name", "customer_email", "customer_phone", "shipping_address", "city"];

impl OrderPayload {
    /// Server-side acceptance check: required fields, items, initial status and
    /// totals consistent with `policy`.
    pub fn verify(&self, policy: &ShippingPolicy) -> Result<(), ValidationError> {
        if let Err(errors) = self.validate() {
            return Err(first_failure(&errors, &CUSTOMER_FIELDS));
        }
        if self.items.is_empty() { return Err(ValidationError::missing("items")); }
        for item in &self.items {
            if item.quantity == 0 { return Err(ValidationError::new("items", "quantity must be at least 1")); }
            if !item.price.is_positive() { return Err(ValidationError::new("items", "price must be positive")); }
            if item.product_name.trim().is_empty() { return Err(ValidationError::new("items", "product name is required")); }
        }
        if self.status != OrderStatus::Pending {
            return Err(ValidationError::new("status", "new orders must be pending"));
        }
        let expected = policy.breakdown(self.items.iter().map(|i| (i.price, i.quantity)))?;
        if self.subtotal != expected.subtotal { return Err(ValidationError::new("subtotal", "does not match the items")); }
        if self.shipping_cost != expected.shipping_cost { return Err(ValidationError::new("shipping_cost", "does not match the shipping policy")); }
        if self.total != expected.total { return Err(ValidationError::new("total", "must equal subtotal plus shipping")); }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    shipping_address: String,
    city: String,
    notes: Option<String>,
    items: Vec<OrderItem>,
    subtotal: Money,
    shipping_cost: Money,
    total: Money,
    payment_method: PaymentMethod,
    status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Freeze an accepted payload into an order.
    pub fn place(id: OrderId, payload: OrderPayload, created_at: DateTime<Utc>) -> Self {
        let notes = payload.notes.filter(|n| !n.trim().is_empty());
        Self {
            id, customer_name: payload.customer_name, customer_email: payload.customer_email,
            customer_phone: payload.customer_phone, shipping_address: payload.shipping_address, city: payload.city,
            notes, items: payload.items, subtotal: payload.subtotal, shipping_cost: payload.shipping_cost,
            total: payload.total, payment_method: payload.payment_method, status: payload.status,
            idempotency_key: payload.idempotency_key, created_at, updated_at: created_at,
        }
    }

    /// Rehydrate the mutable part of a stored order.
    pub(crate) fn with_status(mut self, status: OrderStatus, updated_at: DateTime<Utc>) -> Self {
        self.status = status;
        self.updated_at = updated_at;
        self
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn customer_name(&self) -> &str { &self.customer_name }
    pub fn customer_email(&self) -> &str { &self.customer_email }
    pub fn customer_phone(&self) -> &str { &self.customer_phone }
    pub fn shipping_address(&self) -> &str { &self.shipping_address }
    pub fn city(&self) -> &str { &self.city }
    pub fn notes(&self) -> Option<&str> { self.notes.as_deref() }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn subtotal(&self) -> Money { self.subtotal }
    pub fn shipping_cost(&self) -> Money { self.shipping_cost }
    pub fn total(&self) -> Money { self.total }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn idempotency_key(&self) -> Option<Uuid> { self.idempotency_key }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Move to `status`, returning the previous one.
    pub fn set_status(&mut self, status: OrderStatus) -> OrderStatus {
        let previous = std::mem::replace(&mut self.status, status);
        self.updated_at = Utc::now();
        previous
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn payload() -> OrderPayload {
        let items = vec![
            OrderItem { product_id: ProductId::new(), product_name: "Camera".into(), quantity: 2, price: Money::from_major(100) },
            OrderItem { product_id: ProductId::new(), product_name: "Sensor".into(), quantity: 1, price: Money::from_major(30) },
        ];
        OrderPayload {
            customer_name: "Noa Levi".into(), customer_email: "noa@example.com".into(), customer_phone: "050-1234567".into(),
            shipping_address: "12 Herzl St".into(), city: "Haifa".into(), notes: None, items,
            subtotal: Money::from_major(230), shipping_cost: Money::from_major(50), total: Money::from_major(280),
            payment_method: PaymentMethod::Cash, status: OrderStatus::Pending, idempotency_key: None,
        }
    }

    #[test]
    fn test_status_labels() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!("refunded".parse::<OrderStatus>(), Err(InvalidStatusError("refunded".into())));
        assert_eq!(serde_json::to_string(&OrderStatus::Delivered).unwrap(), "\"delivered\"");
    }

    #[test]
    fn test_payment_method_labels() {
        assert_eq!("bank_transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
        assert_eq!("paypal".parse::<PaymentMethod>().unwrap_err().field, "payment_method");
        assert_eq!(serde_json::to_string(&PaymentMethod::CreditCard).unwrap(), "\"credit_card\"");
    }

    #[test]
    fn test_verify_accepts_consistent_payload() {
        assert_eq!(payload().verify(&ShippingPolicy::default()), Ok(()));
    }

    #[test]
    fn test_verify_rejects() {
        let policy = ShippingPolicy::default();
        let mut p = payload();
        p.city = "  ".into();
        assert_eq!(p.verify(&policy).unwrap_err(), ValidationError::missing("city"));

        let mut p = payload();
        p.items.clear();
        assert_eq!(p.verify(&policy).unwrap_err().field, "items");

        let mut p = payload();
        p.total = Money::from_major(230);
        assert_eq!(p.verify(&policy).unwrap_err().field, "total");

        let mut p = payload();
        p.shipping_cost = Money::ZERO;
        p.total = Money::from_major(230);
        assert_eq!(p.verify(&policy).unwrap_err().field, "shipping_cost");

        let mut p = payload();
        p.status = OrderStatus::Shipped;
        assert_eq!(p.verify(&policy).unwrap_err().field, "status");
    }

    #[test]
    fn test_verify_rejects_amount_overflow() {
        let mut p = payload();
        p.items[0].price = "79228162514264337593543950335".parse().unwrap();
        p.items[0].quantity = 2;
        assert_eq!(p.verify(&ShippingPolicy::default()), Err(ValidationError::new("items", "amount out of range")));
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(OrderId::new(), payload(), Utc::now());
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.set_status(OrderStatus::Delivered), OrderStatus::Pending);
        assert_eq!(order.set_status(OrderStatus::Pending), OrderStatus::Delivered);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.subtotal().checked_add(order.shipping_cost()), Some(order.total()));
        let item_sum = crate::domain::pricing::subtotal(order.items().iter().map(|i| (i.price, i.quantity)));
        assert_eq!(item_sum, Ok(order.subtotal()));
    }

    #[test]
    fn test_blank_notes_dropped() {
        let mut p = payload();
        p.notes = Some("   ".into());
        assert_eq!(Order::place(OrderId::new(), p, Utc::now()).notes(), None);
    }
}
