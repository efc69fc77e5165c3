//! Pricing engine.
//!
//! Pure functions over [`Money`]: effective unit price, subtotal, shipping and
//! grand total. Nothing here rounds; see [`Money::rounded`] for display.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::validation::ValidationError;
use crate::domain::value_objects::Money;

/// Subtotal at or above which shipping is free.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: i64 = 500;
/// Flat shipping charge below the threshold.
pub const DEFAULT_FLAT_SHIPPING_COST: i64 = 50;

/// Anything carrying a list price and an optional sale price.
pub trait Priced {
    fn list_price(&self) -> Money;
    fn sale_price(&self) -> Option<Money>;

    fn effective_price(&self) -> Money { effective_price(self.list_price(), self.sale_price()) }
}

/// The price actually charged.
///
/// A sale price is honoured only when it is non-zero and below the list price.
pub fn effective_price(price: Money, sale_price: Option<Money>) -> Money {
    match sale_price {
        Some(sale) if sale.is_positive() && sale < price => sale,
        _ => price,
    }
}

/// A price, quantity or sum exceeded what [`Money`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("amount out of range")]
pub struct AmountOutOfRange;

impl From<AmountOutOfRange> for ValidationError {
    fn from(err: AmountOutOfRange) -> Self { ValidationError::new("items", err.to_string()) }
}

/// Σ unit price × quantity.
pub fn subtotal<I>(lines: I) -> Result<Money, AmountOutOfRange>
where
    I: IntoIterator<Item = (Money, u32)>,
{
    lines.into_iter().try_fold(Money::ZERO, |acc, (unit, qty)| {
        unit.checked_multiply(qty).and_then(|line| acc.checked_add(line)).ok_or(AmountOutOfRange)
    })
}

pub fn total(subtotal: Money, shipping_cost: Money) -> Result<Money, AmountOutOfRange> {
    subtotal.checked_add(shipping_cost).ok_or(AmountOutOfRange)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    pub free_shipping_threshold: Money,
    pub flat_rate: Money,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_major(DEFAULT_FREE_SHIPPING_THRESHOLD),
            flat_rate: Money::from_major(DEFAULT_FLAT_SHIPPING_COST),
        }
    }
}

impl ShippingPolicy {
    pub fn new(free_shipping_threshold: Money, flat_rate: Money) -> Self { Self { free_shipping_threshold, flat_rate } }

    pub fn shipping_cost(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_shipping_threshold { Money::ZERO } else { self.flat_rate }
    }

    /// How much more the customer must spend to ship for free; `None` once they qualify.
    pub fn remaining_for_free_shipping(&self, subtotal: Money) -> Option<Money> {
        if subtotal >= self.free_shipping_threshold { return None; }
        self.free_shipping_threshold.checked_sub(subtotal)
    }

    /// Price a set of (unit price, quantity) lines in one pass.
    pub fn breakdown<I>(&self, lines: I) -> Result<PriceBreakdown, AmountOutOfRange>
    where
        I: IntoIterator<Item = (Money, u32)>,
    {
        let subtotal = subtotal(lines)?;
        let shipping_cost = self.shipping_cost(subtotal);
        Ok(PriceBreakdown {
            subtotal,
            shipping_cost,
            total: total(subtotal, shipping_cost)?,
            remaining_for_free_shipping: self.remaining_for_free_shipping(subtotal),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    /// Spend still needed for free shipping, shown as a hint while it applies.
    pub remaining_for_free_shipping: Option<Money>,
}
