//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Defines a UUID-backed identifier so product, category and order ids cannot be mixed up.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh, time-ordered id.
            pub fn new() -> Self { Self(Uuid::now_v7()) }
            pub const fn from_uuid(id: Uuid) -> Self { Self(id) }
            pub const fn as_uuid(&self) -> Uuid { self.0 }
        }

        impl Default for $name { fn default() -> Self { Self::new() } }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self { Self(id) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s).map(Self) }
        }
    };
}

define_id!(ProductId);
define_id!(CategoryId);
define_id!(OrderId);

/// Money value object.
///
/// Single-currency fixed-point amount. Arithmetic never rounds; rounding to two
/// decimals happens only when the value is displayed. Amounts arrive from
/// clients, so arithmetic is checked and reports overflow as `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    /// Whole currency units, e.g. `from_major(500)` is 500.00.
    pub fn from_major(units: i64) -> Self { Self(Decimal::from(units)) }
    /// Minor units (agorot, cents), e.g. `from_minor(49999)` is 499.99.
    pub fn from_minor(minor: i64) -> Self { Self(Decimal::new(minor, 2)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_positive(&self) -> bool { self.0 > Decimal::ZERO }
    pub fn checked_multiply(&self, qty: u32) -> Option<Money> { self.0.checked_mul(Decimal::from(qty)).map(Money) }
    pub fn checked_add(&self, other: Money) -> Option<Money> { self.0.checked_add(other.0).map(Money) }
    pub fn checked_sub(&self, other: Money) -> Option<Money> { self.0.checked_sub(other.0).map(Money) }
    /// Amount rounded half-away-from-zero to two decimals, for presentation only.
    pub fn rounded(&self) -> Decimal { self.0.round_dp(2) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Decimal::from_str(s.trim()).map(Self) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.rounded()) }
}
