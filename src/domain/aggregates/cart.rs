//! Cart Aggregate
//!
//! [`Cart`] holds the session's candidate purchase: one line per product, each
//! quantity kept within `[1, stock]`. [`CartStore`] is the shareable handle the
//! rest of the application is given; every mutation takes the lock briefly and
//! never across an await.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::product::Product;
use crate::domain::pricing::{self, AmountOutOfRange, Priced};
use crate::domain::value_objects::{Money, ProductId};

/// One row of the cart, with the product fields captured when it was added.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub stock: u32,
    pub images: Vec<String>,
    pub quantity: u32,
}

impl CartLine {
    fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id, name: product.name.clone(), price: product.price,
            sale_price: product.sale_price, stock: product.stock, images: product.images.clone(), quantity,
        }
    }

    fn refresh(&mut self, product: &Product) {
        self.name = product.name.clone();
        self.price = product.price;
        self.sale_price = product.sale_price;
        self.stock = product.stock;
        self.images = product.images.clone();
    }
}

impl Priced for CartLine {
    fn list_price(&self) -> Money { self.price }
    fn sale_price(&self) -> Option<Money> { self.sale_price }
}

/// What a cart mutation did to a line. `quantity == 0` means the line is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CartAdjustment {
    pub product_id: ProductId,
    pub requested: u32,
    pub quantity: u32,
}

impl CartAdjustment {
    /// The stock limit cut the requested quantity down.
    pub fn was_clamped(&self) -> bool { self.quantity < self.requested }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
    checkout_key: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self { Self::new() }
}

impl Cart {
    pub fn new() -> Self {
        let now = Utc::now();
        Self { lines: vec![], checkout_key: Uuid::new_v4(), created_at: now, updated_at: now }
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> { self.lines.iter().find(|l| l.product_id == product_id) }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Idempotency key for submitting this exact cart state; changes on every effective mutation.
    pub fn checkout_key(&self) -> Uuid { self.checkout_key }

    pub fn total_quantity(&self) -> u32 { self.lines.iter().map(|l| l.quantity).sum() }

    pub fn subtotal(&self) -> Result<Money, AmountOutOfRange> {
        pricing::subtotal(self.lines.iter().map(|l| (l.effective_price(), l.quantity)))
    }

    /// Add `quantity` of `product`, merging with an existing line and clamping to stock.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<CartAdjustment, CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        if !product.is_active { return Err(CartError::Unavailable(product.id)); }
        if !product.is_in_stock() { return Err(CartError::OutOfStock(product.id)); }

        let (requested, granted) = match self.lines.iter().position(|l| l.product_id == product.id) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                let requested = line.quantity.saturating_add(quantity);
                line.refresh(product);
                line.quantity = requested.min(product.stock);
                (requested, line.quantity)
            }
            None => {
                let granted = quantity.min(product.stock);
                self.lines.push(CartLine::from_product(product, granted));
                (quantity, granted)
            }
        };
        self.touch();
        let adjustment = CartAdjustment { product_id: product.id, requested, quantity: granted };
        if adjustment.was_clamped() {
            tracing::debug!(product_id = %product.id, requested, granted, "cart quantity clamped to stock");
        }
        Ok(adjustment)
    }

    /// Set a line's quantity. Zero removes the line; unknown products are ignored.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: u32) -> Option<CartAdjustment> {
        let idx = self.lines.iter().position(|l| l.product_id == product_id)?;
        if quantity == 0 {
            self.lines.remove(idx);
            self.touch();
            return Some(CartAdjustment { product_id, requested: 0, quantity: 0 });
        }
        let line = &mut self.lines[idx];
        let clamped = quantity.min(line.stock).max(1);
        if line.quantity != clamped {
            line.quantity = clamped;
            self.touch();
        }
        Some(CartAdjustment { product_id, requested: quantity, quantity: clamped })
    }

    pub fn increment(&mut self, product_id: ProductId) -> Option<CartAdjustment> {
        let current = self.line(product_id)?.quantity;
        self.update_quantity(product_id, current.saturating_add(1))
    }

    pub fn decrement(&mut self, product_id: ProductId) -> Option<CartAdjustment> {
        let current = self.line(product_id)?.quantity;
        self.update_quantity(product_id, current.saturating_sub(1))
    }

    /// Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        let removed = self.lines.len() != before;
        if removed { self.touch(); }
        removed
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    fn touch(&mut self) {
        self.checkout_key = Uuid::new_v4();
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Product {0} is out of stock")]
    OutOfStock(ProductId),
    #[error("Product {0} is not available")]
    Unavailable(ProductId),
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
}

/// Session-owned cart handle. Cloning shares the same cart.
#[derive(Clone, Debug, Default)]
pub struct CartStore {
    inner: Arc<Mutex<Cart>>,
}

impl CartStore {
    pub fn new() -> Self { Self::default() }

    fn with_cart<R>(&self, f: impl FnOnce(&mut Cart) -> R) -> R {
        let mut cart = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cart)
    }

    pub fn add_item(&self, product: &Product, quantity: u32) -> Result<CartAdjustment, CartError> {
        self.with_cart(|c| c.add_item(product, quantity))
    }

    pub fn update_quantity(&self, product_id: ProductId, quantity: u32) -> Option<CartAdjustment> {
        self.with_cart(|c| c.update_quantity(product_id, quantity))
    }

    pub fn increment(&self, product_id: ProductId) -> Option<CartAdjustment> { self.with_cart(|c| c.increment(product_id)) }
    pub fn decrement(&self, product_id: ProductId) -> Option<CartAdjustment> { self.with_cart(|c| c.decrement(product_id)) }
    pub fn remove_item(&self, product_id: ProductId) -> bool { self.with_cart(|c| c.remove_item(product_id)) }
    pub fn clear(&self) { self.with_cart(Cart::clear) }
    pub fn total_quantity(&self) -> u32 { self.with_cart(|c| c.total_quantity()) }
    pub fn subtotal(&self) -> Result<Money, AmountOutOfRange> { self.with_cart(|c| c.subtotal()) }
    pub fn is_empty(&self) -> bool { self.with_cart(|c| c.is_empty()) }

    /// A copy of the cart as it is right now.
    pub fn snapshot(&self) -> Cart { self.with_cart(|c| c.clone()) }

    /// Empty the cart once an order placed from the `submitted` checkout key
    /// was acknowledged. Returns `true` when the cart had been edited since
    /// that snapshot was taken.
    pub fn clear_after_checkout(&self, submitted: Uuid) -> bool {
        self.with_cart(|c| {
            let changed = c.checkout_key() != submitted;
            c.clear();
            changed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, stock: u32) -> Product { Product::new("Widget", Money::from_major(price), stock) }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        let p = product(10, 10);
        cart.add_item(&p, 2).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.subtotal(), Ok(Money::from_major(20)));
        cart.add_item(&p, 1).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3); // Merged
    }

    #[test]
    fn test_out_of_stock_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        cart.add_item(&product(10, 4), 1).unwrap();
        let before = cart.clone();
        let empty = product(10, 0);
        assert_eq!(cart.add_item(&empty, 1), Err(CartError::OutOfStock(empty.id)));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_inactive_and_zero_quantity_rejected() {
        let mut cart = Cart::new();
        let mut p = product(10, 4);
        assert_eq!(cart.add_item(&p, 0), Err(CartError::InvalidQuantity));
        p.is_active = false;
        assert_eq!(cart.add_item(&p, 1), Err(CartError::Unavailable(p.id)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_clamps_to_stock() {
        let mut cart = Cart::new();
        let p = product(10, 3);
        let adj = cart.add_item(&p, 5).unwrap();
        assert!(adj.was_clamped());
        assert_eq!(adj.quantity, 3);
        let adj = cart.add_item(&p, 2).unwrap();
        assert_eq!((adj.requested, adj.quantity), (5, 3));
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_readd_refreshes_snapshot() {
        let mut cart = Cart::new();
        let mut p = product(10, 10);
        cart.add_item(&p, 6).unwrap();
        p.stock = 4;
        p.sale_price = Some(Money::from_major(8));
        cart.add_item(&p, 1).unwrap();
        let line = cart.line(p.id).unwrap();
        assert_eq!(line.quantity, 4);
        assert_eq!(line.stock, 4);
        assert_eq!(cart.subtotal(), Ok(Money::from_major(32)));
    }

    #[test]
    fn test_update_quantity_bounds() {
        let mut cart = Cart::new();
        let p = product(10, 5);
        cart.add_item(&p, 2).unwrap();
        assert_eq!(cart.update_quantity(p.id, 9).unwrap().quantity, 5);
        assert_eq!(cart.update_quantity(p.id, 1).unwrap().quantity, 1);
        cart.update_quantity(p.id, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_unknown_is_noop() {
        let mut cart = Cart::new();
        cart.add_item(&product(10, 5), 2).unwrap();
        let before = cart.clone();
        assert!(cart.update_quantity(ProductId::new(), 3).is_none());
        assert!(!cart.remove_item(ProductId::new()));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_update_quantity_is_idempotent() {
        let mut cart = Cart::new();
        let p = product(10, 5);
        cart.add_item(&p, 1).unwrap();
        cart.update_quantity(p.id, 3);
        let once = cart.clone();
        cart.update_quantity(p.id, 3);
        assert_eq!(cart, once);
    }

    #[test]
    fn test_increment_decrement() {
        let mut cart = Cart::new();
        let p = product(10, 2);
        cart.add_item(&p, 1).unwrap();
        cart.increment(p.id);
        cart.increment(p.id);
        assert_eq!(cart.total_quantity(), 2);
        cart.decrement(p.id);
        cart.decrement(p.id);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_checkout_key_changes_on_mutation() {
        let mut cart = Cart::new();
        let p = product(10, 5);
        let k0 = cart.checkout_key();
        cart.add_item(&p, 1).unwrap();
        let k1 = cart.checkout_key();
        assert_ne!(k0, k1);
        cart.update_quantity(p.id, 1);
        assert_eq!(cart.checkout_key(), k1);
    }

    #[test]
    fn test_quantities_stay_within_stock() {
        let mut cart = Cart::new();
        let products: Vec<Product> = (1..=5).map(|s| product(10, s)).collect();
        for (i, p) in products.iter().enumerate() {
            cart.add_item(p, (i as u32) * 3 + 1).unwrap();
            cart.increment(p.id);
        }
        let sum: u32 = cart.lines().iter().map(|l| l.quantity).sum();
        assert_eq!(cart.total_quantity(), sum);
        assert!(cart.lines().iter().all(|l| l.quantity >= 1 && l.quantity <= l.stock));
    }

    #[test]
    fn test_store_clones_share_state() {
        let store = CartStore::new();
        let other = store.clone();
        let p = product(25, 5);
        store.add_item(&p, 2).unwrap();
        assert_eq!(other.total_quantity(), 2);
        assert_eq!(other.subtotal(), Ok(Money::from_major(50)));
        other.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_after_checkout_reports_edits() {
        let store = CartStore::new();
        let p = product(10, 5);
        store.add_item(&p, 1).unwrap();
        let key = store.snapshot().checkout_key();
        assert!(!store.clear_after_checkout(key));
        assert!(store.is_empty());

        store.add_item(&p, 1).unwrap();
        let key = store.snapshot().checkout_key();
        store.increment(p.id);
        assert!(store.clear_after_checkout(key));
        assert!(store.is_empty());
    }
}
