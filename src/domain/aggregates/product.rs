//! Product Aggregate
//!
//! Catalog entries as the cart and pricing code see them. The core never writes
//! to the catalog, so products here are read-only snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::pricing::Priced;
use crate::domain::value_objects::{CategoryId, Money, ProductId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub sale_price: Option<Money>,
    pub stock: u32,
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: ProductId::new(), name: name.into(), description: None, price, sale_price: None,
            stock, category_id: None, is_active: true, images: vec![], created_at: Utc::now(),
        }
    }

    pub fn with_sale_price(mut self, sale_price: Money) -> Self { self.sale_price = Some(sale_price); self }
    pub fn in_category(mut self, category_id: CategoryId) -> Self { self.category_id = Some(category_id); self }
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }
}

impl Priced for Product {
    fn list_price(&self) -> Money { self.price }
    fn sale_price(&self) -> Option<Money> { self.sale_price }
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = name.trim().to_lowercase().replace(' ', "-");
        Self { id: CategoryId::new(), name, slug, description: None }
    }
}
