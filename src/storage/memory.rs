//! In-process storage backed by `tokio::sync::RwLock`.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CatalogReader, Inserted, OrderRepository, RepositoryError};
use crate::domain::{Category, CategoryId, Order, OrderId, OrderStatus, Priced, Product, ProductId};

#[derive(Default)]
pub struct InMemoryStore {
    products: RwLock<HashMap<ProductId, Product>>,
    categories: RwLock<Vec<Category>>,
    orders: RwLock<Vec<Order>>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_catalog(products: impl IntoIterator<Item = Product>, categories: impl IntoIterator<Item = Category>) -> Self {
        Self {
            products: RwLock::new(products.into_iter().map(|p| (p.id, p)).collect()),
            categories: RwLock::new(categories.into_iter().collect()),
            orders: RwLock::default(),
        }
    }

    pub async fn order_count(&self) -> usize { self.orders.read().await.len() }
}

#[async_trait]
impl CatalogReader for InMemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<Product>, RepositoryError> {
        let mut products: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| p.is_active && category.map_or(true, |c| p.category_id == Some(c)))
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut categories = self.categories.read().await.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<Inserted, RepositoryError> {
        // Orders lock first, then products, held together for the whole insert.
        let mut orders = self.orders.write().await;
        if let Some(key) = order.idempotency_key() {
            if let Some(existing) = orders.iter().find(|o| o.idempotency_key() == Some(key)) {
                return Ok(Inserted { order: existing.clone(), replayed: true });
            }
        }
        let products = self.products.read().await;
        for item in order.items() {
            let product = products
                .get(&item.product_id)
                .filter(|p| p.is_active)
                .ok_or(RepositoryError::ProductNotFound(item.product_id))?;
            if product.stock < item.quantity {
                return Err(RepositoryError::InsufficientStock {
                    product_id: item.product_id, requested: item.quantity, available: product.stock,
                });
            }
            let current = product.effective_price();
            if item.price != current {
                return Err(RepositoryError::PriceChanged { product_id: item.product_id, charged: item.price, current });
            }
        }
        orders.push(order.clone());
        Ok(Inserted { order, replayed: false })
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        // Reverse first so orders sharing a timestamp still come out newest first.
        let mut orders: Vec<Order> = self.orders.read().await.iter().rev().cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.iter().find(|o| o.id() == id).cloned())
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(Order, OrderStatus), RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders.iter_mut().find(|o| o.id() == id).ok_or(RepositoryError::OrderNotFound(id))?;
        let previous = order.set_status(status);
        Ok((order.clone(), previous))
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        let before = orders.len();
        orders.retain(|o| o.id() != id);
        if orders.len() == before { return Err(RepositoryError::OrderNotFound(id)); }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use crate::domain::aggregates::order::tests::payload;
    use crate::domain::Money;

    fn store_for(order: &Order, stock: u32) -> InMemoryStore {
        let products = order.items().iter().map(|i| {
            let mut p = Product::new(i.product_name.clone(), i.price, stock);
            p.id = i.product_id;
            p
        });
        InMemoryStore::with_catalog(products, Vec::new())
    }

    #[tokio::test]
    async fn test_insert_and_replay() {
        let mut p = payload();
        p.idempotency_key = Some(Uuid::new_v4());
        let order = Order::place(OrderId::new(), p.clone(), Utc::now());
        let store = store_for(&order, 10);

        let first = store.insert_order(order.clone()).await.unwrap();
        assert!(!first.replayed);
        let again = store.insert_order(Order::place(OrderId::new(), p, Utc::now())).await.unwrap();
        assert!(again.replayed);
        assert_eq!(again.order.id(), order.id());
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_when_stock_dropped() {
        let order = Order::place(OrderId::new(), payload(), Utc::now());
        let store = store_for(&order, 1);
        let err = store.insert_order(order).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientStock { requested: 2, available: 1, .. }));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_insert_rejects_stale_price() {
        let order = Order::place(OrderId::new(), payload(), Utc::now());
        let item = order.items()[1].clone();
        let mut sensor = Product::new(item.product_name.clone(), Money::from_major(50), 10).with_sale_price(Money::from_major(40));
        sensor.id = item.product_id;
        let store = store_for(&order, 10);
        store.products.write().await.insert(sensor.id, sensor);

        let err = store.insert_order(order).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::PriceChanged { charged, current, .. }
                if charged == Money::from_major(30) && current == Money::from_major(40)
        ));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_status_last_write_wins() {
        let order = Order::place(OrderId::new(), payload(), Utc::now());
        let store = store_for(&order, 10);
        store.insert_order(order.clone()).await.unwrap();
        let (_, prev) = store.update_status(order.id(), OrderStatus::Delivered).await.unwrap();
        assert_eq!(prev, OrderStatus::Pending);
        let (updated, prev) = store.update_status(order.id(), OrderStatus::Pending).await.unwrap();
        assert_eq!(prev, OrderStatus::Delivered);
        assert_eq!(updated.status(), OrderStatus::Pending);
        assert!(matches!(
            store.update_status(OrderId::new(), OrderStatus::Shipped).await,
            Err(RepositoryError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_products_filters() {
        let cat = Category::new("Cameras");
        let in_cat = Product::new("Dome", Money::from_major(120), 3).in_category(cat.id);
        let other = Product::new("Siren", Money::from_major(80), 3);
        let mut hidden = Product::new("Old", Money::from_major(10), 3).in_category(cat.id);
        hidden.is_active = false;
        let store = InMemoryStore::with_catalog([in_cat.clone(), other, hidden], [cat.clone()]);

        assert_eq!(store.list_products(None).await.unwrap().len(), 2);
        let filtered = store.list_products(Some(cat.id)).await.unwrap();
        assert_eq!(filtered, vec![in_cat]);
    }

    #[tokio::test]
    async fn test_delete_is_final() {
        let order = Order::place(OrderId::new(), payload(), Utc::now());
        let store = store_for(&order, 10);
        store.insert_order(order.clone()).await.unwrap();
        store.delete_order(order.id()).await.unwrap();
        assert!(store.find_order(order.id()).await.unwrap().is_none());
        assert!(matches!(store.delete_order(order.id()).await, Err(RepositoryError::OrderNotFound(_))));
    }
}
