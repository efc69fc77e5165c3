//! Postgres storage.
//!
//! Runtime-checked queries in the `query_as::<_, Row>` style; money columns are
//! `NUMERIC` mapped to `rust_decimal::Decimal`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CatalogReader, Inserted, OrderRepository, RepositoryError};
use crate::domain::pricing::effective_price;
use crate::domain::{
    Category, CategoryId, Money, Order, OrderId, OrderItem, OrderPayload, OrderStatus, PaymentMethod, Product, ProductId,
};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock: i32,
    category_id: Option<Uuid>,
    is_active: bool,
    images: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    shipping_address: String,
    city: String,
    notes: Option<String>,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total: Decimal,
    payment_method: String,
    status: String,
    idempotency_key: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price: Decimal,
}

fn to_u32(value: i32, what: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| RepositoryError::Corrupt(format!("negative {what}: {value}")))
}

fn to_i32(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| RepositoryError::Corrupt(format!("quantity out of range: {value}")))
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: r.id.into(), name: r.name, description: r.description, price: r.price.into(),
            sale_price: r.sale_price.map(Money::from), stock: to_u32(r.stock, "stock")?,
            category_id: r.category_id.map(CategoryId::from), is_active: r.is_active, images: r.images,
            created_at: r.created_at,
        })
    }
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category { id: r.id.into(), name: r.name, slug: r.slug, description: r.description }
    }
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(r: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderItem {
            product_id: r.product_id.into(), product_name: r.product_name,
            quantity: to_u32(r.quantity, "quantity")?, price: r.price.into(),
        })
    }
}

fn assemble(row: OrderRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let payment_method: PaymentMethod = row
        .payment_method
        .parse()
        .map_err(|_| RepositoryError::Corrupt(format!("payment method {:?} on order {}", row.payment_method, row.id)))?;
    let status: OrderStatus = row.status.parse().map_err(|e| RepositoryError::Corrupt(format!("{e} on order {}", row.id)))?;
    let payload = OrderPayload {
        customer_name: row.customer_name, customer_email: row.customer_email, customer_phone: row.customer_phone,
        shipping_address: row.shipping_address, city: row.city, notes: row.notes, items,
        subtotal: row.subtotal.into(), shipping_cost: row.shipping_cost.into(), total: row.total.into(),
        payment_method, status, idempotency_key: row.idempotency_key,
    };
    Ok(Order::place(row.id.into(), payload, row.created_at).with_status(status, row.updated_at))
}

async fn load_items<'e, E: PgExecutor<'e>>(exec: E, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT order_id, product_id, product_name, quantity, price FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
    )
    .bind(order_ids)
    .fetch_all(exec)
    .await?;
    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row.try_into()?);
    }
    Ok(grouped)
}

async fn load_orders<'e, E>(exec: E, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut items = load_items(exec, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let order_items = items.remove(&row.id).unwrap_or_default();
            assemble(row, order_items)
        })
        .collect()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn find_by_idempotency_key(&self, key: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(load_orders(&self.pool, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn try_insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in order.items() {
            let row: Option<(i32, Decimal, Option<Decimal>)> =
                sqlx::query_as("SELECT stock, price, sale_price FROM products WHERE id = $1 AND is_active FOR SHARE")
                    .bind(item.product_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;
            let (stock, price, sale_price) = row.ok_or(RepositoryError::ProductNotFound(item.product_id))?;
            let available = to_u32(stock, "stock")?;
            if available < item.quantity {
                return Err(RepositoryError::InsufficientStock {
                    product_id: item.product_id, requested: item.quantity, available,
                });
            }
            let current = effective_price(price.into(), sale_price.map(Money::from));
            if item.price != current {
                return Err(RepositoryError::PriceChanged { product_id: item.product_id, charged: item.price, current });
            }
        }

        sqlx::query(
            "INSERT INTO orders (id, customer_name, customer_email, customer_phone, shipping_address, city, notes, subtotal, shipping_cost, total, payment_method, status, idempotency_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_name())
        .bind(order.customer_email())
        .bind(order.customer_phone())
        .bind(order.shipping_address())
        .bind(order.city())
        .bind(order.notes())
        .bind(order.subtotal().amount())
        .bind(order.shipping_cost().amount())
        .bind(order.total().amount())
        .bind(order.payment_method().as_str())
        .bind(order.status().as_str())
        .bind(order.idempotency_key())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query("INSERT INTO order_items (order_id, position, product_id, product_name, quantity, price) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(order.id().as_uuid())
                .bind(to_i32(position as u32)?)
                .bind(item.product_id.as_uuid())
                .bind(&item.product_name)
                .bind(to_i32(item.quantity)?)
                .bind(item.price.amount())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn is_unique_violation(err: &RepositoryError) -> bool {
    matches!(err, RepositoryError::Database(sqlx::Error::Database(db)) if db.is_unique_violation())
}

#[async_trait]
impl CatalogReader for PgStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products WHERE is_active AND ($1::uuid IS NULL OR category_id = $1) ORDER BY created_at DESC",
        )
        .bind(category.map(|c| c.as_uuid()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug, description FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert_order(&self, order: Order) -> Result<Inserted, RepositoryError> {
        if let Some(key) = order.idempotency_key() {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                debug!(order_id = %existing.id(), "idempotency key replayed");
                return Ok(Inserted { order: existing, replayed: true });
            }
        }
        match self.try_insert(&order).await {
            Ok(()) => Ok(Inserted { order, replayed: false }),
            // A concurrent request with the same key won the insert.
            Err(e) if is_unique_violation(&e) => match order.idempotency_key() {
                Some(key) => self
                    .find_by_idempotency_key(key)
                    .await?
                    .map(|existing| Inserted { order: existing, replayed: true })
                    .ok_or(e),
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        load_orders(&self.pool, rows).await
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(load_orders(&self.pool, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(Order, OrderStatus), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let previous: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let (previous,) = previous.ok_or(RepositoryError::OrderNotFound(id))?;
        let previous: OrderStatus = previous.parse().map_err(|e| RepositoryError::Corrupt(format!("{e} on order {id}")))?;

        let row = sqlx::query_as::<_, OrderRow>("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let order = load_orders(&mut *tx, vec![row]).await?.pop().ok_or(RepositoryError::OrderNotFound(id))?;
        tx.commit().await?;
        Ok((order, previous))
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 { return Err(RepositoryError::OrderNotFound(id)); }
        Ok(())
    }
}
