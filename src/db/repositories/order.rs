//! Order repository
//!
//! `place` runs the whole checkout in one transaction. Stock is reserved
//! first with conditional decrements, so SQLite takes its write lock before
//! anything is read. Address ownership, product lookup and the price
//! snapshot follow, then the order rows. Returning before `commit` drops
//! the transaction, which rolls back every decrement made so far.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::money::{from_minor, to_minor};
use crate::models::{
    price_order, Address, CreateOrderInput, Order, OrderItem, OrderItemProduct, OrderLine,
    OrderStatus, OrderTotals, PricingError, UserSummary,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

/// Result of a checkout attempt that did not hit a database error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOrderOutcome {
    /// Order committed with this ID
    Placed(i64),
    /// The address does not exist or belongs to someone else
    AddressNotFound,
    /// At least one product is missing or inactive
    ProductsUnavailable,
    /// Not enough stock for the named product
    InsufficientStock(String),
    /// The order total does not fit the stored amount range
    AmountOutOfRange,
}

/// Order repository trait
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Orders newest first, limited to one buyer when `user_id` is set
    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Order>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>>;

    /// Place an order for `user_id` atomically
    async fn place(&self, user_id: i64, input: &CreateOrderInput) -> Result<PlaceOrderOutcome>;

    /// Seller of every product on the order, one entry per line
    async fn item_seller_ids(&self, order_id: i64) -> Result<Vec<i64>>;

    /// Returns false if the order does not exist
    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<bool>;
}

/// SQLx-based order repository implementation
pub struct SqlxOrderRepository {
    pool: DynDatabasePool,
}

impl SqlxOrderRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn OrderRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_ORDER: &str = r#"
    SELECT o.id, o.user_id, o.address_id, o.subtotal_minor, o.tax_minor, o.delivery_fee_minor,
           o.total_minor, o.status, o.created_at, o.updated_at,
           u.name AS user_name, u.email AS user_email,
           a.user_id AS address_user_id, a.label AS address_label, a.line1 AS address_line1,
           a.line2 AS address_line2, a.city AS address_city, a.state AS address_state,
           a.pincode AS address_pincode, a.is_default AS address_is_default,
           a.created_at AS address_created_at, a.updated_at AS address_updated_at
    FROM orders o
    INNER JOIN users u ON u.id = o.user_id
    INNER JOIN addresses a ON a.id = o.address_id
"#;

const SELECT_ITEMS: &str = r#"
    SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.unit_price_minor, oi.line_total_minor,
           p.name AS product_name, p.price_minor AS product_price_minor, p.unit AS product_unit
    FROM order_items oi
    INNER JOIN products p ON p.id = oi.product_id
    WHERE oi.order_id = ?
    ORDER BY oi.id
"#;

const SELECT_OWNED_ADDRESS: &str = "SELECT id FROM addresses WHERE id = ? AND user_id = ?";

const DECREMENT_STOCK: &str = r#"
    UPDATE products
    SET stock_quantity = stock_quantity - ?, updated_at = ?
    WHERE id = ? AND is_active = ? AND stock_quantity >= ?
"#;

const INSERT_ORDER: &str = r#"
    INSERT INTO orders (user_id, address_id, subtotal_minor, tax_minor, delivery_fee_minor,
                        total_minor, status, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_ITEM: &str = r#"
    INSERT INTO order_items (order_id, product_id, quantity, unit_price_minor, line_total_minor)
    VALUES (?, ?, ?, ?, ?)
"#;

const SELECT_ITEM_SELLERS: &str = r#"
    SELECT p.seller_id
    FROM order_items oi
    INNER JOIN products p ON p.id = oi.product_id
    WHERE oi.order_id = ?
"#;

/// Active-product lookup for a set of IDs
fn select_products_sql(count: usize) -> String {
    let placeholders = vec!["?"; count].join(", ");
    format!(
        "SELECT id, name, price_minor FROM products WHERE is_active = ? AND id IN ({})",
        placeholders
    )
}

/// Total quantity asked for each product, `None` when the sum overflows
fn requested_quantities(lines: &[OrderLine]) -> BTreeMap<i64, Option<i64>> {
    let mut requested: BTreeMap<i64, Option<i64>> = BTreeMap::new();
    for line in lines {
        let total = requested.entry(line.product_id).or_insert(Some(0));
        *total = total.and_then(|sum| sum.checked_add(line.quantity));
    }
    requested
}

/// Minor-unit amounts of an order
struct MinorTotals {
    subtotal: i64,
    tax: i64,
    delivery_fee: i64,
    total: i64,
}

impl MinorTotals {
    fn from_totals(totals: &OrderTotals) -> Option<Self> {
        Some(Self {
            subtotal: to_minor(totals.subtotal).ok()?,
            tax: to_minor(totals.tax).ok()?,
            delivery_fee: to_minor(totals.delivery_fee).ok()?,
            total: to_minor(totals.total).ok()?,
        })
    }
}

/// An order line ready to insert
struct ItemRow {
    product_id: i64,
    quantity: i64,
    unit_price: i64,
    line_total: i64,
}

/// Everything the order rows need, computed once stock is reserved
struct Checkout {
    amounts: MinorTotals,
    items: Vec<ItemRow>,
}

/// Name and current price of an active product
type ProductSnapshot = HashMap<i64, (String, Decimal)>;

/// Check reservations and price the order.
///
/// `short` holds the products whose stock could not be reserved. Products
/// are reported in the order the lines name them.
fn prepare_checkout(
    lines: &[OrderLine],
    products: &ProductSnapshot,
    short: &BTreeSet<i64>,
) -> Result<Checkout, PlaceOrderOutcome> {
    if let Some(line) = lines.iter().find(|line| short.contains(&line.product_id)) {
        let name = products
            .get(&line.product_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        return Err(PlaceOrderOutcome::InsufficientStock(name));
    }

    let (priced, totals) = price_order(lines, |id| products.get(&id).map(|(_, price)| *price))
        .map_err(|err| match err {
            PricingError::Unavailable(_) => PlaceOrderOutcome::ProductsUnavailable,
            PricingError::Overflow => PlaceOrderOutcome::AmountOutOfRange,
        })?;

    let amounts = MinorTotals::from_totals(&totals).ok_or(PlaceOrderOutcome::AmountOutOfRange)?;
    let items = priced
        .iter()
        .map(|line| {
            Some(ItemRow {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: to_minor(line.unit_price).ok()?,
                line_total: to_minor(line.line_total).ok()?,
            })
        })
        .collect::<Option<Vec<_>>>()
        .ok_or(PlaceOrderOutcome::AmountOutOfRange)?;

    Ok(Checkout { amounts, items })
}

#[async_trait]
impl OrderRepository for SqlxOrderRepository {
    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Order>> {
        let filter = if user_id.is_some() { " WHERE o.user_id = ?" } else { "" };
        let sql = format!(
            "{}{} ORDER BY o.created_at DESC, o.id DESC",
            SELECT_ORDER, filter
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let mut query = sqlx::query(&sql);
                if let Some(user_id) = user_id {
                    query = query.bind(user_id);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list orders")?;

                let mut orders = Vec::with_capacity(rows.len());
                for row in &rows {
                    let items = load_items_sqlite(pool, row.get("id")).await?;
                    orders.push(row_to_order_sqlite(row, items)?);
                }
                Ok(orders)
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let mut query = sqlx::query(&sql);
                if let Some(user_id) = user_id {
                    query = query.bind(user_id);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list orders")?;

                let mut orders = Vec::with_capacity(rows.len());
                for row in &rows {
                    let items = load_items_mysql(pool, row.get("id")).await?;
                    orders.push(row_to_order_mysql(row, items)?);
                }
                Ok(orders)
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Order>> {
        let sql = format!("{} WHERE o.id = ?", SELECT_ORDER);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get order by ID")?;
                match row {
                    Some(row) => {
                        let items = load_items_sqlite(pool, id).await?;
                        Ok(Some(row_to_order_sqlite(&row, items)?))
                    }
                    None => Ok(None),
                }
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get order by ID")?;
                match row {
                    Some(row) => {
                        let items = load_items_mysql(pool, id).await?;
                        Ok(Some(row_to_order_mysql(&row, items)?))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    async fn place(&self, user_id: i64, input: &CreateOrderInput) -> Result<PlaceOrderOutcome> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => place_order_sqlite(self.pool.sqlite()?, user_id, input).await,
            DatabaseDriver::Mysql => place_order_mysql(self.pool.mysql()?, user_id, input).await,
        }
    }

    async fn item_seller_ids(&self, order_id: i64) -> Result<Vec<i64>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(SELECT_ITEM_SELLERS)
                .bind(order_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to load order sellers"),
            DatabaseDriver::Mysql => sqlx::query_scalar(SELECT_ITEM_SELLERS)
                .bind(order_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to load order sellers"),
        }
    }

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<bool> {
        let sql = "UPDATE orders SET status = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update order status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update order status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn place_order_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    input: &CreateOrderInput,
) -> Result<PlaceOrderOutcome> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let requested = requested_quantities(&input.items);
    let mut short = BTreeSet::new();
    for (&product_id, &quantity) in &requested {
        let reserved = match quantity {
            Some(quantity) => {
                sqlx::query(DECREMENT_STOCK)
                    .bind(quantity)
                    .bind(now)
                    .bind(product_id)
                    .bind(true)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to decrement stock")?
                    .rows_affected()
                    == 1
            }
            None => false,
        };
        if !reserved {
            short.insert(product_id);
        }
    }

    let address: Option<i64> = sqlx::query_scalar(SELECT_OWNED_ADDRESS)
        .bind(input.address_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to look up address")?;
    if address.is_none() {
        return Ok(PlaceOrderOutcome::AddressNotFound);
    }

    let sql = select_products_sql(requested.len());
    let mut query = sqlx::query(&sql).bind(true);
    for id in requested.keys() {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(&mut *tx)
        .await
        .context("Failed to look up products")?;
    if rows.len() != requested.len() {
        return Ok(PlaceOrderOutcome::ProductsUnavailable);
    }

    let products: ProductSnapshot = rows
        .iter()
        .map(|row| {
            let price: i64 = row.get("price_minor");
            (row.get("id"), (row.get("name"), from_minor(price)))
        })
        .collect();

    let checkout = match prepare_checkout(&input.items, &products, &short) {
        Ok(checkout) => checkout,
        Err(outcome) => return Ok(outcome),
    };

    let order_id = sqlx::query(INSERT_ORDER)
        .bind(user_id)
        .bind(input.address_id)
        .bind(checkout.amounts.subtotal)
        .bind(checkout.amounts.tax)
        .bind(checkout.amounts.delivery_fee)
        .bind(checkout.amounts.total)
        .bind(OrderStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create order")?
        .last_insert_rowid();

    for item in &checkout.items {
        sqlx::query(INSERT_ITEM)
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await
            .context("Failed to create order item")?;
    }

    tx.commit().await.context("Failed to commit order")?;
    Ok(PlaceOrderOutcome::Placed(order_id))
}

async fn load_items_sqlite(pool: &SqlitePool, order_id: i64) -> Result<Vec<OrderItem>> {
    let rows = sqlx::query(SELECT_ITEMS)
        .bind(order_id)
        .fetch_all(pool)
        .await
        .context("Failed to load order items")?;

    Ok(rows
        .iter()
        .map(|row| {
            order_item(
                ItemColumns {
                    id: row.get("id"),
                    order_id: row.get("order_id"),
                    product_id: row.get("product_id"),
                    quantity: row.get("quantity"),
                    unit_price_minor: row.get("unit_price_minor"),
                    line_total_minor: row.get("line_total_minor"),
                },
                row.get("product_name"),
                row.get("product_price_minor"),
                row.get("product_unit"),
            )
        })
        .collect())
}

fn row_to_order_sqlite(row: &sqlx::sqlite::SqliteRow, items: Vec<OrderItem>) -> Result<Order> {
    let status_str: String = row.get("status");
    let status = OrderStatus::from_str(&status_str)
        .with_context(|| format!("Invalid order status in database: {}", status_str))?;
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    let user_id: i64 = row.get("user_id");
    let address_id: i64 = row.get("address_id");

    Ok(Order {
        id: row.get("id"),
        user_id,
        address_id,
        subtotal: from_minor(row.get("subtotal_minor")),
        tax: from_minor(row.get("tax_minor")),
        delivery_fee: from_minor(row.get("delivery_fee_minor")),
        total: from_minor(row.get("total_minor")),
        status,
        created_at,
        updated_at,
        user: UserSummary {
            id: user_id,
            name: row.get("user_name"),
            email: Some(row.get("user_email")),
        },
        address: Address {
            id: address_id,
            user_id: row.get("address_user_id"),
            label: row.get("address_label"),
            line1: row.get("address_line1"),
            line2: row.get("address_line2"),
            city: row.get("address_city"),
            state: row.get("address_state"),
            pincode: row.get("address_pincode"),
            is_default: row.get("address_is_default"),
            created_at: row.get("address_created_at"),
            updated_at: row.get("address_updated_at"),
        },
        order_items: items,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn place_order_mysql(
    pool: &MySqlPool,
    user_id: i64,
    input: &CreateOrderInput,
) -> Result<PlaceOrderOutcome> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let requested = requested_quantities(&input.items);
    let mut short = BTreeSet::new();
    for (&product_id, &quantity) in &requested {
        let reserved = match quantity {
            Some(quantity) => {
                sqlx::query(DECREMENT_STOCK)
                    .bind(quantity)
                    .bind(now)
                    .bind(product_id)
                    .bind(true)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to decrement stock")?
                    .rows_affected()
                    == 1
            }
            None => false,
        };
        if !reserved {
            short.insert(product_id);
        }
    }

    let address: Option<i64> = sqlx::query_scalar(SELECT_OWNED_ADDRESS)
        .bind(input.address_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to look up address")?;
    if address.is_none() {
        return Ok(PlaceOrderOutcome::AddressNotFound);
    }

    let sql = select_products_sql(requested.len());
    let mut query = sqlx::query(&sql).bind(true);
    for id in requested.keys() {
        query = query.bind(*id);
    }
    let rows = query
        .fetch_all(&mut *tx)
        .await
        .context("Failed to look up products")?;
    if rows.len() != requested.len() {
        return Ok(PlaceOrderOutcome::ProductsUnavailable);
    }

    let products: ProductSnapshot = rows
        .iter()
        .map(|row| {
            let price: i64 = row.get("price_minor");
            (row.get("id"), (row.get("name"), from_minor(price)))
        })
        .collect();

    let checkout = match prepare_checkout(&input.items, &products, &short) {
        Ok(checkout) => checkout,
        Err(outcome) => return Ok(outcome),
    };

    let order_id = sqlx::query(INSERT_ORDER)
        .bind(user_id)
        .bind(input.address_id)
        .bind(checkout.amounts.subtotal)
        .bind(checkout.amounts.tax)
        .bind(checkout.amounts.delivery_fee)
        .bind(checkout.amounts.total)
        .bind(OrderStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create order")?
        .last_insert_id() as i64;

    for item in &checkout.items {
        sqlx::query(INSERT_ITEM)
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await
            .context("Failed to create order item")?;
    }

    tx.commit().await.context("Failed to commit order")?;
    Ok(PlaceOrderOutcome::Placed(order_id))
}

async fn load_items_mysql(pool: &MySqlPool, order_id: i64) -> Result<Vec<OrderItem>> {
    let rows = sqlx::query(SELECT_ITEMS)
        .bind(order_id)
        .fetch_all(pool)
        .await
        .context("Failed to load order items")?;

    Ok(rows
        .iter()
        .map(|row| {
            order_item(
                ItemColumns {
                    id: row.get("id"),
                    order_id: row.get("order_id"),
                    product_id: row.get("product_id"),
                    quantity: row.get("quantity"),
                    unit_price_minor: row.get("unit_price_minor"),
                    line_total_minor: row.get("line_total_minor"),
                },
                row.get("product_name"),
                row.get("product_price_minor"),
                row.get("product_unit"),
            )
        })
        .collect())
}

fn row_to_order_mysql(row: &sqlx::mysql::MySqlRow, items: Vec<OrderItem>) -> Result<Order> {
    let status_str: String = row.get("status");
    let status = OrderStatus::from_str(&status_str)
        .with_context(|| format!("Invalid order status in database: {}", status_str))?;
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    let user_id: i64 = row.get("user_id");
    let address_id: i64 = row.get("address_id");

    Ok(Order {
        id: row.get("id"),
        user_id,
        address_id,
        subtotal: from_minor(row.get("subtotal_minor")),
        tax: from_minor(row.get("tax_minor")),
        delivery_fee: from_minor(row.get("delivery_fee_minor")),
        total: from_minor(row.get("total_minor")),
        status,
        created_at,
        updated_at,
        user: UserSummary {
            id: user_id,
            name: row.get("user_name"),
            email: Some(row.get("user_email")),
        },
        address: Address {
            id: address_id,
            user_id: row.get("address_user_id"),
            label: row.get("address_label"),
            line1: row.get("address_line1"),
            line2: row.get("address_line2"),
            city: row.get("address_city"),
            state: row.get("address_state"),
            pincode: row.get("address_pincode"),
            is_default: row.get("address_is_default"),
            created_at: row.get("address_created_at"),
            updated_at: row.get("address_updated_at"),
        },
        order_items: items,
    })
}

struct ItemColumns {
    id: i64,
    order_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price_minor: i64,
    line_total_minor: i64,
}

fn order_item(columns: ItemColumns, name: String, price_minor: i64, unit: String) -> OrderItem {
    OrderItem {
        id: columns.id,
        order_id: columns.order_id,
        product_id: columns.product_id,
        quantity: columns.quantity,
        unit_price: from_minor(columns.unit_price_minor),
        line_total: from_minor(columns.line_total_minor),
        product: OrderItemProduct {
            id: columns.product_id,
            name,
            price: from_minor(price_minor),
            unit,
        },
    }
}
