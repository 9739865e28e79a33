//! Product repository
//!
//! Reads join the seller and the category so a `Product` always carries
//! their summaries. Deleting a product only clears `is_active`.

use crate::config::DatabaseDriver;
use crate::db::{like_pattern, DynDatabasePool};
use crate::models::money::{from_minor, to_minor};
use crate::models::{CategorySummary, CreateProductInput, ListParams, Product, ProductFilter, UserSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Product repository trait
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// One page of active products, newest first, with the total count
    async fn list_active(
        &self,
        filter: &ProductFilter,
        params: &ListParams,
    ) -> Result<(Vec<Product>, i64)>;

    /// Product by ID regardless of its active flag
    async fn get_by_id(&self, id: i64) -> Result<Option<Product>>;

    /// Product by slug regardless of its active flag
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>>;

    async fn create(&self, seller_id: i64, input: &CreateProductInput) -> Result<Product>;

    /// Persist the editable fields of `product`
    async fn update(&self, product: &Product) -> Result<Product>;

    /// Clear the active flag. Returns false if the product does not exist.
    async fn deactivate(&self, id: i64) -> Result<bool>;
}

/// SQLx-based product repository implementation
pub struct SqlxProductRepository {
    pool: DynDatabasePool,
}

impl SqlxProductRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProductRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT p.id, p.slug, p.name, p.description, p.price_minor, p.unit, p.stock_quantity,
           p.is_active, p.seller_id, p.category_id, p.created_at, p.updated_at,
           c.name AS category_name, c.slug AS category_slug,
           u.name AS seller_name
    FROM products p
    INNER JOIN users u ON u.id = p.seller_id
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const COUNT_PRODUCTS: &str = r#"
    SELECT COUNT(*) AS count
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const INSERT_PRODUCT: &str = r#"
    INSERT INTO products (slug, name, description, price_minor, unit, stock_quantity,
                          is_active, seller_id, category_id, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_PRODUCT: &str = r#"
    UPDATE products
    SET slug = ?, name = ?, description = ?, price_minor = ?, unit = ?, stock_quantity = ?,
        category_id = ?, updated_at = ?
    WHERE id = ?
"#;

/// WHERE clause and its string parameters for a listing filter
fn filter_clause(filter: &ProductFilter) -> (String, Vec<String>) {
    let mut conditions = vec!["p.is_active = ?".to_string()];
    let mut binds = Vec::new();

    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("LOWER(p.name) LIKE ? ESCAPE '!'".to_string());
        binds.push(like_pattern(search.trim()));
    }
    if let Some(slug) = filter.category_slug.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("c.slug = ?".to_string());
        binds.push(slug.to_string());
    }

    (format!(" WHERE {}", conditions.join(" AND ")), binds)
}

#[async_trait]
impl ProductRepository for SqlxProductRepository {
    async fn list_active(
        &self,
        filter: &ProductFilter,
        params: &ListParams,
    ) -> Result<(Vec<Product>, i64)> {
        let (clause, binds) = filter_clause(filter);
        let sql = format!(
            "{}{} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
            SELECT_PRODUCT, clause
        );
        let count_sql = format!("{}{}", COUNT_PRODUCTS, clause);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;

                let mut query = sqlx::query(&sql).bind(true);
                let mut count_query = sqlx::query(&count_sql).bind(true);
                for value in &binds {
                    query = query.bind(value);
                    count_query = count_query.bind(value);
                }

                let rows = query
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list products")?;
                let total: i64 = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count products")?
                    .get("count");

                let products = rows
                    .iter()
                    .map(row_to_product_sqlite)
                    .collect::<Result<Vec<_>>>()?;
                Ok((products, total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;

                let mut query = sqlx::query(&sql).bind(true);
                let mut count_query = sqlx::query(&count_sql).bind(true);
                for value in &binds {
                    query = query.bind(value);
                    count_query = count_query.bind(value);
                }

                let rows = query
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list products")?;
                let total: i64 = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count products")?
                    .get("count");

                let products = rows
                    .iter()
                    .map(row_to_product_mysql)
                    .collect::<Result<Vec<_>>>()?;
                Ok((products, total))
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>> {
        let sql = format!("{} WHERE p.id = ?", SELECT_PRODUCT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get product by ID")?;
                row.as_ref().map(row_to_product_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get product by ID")?;
                row.as_ref().map(row_to_product_mysql).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let sql = format!("{} WHERE p.slug = ?", SELECT_PRODUCT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get product by slug")?;
                row.as_ref().map(row_to_product_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get product by slug")?;
                row.as_ref().map(row_to_product_mysql).transpose()
            }
        }
    }

    async fn create(&self, seller_id: i64, input: &CreateProductInput) -> Result<Product> {
        let now = Utc::now();
        let price_minor = to_minor(input.price)?;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_PRODUCT)
                .bind(&input.slug)
                .bind(&input.name)
                .bind(&input.description)
                .bind(price_minor)
                .bind(&input.unit)
                .bind(input.stock_quantity)
                .bind(true)
                .bind(seller_id)
                .bind(input.category_id)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create product")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_PRODUCT)
                .bind(&input.slug)
                .bind(&input.name)
                .bind(&input.description)
                .bind(price_minor)
                .bind(&input.unit)
                .bind(input.stock_quantity)
                .bind(true)
                .bind(seller_id)
                .bind(input.category_id)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create product")?
                .last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Product not found after insert"))
    }

    async fn update(&self, product: &Product) -> Result<Product> {
        let now = Utc::now();
        let price_minor = to_minor(product.price)?;

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_PRODUCT)
                    .bind(&product.slug)
                    .bind(&product.name)
                    .bind(&product.description)
                    .bind(price_minor)
                    .bind(&product.unit)
                    .bind(product.stock_quantity)
                    .bind(product.category_id)
                    .bind(now)
                    .bind(product.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update product")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_PRODUCT)
                    .bind(&product.slug)
                    .bind(&product.name)
                    .bind(&product.description)
                    .bind(price_minor)
                    .bind(&product.unit)
                    .bind(product.stock_quantity)
                    .bind(product.category_id)
                    .bind(now)
                    .bind(product.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update product")?;
            }
        }

        self.get_by_id(product.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Product not found after update"))
    }

    async fn deactivate(&self, id: i64) -> Result<bool> {
        let sql = "UPDATE products SET is_active = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(false)
                .bind(now)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to deactivate product")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(false)
                .bind(now)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to deactivate product")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn category_summary(
    id: Option<i64>,
    name: Option<String>,
    slug: Option<String>,
) -> Option<CategorySummary> {
    match (id, name, slug) {
        (Some(id), Some(name), Some(slug)) => Some(CategorySummary { id, name, slug }),
        _ => None,
    }
}

fn row_to_product_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Product> {
    let category_id: Option<i64> = row.get("category_id");
    let seller_id: i64 = row.get("seller_id");

    Ok(Product {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        description: row.get("description"),
        price: from_minor(row.try_get("price_minor").context("Invalid product price")?),
        unit: row.get("unit"),
        stock_quantity: row.get("stock_quantity"),
        is_active: row.get("is_active"),
        seller_id,
        category_id,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        category: category_summary(
            category_id,
            row.get("category_name"),
            row.get("category_slug"),
        ),
        seller: UserSummary {
            id: seller_id,
            name: row.get("seller_name"),
            email: None,
        },
    })
}

fn row_to_product_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Product> {
    let category_id: Option<i64> = row.get("category_id");
    let seller_id: i64 = row.get("seller_id");

    Ok(Product {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        description: row.get("description"),
        price: from_minor(row.try_get("price_minor").context("Invalid product price")?),
        unit: row.get("unit"),
        stock_quantity: row.get("stock_quantity"),
        is_active: row.get("is_active"),
        seller_id,
        category_id,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        category: category_summary(
            category_id,
            row.get("category_name"),
            row.get("category_slug"),
        ),
        seller: UserSummary {
            id: seller_id,
            name: row.get("seller_name"),
            email: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use rust_decimal::Decimal;

    async fn setup() -> (SqlxProductRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let seller = SqlxUserRepository::new(pool.clone())
            .create(&User {
                id: 0,
                name: "Shree Traders".to_string(),
                email: "seller@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: UserRole::Seller,
                phone: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        (SqlxProductRepository::new(pool), seller.id)
    }

    fn input(name: &str, slug: &str, category_id: Option<i64>) -> CreateProductInput {
        CreateProductInput {
            name: name.to_string(),
            slug: slug.to_string(),
            description: "53 grade".to_string(),
            price: Decimal::new(38550, 2),
            unit: "bag".to_string(),
            stock_quantity: 100,
            category_id,
        }
    }

    #[tokio::test]
    async fn test_create_joins_seller_and_category() {
        let (repo, seller_id) = setup().await;
        let product = repo
            .create(seller_id, &input("UltraTech Cement", "ultratech", Some(1)))
            .await
            .unwrap();

        assert!(product.is_active);
        assert_eq!(product.price, Decimal::new(38550, 2));
        assert_eq!(product.seller.name, "Shree Traders");
        assert_eq!(product.category.as_ref().map(|c| c.slug.as_str()), Some("cement"));
    }

    #[tokio::test]
    async fn test_list_filters_and_hides_inactive() {
        let (repo, seller_id) = setup().await;
        repo.create(seller_id, &input("UltraTech Cement", "ultratech", Some(1))).await.unwrap();
        repo.create(seller_id, &input("ACC Cement", "acc", Some(1))).await.unwrap();
        let tmt = repo.create(seller_id, &input("TMT Bar 12mm", "tmt-12", Some(2))).await.unwrap();
        let hidden = repo.create(seller_id, &input("Old Cement", "old", Some(1))).await.unwrap();
        assert!(repo.deactivate(hidden.id).await.unwrap());

        let all = ProductFilter::default();
        let (items, total) = repo.list_active(&all, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(items[0].id, tmt.id);

        let search = ProductFilter {
            search: Some("CEMENT".to_string()),
            category_slug: None,
        };
        let (items, total) = repo.list_active(&search, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert!(items.iter().all(|p| p.name.contains("Cement")));

        let by_category = ProductFilter {
            search: None,
            category_slug: Some("steel".to_string()),
        };
        let (items, _) = repo.list_active(&by_category, &ListParams::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "tmt-12");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (repo, seller_id) = setup().await;
        repo.create(seller_id, &input("Tiles 50% off", "tiles-sale", None)).await.unwrap();
        repo.create(seller_id, &input("Tiles 500", "tiles-500", None)).await.unwrap();

        let filter = ProductFilter {
            search: Some("50%".to_string()),
            category_slug: None,
        };
        let (items, _) = repo.list_active(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "tiles-sale");
    }

    #[tokio::test]
    async fn test_update_product() {
        let (repo, seller_id) = setup().await;
        let mut product = repo.create(seller_id, &input("Sand", "sand", None)).await.unwrap();

        product.price = Decimal::new(1200, 0);
        product.category_id = Some(4);
        let updated = repo.update(&product).await.unwrap();
        assert_eq!(updated.price, Decimal::new(1200, 0));
        assert_eq!(updated.category.map(|c| c.slug), Some("sand-aggregates".to_string()));

        let by_slug = repo.get_by_slug("sand").await.unwrap().unwrap();
        assert_eq!(by_slug.id, product.id);
    }
}
