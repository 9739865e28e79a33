//! Category repository
//!
//! Categories are seeded by migrations and read-only through the API.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Category, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// One page of categories ordered by name, with the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<Category>, i64)>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_where(&self, clause: &str, bind: Bind<'_>) -> Result<Option<Category>> {
        let sql = format!("{} WHERE {}", SELECT_CATEGORY, clause);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let query = sqlx::query(&sql);
                let query = match bind {
                    Bind::Id(id) => query.bind(id),
                    Bind::Slug(slug) => query.bind(slug),
                };
                let row = query
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get category")?;
                Ok(row.as_ref().map(row_to_category_sqlite))
            }
            DatabaseDriver::Mysql => {
                let query = sqlx::query(&sql);
                let query = match bind {
                    Bind::Id(id) => query.bind(id),
                    Bind::Slug(slug) => query.bind(slug),
                };
                let row = query
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get category")?;
                Ok(row.as_ref().map(row_to_category_mysql))
            }
        }
    }
}

enum Bind<'a> {
    Id(i64),
    Slug(&'a str),
}

const SELECT_CATEGORY: &str = "SELECT id, name, slug, description, created_at FROM categories";

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn list(&self, params: &ListParams) -> Result<(Vec<Category>, i64)> {
        let sql = format!("{} ORDER BY name ASC, id ASC LIMIT ? OFFSET ?", SELECT_CATEGORY);
        let count_sql = "SELECT COUNT(*) AS count FROM categories";

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let rows = sqlx::query(&sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list categories")?;
                let total: i64 = sqlx::query(count_sql)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count categories")?
                    .get("count");
                Ok((rows.iter().map(row_to_category_sqlite).collect(), total))
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let rows = sqlx::query(&sql)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list categories")?;
                let total: i64 = sqlx::query(count_sql)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count categories")?
                    .get("count");
                Ok((rows.iter().map(row_to_category_mysql).collect(), total))
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        self.fetch_one_where("id = ?", Bind::Id(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        self.fetch_one_where("slug = ?", Bind::Slug(slug)).await
    }
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}
