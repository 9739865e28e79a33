//! Address repository
//!
//! Every query is scoped by owner. Creating or updating an address with the
//! default flag clears the flag on the owner's other addresses in the same
//! transaction.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Address, CreateAddressInput, UpdateAddressInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Address repository trait
#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// All addresses of a user, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Address>>;

    /// Address by ID, only if it belongs to `user_id`
    async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Address>>;

    async fn create(&self, user_id: i64, input: &CreateAddressInput) -> Result<Address>;

    /// Apply the present fields of `input` to an owned address.
    /// Returns None if the address does not belong to `user_id`.
    async fn update(
        &self,
        id: i64,
        user_id: i64,
        input: &UpdateAddressInput,
    ) -> Result<Option<Address>>;

    /// Delete an address. Returns false if nothing was deleted.
    async fn delete(&self, id: i64, user_id: i64) -> Result<bool>;
}

/// SQLx-based address repository implementation
pub struct SqlxAddressRepository {
    pool: DynDatabasePool,
}

impl SqlxAddressRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AddressRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_ADDRESS: &str = r#"
    SELECT id, user_id, label, line1, line2, city, state, pincode, is_default, created_at, updated_at
    FROM addresses
"#;

const CLEAR_DEFAULTS: &str =
    "UPDATE addresses SET is_default = ?, updated_at = ? WHERE user_id = ? AND id <> ? AND is_default = ?";

const INSERT_ADDRESS: &str = r#"
    INSERT INTO addresses (user_id, label, line1, line2, city, state, pincode, is_default, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const TOUCH_ADDRESS: &str = "UPDATE addresses SET updated_at = ? WHERE id = ? AND user_id = ?";

const UPDATE_ADDRESS: &str = r#"
    UPDATE addresses
    SET label = ?, line1 = ?, line2 = ?, city = ?, state = ?, pincode = ?, is_default = ?, updated_at = ?
    WHERE id = ? AND user_id = ?
"#;

#[async_trait]
impl AddressRepository for SqlxAddressRepository {
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Address>> {
        let sql = format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            SELECT_ADDRESS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list addresses")?;
                Ok(rows.iter().map(row_to_address_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list addresses")?;
                Ok(rows.iter().map(row_to_address_mysql).collect())
            }
        }
    }

    async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Address>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_address_sqlite(self.pool.sqlite()?, id, user_id).await,
            DatabaseDriver::Mysql => get_address_mysql(self.pool.mysql()?, id, user_id).await,
        }
    }

    async fn create(&self, user_id: i64, input: &CreateAddressInput) -> Result<Address> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_address_sqlite(self.pool.sqlite()?, user_id, input).await,
            DatabaseDriver::Mysql => create_address_mysql(self.pool.mysql()?, user_id, input).await,
        }
    }

    async fn update(
        &self,
        id: i64,
        user_id: i64,
        input: &UpdateAddressInput,
    ) -> Result<Option<Address>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_address_sqlite(self.pool.sqlite()?, id, user_id, input).await
            }
            DatabaseDriver::Mysql => {
                update_address_mysql(self.pool.mysql()?, id, user_id, input).await
            }
        }
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM addresses WHERE id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete address")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete address")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_address_sqlite(pool: &SqlitePool, id: i64, user_id: i64) -> Result<Option<Address>> {
    let sql = format!("{} WHERE id = ? AND user_id = ?", SELECT_ADDRESS);
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get address")?;
    Ok(row.as_ref().map(row_to_address_sqlite))
}

async fn create_address_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    input: &CreateAddressInput,
) -> Result<Address> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    if input.is_default {
        sqlx::query(CLEAR_DEFAULTS)
            .bind(false)
            .bind(now)
            .bind(user_id)
            .bind(0i64)
            .bind(true)
            .execute(&mut *tx)
            .await
            .context("Failed to clear default addresses")?;
    }

    let result = sqlx::query(INSERT_ADDRESS)
        .bind(user_id)
        .bind(&input.label)
        .bind(&input.line1)
        .bind(&input.line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.pincode)
        .bind(input.is_default)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create address")?;

    tx.commit().await.context("Failed to commit address")?;

    Ok(new_address(result.last_insert_rowid(), user_id, input, now))
}

async fn update_address_sqlite(
    pool: &SqlitePool,
    id: i64,
    user_id: i64,
    input: &UpdateAddressInput,
) -> Result<Option<Address>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // Writing first takes the database write lock before the row is read.
    let touched = sqlx::query(TOUCH_ADDRESS)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update address")?
        .rows_affected();
    if touched == 0 {
        return Ok(None);
    }

    let sql = format!("{} WHERE id = ? AND user_id = ?", SELECT_ADDRESS);
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to get address")?;
    let mut address = row_to_address_sqlite(&row);
    input.apply_to(&mut address);
    address.updated_at = now;

    if address.is_default {
        sqlx::query(CLEAR_DEFAULTS)
            .bind(false)
            .bind(now)
            .bind(user_id)
            .bind(id)
            .bind(true)
            .execute(&mut *tx)
            .await
            .context("Failed to clear default addresses")?;
    }

    sqlx::query(UPDATE_ADDRESS)
        .bind(&address.label)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.pincode)
        .bind(address.is_default)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update address")?;

    tx.commit().await.context("Failed to commit address")?;

    Ok(Some(address))
}

fn row_to_address_sqlite(row: &sqlx::sqlite::SqliteRow) -> Address {
    Address {
        id: row.get("id"),
        user_id: row.get("user_id"),
        label: row.get("label"),
        line1: row.get("line1"),
        line2: row.get("line2"),
        city: row.get("city"),
        state: row.get("state"),
        pincode: row.get("pincode"),
        is_default: row.get("is_default"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_address_mysql(pool: &MySqlPool, id: i64, user_id: i64) -> Result<Option<Address>> {
    let sql = format!("{} WHERE id = ? AND user_id = ?", SELECT_ADDRESS);
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get address")?;
    Ok(row.as_ref().map(row_to_address_mysql))
}

async fn create_address_mysql(
    pool: &MySqlPool,
    user_id: i64,
    input: &CreateAddressInput,
) -> Result<Address> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    if input.is_default {
        sqlx::query(CLEAR_DEFAULTS)
            .bind(false)
            .bind(now)
            .bind(user_id)
            .bind(0i64)
            .bind(true)
            .execute(&mut *tx)
            .await
            .context("Failed to clear default addresses")?;
    }

    let result = sqlx::query(INSERT_ADDRESS)
        .bind(user_id)
        .bind(&input.label)
        .bind(&input.line1)
        .bind(&input.line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.pincode)
        .bind(input.is_default)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create address")?;

    tx.commit().await.context("Failed to commit address")?;

    Ok(new_address(result.last_insert_id() as i64, user_id, input, now))
}

async fn update_address_mysql(
    pool: &MySqlPool,
    id: i64,
    user_id: i64,
    input: &UpdateAddressInput,
) -> Result<Option<Address>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let sql = format!("{} WHERE id = ? AND user_id = ? FOR UPDATE", SELECT_ADDRESS);
    let Some(row) = sqlx::query(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to get address")?
    else {
        return Ok(None);
    };
    let mut address = row_to_address_mysql(&row);
    input.apply_to(&mut address);
    address.updated_at = now;

    if address.is_default {
        sqlx::query(CLEAR_DEFAULTS)
            .bind(false)
            .bind(now)
            .bind(user_id)
            .bind(id)
            .bind(true)
            .execute(&mut *tx)
            .await
            .context("Failed to clear default addresses")?;
    }

    sqlx::query(UPDATE_ADDRESS)
        .bind(&address.label)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.pincode)
        .bind(address.is_default)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update address")?;

    tx.commit().await.context("Failed to commit address")?;

    Ok(Some(address))
}

fn row_to_address_mysql(row: &sqlx::mysql::MySqlRow) -> Address {
    Address {
        id: row.get("id"),
        user_id: row.get("user_id"),
        label: row.get("label"),
        line1: row.get("line1"),
        line2: row.get("line2"),
        city: row.get("city"),
        state: row.get("state"),
        pincode: row.get("pincode"),
        is_default: row.get("is_default"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn new_address(
    id: i64,
    user_id: i64,
    input: &CreateAddressInput,
    now: chrono::DateTime<Utc>,
) -> Address {
    Address {
        id,
        user_id,
        label: input.label.clone(),
        line1: input.line1.clone(),
        line2: input.line2.clone(),
        city: input.city.clone(),
        state: input.state.clone(),
        pincode: input.pincode.clone(),
        is_default: input.is_default,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::config::DatabaseConfig;
    use crate::db::{create_pool, create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxAddressRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        setup_with(pool).await
    }

    async fn setup_with(pool: DynDatabasePool) -> (SqlxAddressRepository, i64, i64) {
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for email in ["a@example.com", "b@example.com"] {
            let user = User {
                id: 0,
                name: "Test".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                role: UserRole::Buyer,
                phone: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            ids.push(users.create(&user).await.unwrap().id);
        }
        (SqlxAddressRepository::new(pool), ids[0], ids[1])
    }

    fn input(label: &str, is_default: bool) -> CreateAddressInput {
        CreateAddressInput {
            label: label.to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            pincode: "411001".to_string(),
            is_default,
        }
    }

    #[tokio::test]
    async fn test_create_default_clears_other_defaults() {
        let (repo, user_id, other_id) = setup().await;

        let first = repo.create(user_id, &input("Home", true)).await.unwrap();
        let foreign = repo.create(other_id, &input("Other", true)).await.unwrap();
        let second = repo.create(user_id, &input("Site", true)).await.unwrap();

        let first = repo.get_for_user(first.id, user_id).await.unwrap().unwrap();
        let second = repo.get_for_user(second.id, user_id).await.unwrap().unwrap();
        let foreign = repo.get_for_user(foreign.id, other_id).await.unwrap().unwrap();
        assert!(!first.is_default);
        assert!(second.is_default);
        assert!(foreign.is_default);
    }

    #[tokio::test]
    async fn test_get_for_user_is_owner_scoped() {
        let (repo, user_id, other_id) = setup().await;
        let address = repo.create(user_id, &input("Home", false)).await.unwrap();

        assert!(repo.get_for_user(address.id, other_id).await.unwrap().is_none());
        assert!(!repo.delete(address.id, other_id).await.unwrap());
        assert!(repo.delete(address.id, user_id).await.unwrap());
        assert!(repo.list_by_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_to_default_clears_others() {
        let (repo, user_id, _) = setup().await;
        let home = repo.create(user_id, &input("Home", true)).await.unwrap();
        let site = repo.create(user_id, &input("Site", false)).await.unwrap();

        let change = UpdateAddressInput {
            is_default: Some(true),
            ..Default::default()
        };
        let updated = repo.update(site.id, user_id, &change).await.unwrap().unwrap();
        assert!(updated.is_default);
        assert_eq!(updated.label, "Site");

        let listed = repo.list_by_user(user_id).await.unwrap();
        let defaults: Vec<i64> = listed.iter().filter(|a| a.is_default).map(|a| a.id).collect();
        assert_eq!(defaults, vec![site.id]);
        assert_ne!(home.id, site.id);
    }

    #[tokio::test]
    async fn test_update_is_owner_scoped() {
        let (repo, user_id, other_id) = setup().await;
        let address = repo.create(user_id, &input("Home", false)).await.unwrap();

        let change = UpdateAddressInput {
            label: Some("Stolen".to_string()),
            ..Default::default()
        };
        assert!(repo.update(address.id, other_id, &change).await.unwrap().is_none());
        assert!(repo.update(9999, user_id, &change).await.unwrap().is_none());

        let stored = repo.get_for_user(address.id, user_id).await.unwrap().unwrap();
        assert_eq!(stored.label, "Home");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_partial_updates_keep_every_field() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: temp_dir.path().join("addresses.db").to_string_lossy().to_string(),
        };
        let pool = create_pool(&config).await.expect("Failed to create pool");
        let (repo, user_id, _) = setup_with(pool).await;
        let repo = Arc::new(repo);
        let address = repo.create(user_id, &input("Home", false)).await.unwrap();

        let changes = [
            UpdateAddressInput {
                city: Some("Mumbai".to_string()),
                ..Default::default()
            },
            UpdateAddressInput {
                label: Some("Office".to_string()),
                ..Default::default()
            },
            UpdateAddressInput {
                pincode: Some("400001".to_string()),
                ..Default::default()
            },
            UpdateAddressInput {
                line2: Some("Floor 3".to_string()),
                ..Default::default()
            },
        ];
        let handles: Vec<_> = changes
            .into_iter()
            .map(|change| {
                let repo = repo.clone();
                let id = address.id;
                tokio::spawn(async move { repo.update(id, user_id, &change).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap().unwrap();
        }

        let stored = repo.get_for_user(address.id, user_id).await.unwrap().unwrap();
        assert_eq!(stored.city, "Mumbai");
        assert_eq!(stored.label, "Office");
        assert_eq!(stored.pincode, "400001");
        assert_eq!(stored.line2.as_deref(), Some("Floor 3"));
        assert_eq!(stored.line1, "12 MG Road");
    }
}
