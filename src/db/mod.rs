//! Database layer
//!
//! SQLite (default, single-file deployment) and MySQL are both supported
//! behind the `DatabasePool` trait. Repositories pick the dialect from the
//! pool's driver.
//!
//! ```ignore
//! use brickyard::config::DatabaseConfig;
//! use brickyard::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Whether an error chain contains a unique-constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
        )
    })
}

/// Whether an error chain contains a foreign-key violation
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation()
        )
    })
}

/// Escape character used by `like_pattern`
pub(crate) const LIKE_ESCAPE: char = '!';

/// Build a `LIKE ... ESCAPE '!'` pattern matching `term` anywhere in a value
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Cement"), "%cement%");
        assert_eq!(like_pattern("50%_off!"), "%50!%!_off!!%");
    }

    #[test]
    fn test_plain_error_is_not_unique_violation() {
        let err = anyhow::anyhow!("boom");
        assert!(!is_unique_violation(&err));
    }
}
