//! Support ticket repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    CreateTicketInput, SenderType, SupportMessage, SupportTicket, TicketStatus, UserSummary,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Support repository trait
#[async_trait]
pub trait SupportRepository: Send + Sync {
    /// Tickets newest first with their message counts, limited to one user when set
    async fn list(&self, user_id: Option<i64>) -> Result<Vec<SupportTicket>>;

    /// Ticket with its messages in posting order
    async fn get_by_id(&self, id: i64) -> Result<Option<SupportTicket>>;

    /// Open a ticket. The description is stored as the first user message.
    async fn create(&self, user_id: i64, input: &CreateTicketInput) -> Result<i64>;

    async fn add_message(&self, ticket_id: i64, sender: SenderType, message: &str) -> Result<()>;

    /// Returns false if the ticket does not exist
    async fn update_status(&self, id: i64, status: TicketStatus) -> Result<bool>;
}

/// SQLx-based support repository implementation
pub struct SqlxSupportRepository {
    pool: DynDatabasePool,
}

impl SqlxSupportRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SupportRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_TICKET: &str = r#"
    SELECT t.id, t.user_id, t.subject, t.description, t.status, t.created_at, t.updated_at,
           u.name AS user_name, u.email AS user_email,
           (SELECT COUNT(*) FROM support_messages m WHERE m.ticket_id = t.id) AS message_count
    FROM support_tickets t
    INNER JOIN users u ON u.id = t.user_id
"#;

const SELECT_MESSAGES: &str = r#"
    SELECT id, ticket_id, sender_type, message, created_at
    FROM support_messages
    WHERE ticket_id = ?
    ORDER BY created_at ASC, id ASC
"#;

const INSERT_TICKET: &str = r#"
    INSERT INTO support_tickets (user_id, subject, description, status, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const INSERT_MESSAGE: &str = r#"
    INSERT INTO support_messages (ticket_id, sender_type, message, created_at)
    VALUES (?, ?, ?, ?)
"#;

const TOUCH_TICKET: &str = "UPDATE support_tickets SET updated_at = ? WHERE id = ?";

#[async_trait]
impl SupportRepository for SqlxSupportRepository {
    async fn list(&self, user_id: Option<i64>) -> Result<Vec<SupportTicket>> {
        let filter = if user_id.is_some() { " WHERE t.user_id = ?" } else { "" };
        let sql = format!(
            "{}{} ORDER BY t.created_at DESC, t.id DESC",
            SELECT_TICKET, filter
        );

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                if let Some(user_id) = user_id {
                    query = query.bind(user_id);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list tickets")?;
                rows.iter().map(row_to_ticket_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if let Some(user_id) = user_id {
                    query = query.bind(user_id);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list tickets")?;
                rows.iter().map(row_to_ticket_mysql).collect()
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SupportTicket>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_ticket_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_ticket_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn create(&self, user_id: i64, input: &CreateTicketInput) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_ticket_sqlite(self.pool.sqlite()?, user_id, input).await,
            DatabaseDriver::Mysql => create_ticket_mysql(self.pool.mysql()?, user_id, input).await,
        }
    }

    async fn add_message(&self, ticket_id: i64, sender: SenderType, message: &str) -> Result<()> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await.context("Failed to begin transaction")?;
                sqlx::query(INSERT_MESSAGE)
                    .bind(ticket_id)
                    .bind(sender.as_str())
                    .bind(message)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to add message")?;
                sqlx::query(TOUCH_TICKET)
                    .bind(now)
                    .bind(ticket_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to touch ticket")?;
                tx.commit().await.context("Failed to commit message")?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await.context("Failed to begin transaction")?;
                sqlx::query(INSERT_MESSAGE)
                    .bind(ticket_id)
                    .bind(sender.as_str())
                    .bind(message)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to add message")?;
                sqlx::query(TOUCH_TICKET)
                    .bind(now)
                    .bind(ticket_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to touch ticket")?;
                tx.commit().await.context("Failed to commit message")?;
            }
        }
        Ok(())
    }

    async fn update_status(&self, id: i64, status: TicketStatus) -> Result<bool> {
        let sql = "UPDATE support_tickets SET status = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update ticket status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update ticket status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_ticket_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<SupportTicket>> {
    let sql = format!("{} WHERE t.id = ?", SELECT_TICKET);
    let Some(row) = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get ticket")?
    else {
        return Ok(None);
    };

    let messages = sqlx::query(SELECT_MESSAGES)
        .bind(id)
        .fetch_all(pool)
        .await
        .context("Failed to load ticket messages")?
        .iter()
        .map(row_to_message_sqlite)
        .collect::<Result<Vec<_>>>()?;

    let mut ticket = row_to_ticket_sqlite(&row)?;
    ticket.message_count = None;
    ticket.messages = Some(messages);
    Ok(Some(ticket))
}

async fn create_ticket_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    input: &CreateTicketInput,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let ticket_id = sqlx::query(INSERT_TICKET)
        .bind(user_id)
        .bind(&input.subject)
        .bind(&input.description)
        .bind(TicketStatus::Open.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create ticket")?
        .last_insert_rowid();

    sqlx::query(INSERT_MESSAGE)
        .bind(ticket_id)
        .bind(SenderType::User.as_str())
        .bind(&input.description)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create first ticket message")?;

    tx.commit().await.context("Failed to commit ticket")?;
    Ok(ticket_id)
}

fn row_to_ticket_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<SupportTicket> {
    let status_str: String = row.get("status");
    let status = TicketStatus::from_str(&status_str)
        .with_context(|| format!("Invalid ticket status in database: {}", status_str))?;
    let user_id: i64 = row.get("user_id");

    Ok(SupportTicket {
        id: row.get("id"),
        user_id,
        subject: row.get("subject"),
        description: row.get("description"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        user: UserSummary {
            id: user_id,
            name: row.get("user_name"),
            email: Some(row.get("user_email")),
        },
        message_count: Some(row.get("message_count")),
        messages: None,
    })
}

fn row_to_message_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<SupportMessage> {
    let sender: String = row.get("sender_type");
    Ok(SupportMessage {
        id: row.get("id"),
        ticket_id: row.get("ticket_id"),
        sender_type: SenderType::from_str(&sender)?,
        message: row.get("message"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_ticket_mysql(pool: &MySqlPool, id: i64) -> Result<Option<SupportTicket>> {
    let sql = format!("{} WHERE t.id = ?", SELECT_TICKET);
    let Some(row) = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get ticket")?
    else {
        return Ok(None);
    };

    let messages = sqlx::query(SELECT_MESSAGES)
        .bind(id)
        .fetch_all(pool)
        .await
        .context("Failed to load ticket messages")?
        .iter()
        .map(row_to_message_mysql)
        .collect::<Result<Vec<_>>>()?;

    let mut ticket = row_to_ticket_mysql(&row)?;
    ticket.message_count = None;
    ticket.messages = Some(messages);
    Ok(Some(ticket))
}

async fn create_ticket_mysql(
    pool: &MySqlPool,
    user_id: i64,
    input: &CreateTicketInput,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let ticket_id = sqlx::query(INSERT_TICKET)
        .bind(user_id)
        .bind(&input.subject)
        .bind(&input.description)
        .bind(TicketStatus::Open.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create ticket")?
        .last_insert_id() as i64;

    sqlx::query(INSERT_MESSAGE)
        .bind(ticket_id)
        .bind(SenderType::User.as_str())
        .bind(&input.description)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create first ticket message")?;

    tx.commit().await.context("Failed to commit ticket")?;
    Ok(ticket_id)
}

fn row_to_ticket_mysql(row: &sqlx::mysql::MySqlRow) -> Result<SupportTicket> {
    let status_str: String = row.get("status");
    let status = TicketStatus::from_str(&status_str)
        .with_context(|| format!("Invalid ticket status in database: {}", status_str))?;
    let user_id: i64 = row.get("user_id");

    Ok(SupportTicket {
        id: row.get("id"),
        user_id,
        subject: row.get("subject"),
        description: row.get("description"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        user: UserSummary {
            id: user_id,
            name: row.get("user_name"),
            email: Some(row.get("user_email")),
        },
        message_count: Some(row.get("message_count")),
        messages: None,
    })
}

fn row_to_message_mysql(row: &sqlx::mysql::MySqlRow) -> Result<SupportMessage> {
    let sender: String = row.get("sender_type");
    Ok(SupportMessage {
        id: row.get("id"),
        ticket_id: row.get("ticket_id"),
        sender_type: SenderType::from_str(&sender)?,
        message: row.get("message"),
        created_at: row.get("created_at"),
    })
}
