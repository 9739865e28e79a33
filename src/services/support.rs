//! Support ticket service
//!
//! Tickets are visible to their author and to admins. Messages posted by an
//! admin are tagged as ADMIN, everyone else's as USER.

use crate::db::repositories::SupportRepository;
use crate::models::{CreateTicketInput, SenderType, SupportTicket, TicketStatus};
use crate::services::Actor;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SupportServiceError {
    #[error("Ticket not found")]
    NotFound,

    #[error("Access denied")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct SupportService {
    repo: Arc<dyn SupportRepository>,
}

impl SupportService {
    pub fn new(repo: Arc<dyn SupportRepository>) -> Self {
        Self { repo }
    }

    /// Tickets newest first, each with its message count
    pub async fn list(&self, actor: &Actor) -> Result<Vec<SupportTicket>, SupportServiceError> {
        let owner = (!actor.is_admin()).then_some(actor.id);
        Ok(self.repo.list(owner).await.context("Failed to list tickets")?)
    }

    /// A ticket with its messages, oldest first
    pub async fn get(&self, id: i64, actor: &Actor) -> Result<SupportTicket, SupportServiceError> {
        let ticket = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get ticket")?
            .ok_or(SupportServiceError::NotFound)?;

        if ticket.user_id != actor.id && !actor.is_admin() {
            return Err(SupportServiceError::Forbidden);
        }
        Ok(ticket)
    }

    /// Open a ticket; the description becomes its first message
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateTicketInput,
    ) -> Result<SupportTicket, SupportServiceError> {
        let id = self
            .repo
            .create(actor.id, &input)
            .await
            .context("Failed to create ticket")?;
        tracing::info!(ticket_id = id, user_id = actor.id, "Support ticket opened");
        self.get(id, actor).await
    }

    pub async fn add_message(
        &self,
        id: i64,
        actor: &Actor,
        message: &str,
    ) -> Result<SupportTicket, SupportServiceError> {
        self.get(id, actor).await?;

        let sender = if actor.is_admin() {
            SenderType::Admin
        } else {
            SenderType::User
        };
        self.repo
            .add_message(id, sender, message)
            .await
            .context("Failed to add message")?;

        self.get(id, actor).await
    }

    /// Admin-only status change
    pub async fn update_status(
        &self,
        id: i64,
        actor: &Actor,
        status: TicketStatus,
    ) -> Result<SupportTicket, SupportServiceError> {
        if !actor.is_admin() {
            return Err(SupportServiceError::Forbidden);
        }
        if !self
            .repo
            .update_status(id, status)
            .await
            .context("Failed to update ticket status")?
        {
            return Err(SupportServiceError::NotFound);
        }
        self.get(id, actor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSupportRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Utc;

    async fn setup_test_service() -> (SupportService, Actor, Actor, Actor) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut actors = Vec::new();
        for (email, role) in [
            ("owner@example.com", UserRole::Buyer),
            ("other@example.com", UserRole::Seller),
            ("admin@example.com", UserRole::Admin),
        ] {
            let user = users
                .create(&User {
                    id: 0,
                    name: email.to_string(),
                    email: email.to_string(),
                    password_hash: "hash".to_string(),
                    role,
                    phone: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
            actors.push(Actor::new(user.id, user.role));
        }

        (
            SupportService::new(SqlxSupportRepository::boxed(pool)),
            actors[0],
            actors[1],
            actors[2],
        )
    }

    fn ticket() -> CreateTicketInput {
        CreateTicketInput {
            subject: "Damaged bags".to_string(),
            description: "Three cement bags arrived torn".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_conversation() {
        let (service, owner, _, _) = setup_test_service().await;

        let created = service.create(&owner, ticket()).await.unwrap();
        assert_eq!(created.status, TicketStatus::Open);

        let messages = created.messages.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_type, SenderType::User);
        assert_eq!(messages[0].message, "Three cement bags arrived torn");
    }

    #[tokio::test]
    async fn test_access_is_owner_or_admin() {
        let (service, owner, other, admin) = setup_test_service().await;
        let created = service.create(&owner, ticket()).await.unwrap();

        assert!(matches!(
            service.get(created.id, &other).await,
            Err(SupportServiceError::Forbidden)
        ));
        assert!(matches!(
            service.add_message(created.id, &other, "hello").await,
            Err(SupportServiceError::Forbidden)
        ));
        assert!(service.get(created.id, &admin).await.is_ok());
        assert!(matches!(
            service.get(9999, &owner).await,
            Err(SupportServiceError::NotFound)
        ));

        assert!(service.list(&other).await.unwrap().is_empty());
        assert_eq!(service.list(&admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sender_type_follows_role() {
        let (service, owner, _, admin) = setup_test_service().await;
        let created = service.create(&owner, ticket()).await.unwrap();

        service
            .add_message(created.id, &admin, "Replacement dispatched")
            .await
            .unwrap();
        let updated = service
            .add_message(created.id, &owner, "Thanks")
            .await
            .unwrap();

        let senders: Vec<SenderType> = updated
            .messages
            .unwrap()
            .iter()
            .map(|m| m.sender_type)
            .collect();
        assert_eq!(
            senders,
            vec![SenderType::User, SenderType::Admin, SenderType::User]
        );

        let listed = service.list(&owner).await.unwrap();
        assert_eq!(listed[0].message_count, Some(3));
    }

    #[tokio::test]
    async fn test_update_status_admin_only() {
        let (service, owner, _, admin) = setup_test_service().await;
        let created = service.create(&owner, ticket()).await.unwrap();

        assert!(matches!(
            service
                .update_status(created.id, &owner, TicketStatus::Closed)
                .await,
            Err(SupportServiceError::Forbidden)
        ));
        let resolved = service
            .update_status(created.id, &admin, TicketStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(resolved.status, TicketStatus::Resolved);
        assert!(matches!(
            service
                .update_status(9999, &admin, TicketStatus::Closed)
                .await,
            Err(SupportServiceError::NotFound)
        ));
    }
}
