//! Address service
//!
//! Every operation is scoped to the calling user; another user's address is
//! reported as missing. At most one address per user carries the default flag.

use crate::db::is_foreign_key_violation;
use crate::db::repositories::AddressRepository;
use crate::models::{Address, CreateAddressInput, UpdateAddressInput};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AddressServiceError {
    #[error("Address not found")]
    NotFound,

    #[error("Cannot delete default address")]
    CannotDeleteDefault,

    #[error("Address is used by existing orders")]
    InUse,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct AddressService {
    repo: Arc<dyn AddressRepository>,
}

impl AddressService {
    pub fn new(repo: Arc<dyn AddressRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Address>, AddressServiceError> {
        Ok(self
            .repo
            .list_by_user(user_id)
            .await
            .context("Failed to list addresses")?)
    }

    pub async fn get(&self, id: i64, user_id: i64) -> Result<Address, AddressServiceError> {
        self.repo
            .get_for_user(id, user_id)
            .await
            .context("Failed to get address")?
            .ok_or(AddressServiceError::NotFound)
    }

    pub async fn create(
        &self,
        user_id: i64,
        input: CreateAddressInput,
    ) -> Result<Address, AddressServiceError> {
        Ok(self
            .repo
            .create(user_id, &input)
            .await
            .context("Failed to create address")?)
    }

    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        input: UpdateAddressInput,
    ) -> Result<Address, AddressServiceError> {
        if input.is_empty() {
            return self.get(id, user_id).await;
        }

        self.repo
            .update(id, user_id, &input)
            .await
            .context("Failed to update address")?
            .ok_or(AddressServiceError::NotFound)
    }

    pub async fn delete(&self, id: i64, user_id: i64) -> Result<(), AddressServiceError> {
        let address = self.get(id, user_id).await?;
        if address.is_default {
            return Err(AddressServiceError::CannotDeleteDefault);
        }

        match self.repo.delete(id, user_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AddressServiceError::NotFound),
            Err(e) if is_foreign_key_violation(&e) => Err(AddressServiceError::InUse),
            Err(e) => Err(e.context("Failed to delete address").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAddressRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Utc;

    async fn setup_test_service() -> (AddressService, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for email in ["owner@example.com", "other@example.com"] {
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

        (
            AddressService::new(SqlxAddressRepository::boxed(pool)),
            ids[0],
            ids[1],
        )
    }

    fn input(label: &str, is_default: bool) -> CreateAddressInput {
        CreateAddressInput {
            label: label.to_string(),
            line1: "4 Station Road".to_string(),
            line2: Some("Near water tank".to_string()),
            city: "Nashik".to_string(),
            state: "Maharashtra".to_string(),
            pincode: "422001".to_string(),
            is_default,
        }
    }

    #[tokio::test]
    async fn test_other_users_address_is_not_found() {
        let (service, owner, other) = setup_test_service().await;
        let address = service.create(owner, input("Home", false)).await.unwrap();

        assert!(matches!(
            service.get(address.id, other).await,
            Err(AddressServiceError::NotFound)
        ));
        assert!(matches!(
            service.delete(address.id, other).await,
            Err(AddressServiceError::NotFound)
        ));
        assert!(matches!(
            service
                .update(address.id, other, UpdateAddressInput::default())
                .await,
            Err(AddressServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_cannot_delete_default() {
        let (service, owner, _) = setup_test_service().await;
        let home = service.create(owner, input("Home", true)).await.unwrap();
        let site = service.create(owner, input("Site", false)).await.unwrap();

        assert!(matches!(
            service.delete(home.id, owner).await,
            Err(AddressServiceError::CannotDeleteDefault)
        ));
        service.delete(site.id, owner).await.unwrap();
        assert_eq!(service.list(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_moves_default_flag() {
        let (service, owner, _) = setup_test_service().await;
        let home = service.create(owner, input("Home", true)).await.unwrap();
        let site = service.create(owner, input("Site", false)).await.unwrap();

        let updated = service
            .update(
                site.id,
                owner,
                UpdateAddressInput {
                    is_default: Some(true),
                    city: Some("Pune".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_default);
        assert_eq!(updated.city, "Pune");
        assert_eq!(updated.label, "Site");

        let home = service.get(home.id, owner).await.unwrap();
        assert!(!home.is_default);
    }
}
