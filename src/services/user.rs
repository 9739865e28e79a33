//! User service
//!
//! Registration, login and profile management. Login failures are counted
//! per email by the `LoginRateLimiter`; successful logins reset the count.

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, UpdateProfileInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::token::TokenService;
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("User with this email already exists")]
    UserExists,

    /// Unknown email and wrong password share this variant
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Too many failed login attempts, please try again later")]
    RateLimited,

    #[error("User not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A user together with a freshly issued access token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    limiter: Arc<LoginRateLimiter>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        limiter: Arc<LoginRateLimiter>,
    ) -> Self {
        Self {
            user_repo,
            tokens,
            limiter,
        }
    }

    fn session(&self, user: User) -> Result<AuthSession, UserServiceError> {
        let access_token = self
            .tokens
            .issue(&user)
            .context("Failed to issue access token")?;
        Ok(AuthSession { user, access_token })
    }

    async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let email = input.email.trim().to_lowercase();

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email uniqueness")?
            .is_some()
        {
            return Err(UserServiceError::UserExists);
        }

        let now = Utc::now();
        let user = User {
            id: 0,
            name: input.name.trim().to_string(),
            email,
            password_hash: hash_password(&input.password)?,
            role: input.role,
            phone: input.phone,
            created_at: now,
            updated_at: now,
        };

        // A concurrent registration can still win the race to the unique index.
        match self.user_repo.create(&user).await {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(UserServiceError::UserExists),
            Err(e) => Err(e.context("Failed to create user").into()),
        }
    }

    /// Register a buyer or seller account and sign them in
    pub async fn register(&self, input: CreateUserInput) -> Result<AuthSession, UserServiceError> {
        if input.role == UserRole::Admin {
            return Err(UserServiceError::ValidationError(
                "role must be BUYER or SELLER".to_string(),
            ));
        }

        let user = self.create_user(input).await?;
        tracing::info!(user_id = user.id, role = %user.role, "User registered");
        self.session(user)
    }

    /// Check credentials and issue a token
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, UserServiceError> {
        let email = email.trim().to_lowercase();

        if self.limiter.is_limited(&email).await {
            tracing::warn!(email = %email, "Login refused, too many failed attempts");
            return Err(UserServiceError::RateLimited);
        }

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            _ => {
                self.limiter.record_failure(&email).await;
                tracing::warn!(email = %email, "Failed login attempt");
                return Err(UserServiceError::InvalidCredentials);
            }
        };

        self.limiter.clear(&email).await;
        self.session(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn update_profile(
        &self,
        id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        self.user_repo
            .update_profile(id, &input)
            .await
            .context("Failed to update profile")?
            .ok_or(UserServiceError::NotFound)
    }

    /// Create the configured administrator unless that email already exists.
    ///
    /// Returns true when a new account was created.
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<bool, UserServiceError> {
        let input = CreateUserInput {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: UserRole::Admin,
            phone: None,
        };

        match self.create_user(input).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "Administrator account created");
                Ok(true)
            }
            Err(UserServiceError::UserExists) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
