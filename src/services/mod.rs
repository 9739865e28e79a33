//! Services layer
//!
//! Business rules sit here, between the HTTP handlers and the repositories.
//! Each service reports failures through its own error enum.

pub mod address;
pub mod order;
pub mod password;
pub mod product;
pub mod rate_limiter;
pub mod support;
pub mod token;
pub mod user;

pub use address::{AddressService, AddressServiceError};
pub use order::{OrderService, OrderServiceError};
pub use password::{hash_password, verify_password};
pub use product::{ProductService, ProductServiceError};
pub use rate_limiter::LoginRateLimiter;
pub use support::{SupportService, SupportServiceError};
pub use token::{Claims, TokenError, TokenService};
pub use user::{AuthSession, UserService, UserServiceError};

use crate::models::UserRole;

/// The authenticated user on whose behalf a service call is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: i64, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&Claims> for Actor {
    fn from(claims: &Claims) -> Self {
        Self::new(claims.user_id, claims.role)
    }
}
