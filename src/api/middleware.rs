//! API middleware
//!
//! Application state, the error envelope, bearer-token authentication and
//! role gates.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

use crate::api::validation::FieldError;
use crate::cache::Cache;
use crate::config::AuthConfig;
use crate::db::repositories::{
    SqlxAddressRepository, SqlxCategoryRepository, SqlxOrderRepository, SqlxProductRepository,
    SqlxSupportRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::rate_limiter::WINDOW_MINUTES;
use crate::services::{
    Actor, AddressService, AddressServiceError, Claims, LoginRateLimiter, OrderService,
    OrderServiceError, ProductService, ProductServiceError, SupportService, SupportServiceError,
    TokenService, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub cache: Arc<Cache>,
    pub tokens: Arc<TokenService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub user_service: Arc<UserService>,
    pub product_service: Arc<ProductService>,
    pub address_service: Arc<AddressService>,
    pub order_service: Arc<OrderService>,
    pub support_service: Arc<SupportService>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, cache: Arc<Cache>, auth: &AuthConfig) -> Self {
        let tokens = Arc::new(TokenService::new(&auth.jwt_secret, auth.token_ttl_seconds));
        let rate_limiter = Arc::new(LoginRateLimiter::new());

        let user_service = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            tokens.clone(),
            rate_limiter.clone(),
        ));
        let product_service = Arc::new(ProductService::new(
            SqlxProductRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let address_service = Arc::new(AddressService::new(SqlxAddressRepository::boxed(
            pool.clone(),
        )));
        let order_service = Arc::new(OrderService::new(SqlxOrderRepository::boxed(pool.clone())));
        let support_service = Arc::new(SupportService::new(SqlxSupportRepository::boxed(
            pool.clone(),
        )));

        Self {
            pool,
            cache,
            tokens,
            rate_limiter,
            user_service,
            product_service,
            address_service,
            order_service,
            support_service,
        }
    }
}

/// Authenticated user extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        Actor::from(&self.0)
    }
}

/// Error envelope: `{success: false, error: {message, code, details?}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ApiErrorDetail {
                message: message.into(),
                code: code.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        let mut error = Self::new(code, message);
        error.error.details = Some(details);
        error
    }

    fn with_fields(code: &str, message: &str, fields: Vec<FieldError>) -> Self {
        let details = serde_json::to_value(fields).unwrap_or(serde_json::Value::Null);
        Self::with_details(code, message, details)
    }

    /// Request body failed to parse or validate
    pub fn validation(fields: Vec<FieldError>) -> Self {
        Self::with_fields("VALIDATION_ERROR", "Validation failed", fields)
    }

    pub fn query_validation(fields: Vec<FieldError>) -> Self {
        Self::with_fields("QUERY_VALIDATION_ERROR", "Query validation failed", fields)
    }

    pub fn params_validation(fields: Vec<FieldError>) -> Self {
        Self::with_fields("PARAMS_VALIDATION_ERROR", "Parameter validation failed", fields)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    /// Log an unexpected failure and hide its detail from the client
    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "Unhandled error");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR"
            | "QUERY_VALIDATION_ERROR"
            | "PARAMS_VALIDATION_ERROR"
            | "USER_EXISTS"
            | "SLUG_EXISTS"
            | "INVALID_OPERATION"
            | "INSUFFICIENT_STOCK" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" | "INVALID_CREDENTIALS" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            code if code == "NOT_FOUND" || code.ends_with("_NOT_FOUND") => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        let message = err.to_string();
        match err {
            UserServiceError::UserExists => ApiError::new("USER_EXISTS", message),
            UserServiceError::InvalidCredentials => ApiError::new("INVALID_CREDENTIALS", message),
            UserServiceError::RateLimited => ApiError::with_details(
                "RATE_LIMITED",
                message,
                serde_json::json!({ "retryAfterSeconds": WINDOW_MINUTES * 60 }),
            ),
            UserServiceError::NotFound => ApiError::new("USER_NOT_FOUND", message),
            UserServiceError::ValidationError(msg) => ApiError::new("VALIDATION_ERROR", msg),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ProductServiceError> for ApiError {
    fn from(err: ProductServiceError) -> Self {
        let message = err.to_string();
        match err {
            ProductServiceError::NotFound => ApiError::new("PRODUCT_NOT_FOUND", message),
            ProductServiceError::SlugExists => ApiError::new("SLUG_EXISTS", message),
            ProductServiceError::CategoryNotFound => ApiError::new("CATEGORY_NOT_FOUND", message),
            ProductServiceError::Forbidden => ApiError::forbidden(message),
            ProductServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<AddressServiceError> for ApiError {
    fn from(err: AddressServiceError) -> Self {
        let message = err.to_string();
        match err {
            AddressServiceError::NotFound => ApiError::new("ADDRESS_NOT_FOUND", message),
            AddressServiceError::CannotDeleteDefault | AddressServiceError::InUse => {
                ApiError::new("INVALID_OPERATION", message)
            }
            AddressServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(err: OrderServiceError) -> Self {
        let message = err.to_string();
        match err {
            OrderServiceError::NotFound => ApiError::new("ORDER_NOT_FOUND", message),
            OrderServiceError::Forbidden | OrderServiceError::NotSellerOfOrder => {
                ApiError::forbidden(message)
            }
            OrderServiceError::AddressNotFound => ApiError::new("ADDRESS_NOT_FOUND", message),
            OrderServiceError::ProductsUnavailable | OrderServiceError::AmountTooLarge => {
                ApiError::new("INVALID_OPERATION", message)
            }
            OrderServiceError::InsufficientStock(_) => ApiError::new("INSUFFICIENT_STOCK", message),
            OrderServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<SupportServiceError> for ApiError {
    fn from(err: SupportServiceError) -> Self {
        let message = err.to_string();
        match err {
            SupportServiceError::NotFound => ApiError::new("TICKET_NOT_FOUND", message),
            SupportServiceError::Forbidden => ApiError::forbidden(message),
            SupportServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Response for a handler that panicked
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Request handler panicked");
    ApiError::new("INTERNAL_ERROR", "Internal server error").into_response()
}

/// Fallback for unknown routes
pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token =
        bearer_token(&request).ok_or_else(|| ApiError::unauthorized("Access token required"))?;

    let claims = state
        .tokens
        .verify(token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    request.extensions_mut().insert(AuthenticatedUser(claims));
    Ok(next.run(request).await)
}

fn authenticated(request: &Request) -> Result<&AuthenticatedUser, ApiError> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// Seller or admin authorization middleware
pub async fn require_seller(request: Request, next: Next) -> Result<Response, ApiError> {
    if !authenticated(&request)?.0.role.can_sell() {
        return Err(ApiError::forbidden("Access denied. Insufficient permissions"));
    }
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    if !authenticated(&request)?.actor().is_admin() {
        return Err(ApiError::forbidden("Access denied. ADMIN role required"));
    }
    Ok(next.run(request).await)
}
