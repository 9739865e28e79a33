//! Authentication API endpoints
//!
//! - POST /api/auth/register
//! - POST /api/auth/login
//! - POST /api/auth/logout
//! - GET  /api/auth/me
//! - PUT  /api/auth/profile

use axum::{
    extract::State,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{require_auth, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, MessageBody, UserBody};
use crate::api::validation::{FieldError, ValidJson, Validate, Validator};
use crate::models::{CreateUserInput, UpdateProfileInput, UserRole};
use crate::services::AuthSession;

/// Shortest accepted password
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.length("name", self.name.trim(), 1, 100);
        v.email("email", self.email.trim());
        v.length("password", &self.password, MIN_PASSWORD_LENGTH, 128);
        v.optional_length("phone", self.phone.as_deref(), 1, 20);
        v.check(
            self.role != UserRole::Admin,
            "role",
            "role must be BUYER or SELLER",
        );
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.email("email", self.email.trim());
        v.length("password", &self.password, 1, 128);
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.optional_length("name", self.name.as_deref().map(str::trim), 1, 100);
        v.optional_length("phone", self.phone.as_deref(), 1, 20);
        v.finish()
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(protected)
}

async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateUserInput {
        name: body.name,
        email: body.email,
        password: body.password,
        role: body.role,
        phone: body.phone,
    };
    let session: AuthSession = state.user_service.register(input).await?;
    Ok(ApiResponse::created(session))
}

async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthSession>>, ApiError> {
    let session = state.user_service.login(&body.email, &body.password).await?;
    Ok(ApiResponse::ok(session))
}

/// Tokens are stateless; the client discards its copy
async fn logout() -> Json<ApiResponse<MessageBody>> {
    ApiResponse::ok(MessageBody::new("Logged out successfully"))
}

async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<UserBody>>, ApiError> {
    let user = state.user_service.get_by_id(auth.0.user_id).await?;
    Ok(ApiResponse::ok(UserBody { user }))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidJson(body): ValidJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserBody>>, ApiError> {
    let input = UpdateProfileInput {
        name: body.name.map(|name| name.trim().to_string()),
        phone: body.phone,
    };
    let user = state.user_service.update_profile(auth.0.user_id, input).await?;
    Ok(ApiResponse::ok(UserBody { user }))
}
