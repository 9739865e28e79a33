//! Support ticket API endpoints (all require authentication)
//!
//! - GET  /api/support
//! - GET  /api/support/{id}
//! - POST /api/support
//! - POST /api/support/{id}/messages
//! - PUT  /api/support/{id}/status   (admin)

use axum::{
    extract::State,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{require_admin, require_auth, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, TicketBody, TicketsBody};
use crate::api::validation::{FieldError, ValidJson, ValidPath, Validate, Validator};
use crate::models::{CreateTicketInput, TicketStatus};

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
}

impl Validate for CreateTicketRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.length("subject", &self.subject, 1, 200);
        v.length("description", &self.description, 1, 1000);
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct AddMessageRequest {
    pub message: String,
}

impl Validate for AddMessageRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.length("message", &self.message, 1, 1000);
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketStatusRequest {
    pub status: TicketStatus,
}

impl Validate for UpdateTicketStatusRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Ok(())
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/{id}/status", put(update_status))
        .route_layer(axum_middleware::from_fn(require_admin));

    Router::new()
        .route("/", get(list_tickets).post(create_ticket))
        .route("/{id}", get(get_ticket))
        .route("/{id}/messages", post(add_message))
        .merge(admin)
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth))
}

async fn list_tickets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<TicketsBody>>, ApiError> {
    let tickets = state.support_service.list(&auth.actor()).await?;
    Ok(ApiResponse::ok(TicketsBody { tickets }))
}

async fn get_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<ApiResponse<TicketBody>>, ApiError> {
    let ticket = state.support_service.get(id, &auth.actor()).await?;
    Ok(ApiResponse::ok(TicketBody { ticket }))
}

async fn create_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidJson(body): ValidJson<CreateTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateTicketInput {
        subject: body.subject,
        description: body.description,
    };
    let ticket = state.support_service.create(&auth.actor(), input).await?;
    Ok(ApiResponse::created(TicketBody { ticket }))
}

async fn add_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<AddMessageRequest>,
) -> Result<Json<ApiResponse<TicketBody>>, ApiError> {
    let ticket = state
        .support_service
        .add_message(id, &auth.actor(), &body.message)
        .await?;
    Ok(ApiResponse::ok(TicketBody { ticket }))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<UpdateTicketStatusRequest>,
) -> Result<Json<ApiResponse<TicketBody>>, ApiError> {
    let ticket = state
        .support_service
        .update_status(id, &auth.actor(), body.status)
        .await?;
    Ok(ApiResponse::ok(TicketBody { ticket }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_length_limit() {
        let body = AddMessageRequest {
            message: "x".repeat(1001),
        };
        assert_eq!(body.validate().unwrap_err()[0].field, "message");

        let body = AddMessageRequest {
            message: "Delivery slot moved to Friday".to_string(),
        };
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_ticket_status_wire_names() {
        let body: UpdateTicketStatusRequest =
            serde_json::from_value(serde_json::json!({ "status": "IN_PROGRESS" })).unwrap();
        assert_eq!(body.status, TicketStatus::InProgress);
    }
}
