//! Address API endpoints (all require authentication)
//!
//! - GET    /api/addresses
//! - GET    /api/addresses/{id}
//! - POST   /api/addresses
//! - PUT    /api/addresses/{id}
//! - DELETE /api/addresses/{id}

use axum::{
    extract::State,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{require_auth, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{AddressBody, AddressesBody, ApiResponse, MessageBody};
use crate::api::validation::{FieldError, ValidJson, ValidPath, Validate, Validator};
use crate::models::{CreateAddressInput, UpdateAddressInput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddressRequest {
    pub label: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Validate for CreateAddressRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.length("label", &self.label, 1, 50);
        v.length("line1", &self.line1, 1, 200);
        v.optional_length("line2", self.line2.as_deref(), 0, 200);
        v.length("city", &self.city, 1, 100);
        v.length("state", &self.state, 1, 100);
        v.pincode("pincode", &self.pincode);
        v.finish()
    }
}

impl From<CreateAddressRequest> for CreateAddressInput {
    fn from(body: CreateAddressRequest) -> Self {
        Self {
            label: body.label,
            line1: body.line1,
            line2: body.line2,
            city: body.city,
            state: body.state,
            pincode: body.pincode,
            is_default: body.is_default,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAddressRequest {
    pub label: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub is_default: Option<bool>,
}

impl Validate for UpdateAddressRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.optional_length("label", self.label.as_deref(), 1, 50);
        v.optional_length("line1", self.line1.as_deref(), 1, 200);
        v.optional_length("line2", self.line2.as_deref(), 0, 200);
        v.optional_length("city", self.city.as_deref(), 1, 100);
        v.optional_length("state", self.state.as_deref(), 1, 100);
        if let Some(pincode) = &self.pincode {
            v.pincode("pincode", pincode);
        }
        v.finish()
    }
}

impl From<UpdateAddressRequest> for UpdateAddressInput {
    fn from(body: UpdateAddressRequest) -> Self {
        Self {
            label: body.label,
            line1: body.line1,
            line2: body.line2,
            city: body.city,
            state: body.state,
            pincode: body.pincode,
            is_default: body.is_default,
        }
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route(
            "/{id}",
            get(get_address).put(update_address).delete(delete_address),
        )
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth))
}

async fn list_addresses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<AddressesBody>>, ApiError> {
    let addresses = state.address_service.list(auth.0.user_id).await?;
    Ok(ApiResponse::ok(AddressesBody { addresses }))
}

async fn get_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<ApiResponse<AddressBody>>, ApiError> {
    let address = state.address_service.get(id, auth.0.user_id).await?;
    Ok(ApiResponse::ok(AddressBody { address }))
}

async fn create_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidJson(body): ValidJson<CreateAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let address = state
        .address_service
        .create(auth.0.user_id, body.into())
        .await?;
    Ok(ApiResponse::created(AddressBody { address }))
}

async fn update_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<UpdateAddressRequest>,
) -> Result<Json<ApiResponse<AddressBody>>, ApiError> {
    let address = state
        .address_service
        .update(id, auth.0.user_id, body.into())
        .await?;
    Ok(ApiResponse::ok(AddressBody { address }))
}

async fn delete_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<ApiResponse<MessageBody>>, ApiError> {
    state.address_service.delete(id, auth.0.user_id).await?;
    Ok(ApiResponse::ok(MessageBody::new("Address deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_address_validation() {
        let body: CreateAddressRequest = serde_json::from_value(serde_json::json!({
            "label": "Warehouse",
            "line1": "Gat No. 7",
            "city": "Satara",
            "state": "Maharashtra",
            "pincode": "41500"
        }))
        .unwrap();
        assert!(!body.is_default);

        let errors = body.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Pincode must be 6 digits");
    }
}
