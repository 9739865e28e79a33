//! Order API endpoints (all require authentication)
//!
//! - GET  /api/orders
//! - GET  /api/orders/{id}
//! - POST /api/orders
//! - PUT  /api/orders/{id}/status   (seller or admin)

use axum::{
    extract::State,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{require_auth, require_seller, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, OrderBody, OrdersBody};
use crate::api::validation::{FieldError, ValidJson, ValidPath, Validate, Validator};
use crate::models::{CreateOrderInput, OrderLine, OrderStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub address_id: i64,
}

impl Validate for CreateOrderRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.check(
            !self.items.is_empty(),
            "items",
            "Order must contain at least one item",
        );
        for (index, item) in self.items.iter().enumerate() {
            v.check(
                item.quantity >= 1,
                &format!("items.{}.quantity", index),
                "Quantity must be at least 1",
            );
        }
        v.finish()
    }
}

impl From<CreateOrderRequest> for CreateOrderInput {
    fn from(body: CreateOrderRequest) -> Self {
        Self {
            items: body
                .items
                .into_iter()
                .map(|item| OrderLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            address_id: body.address_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

impl Validate for UpdateOrderStatusRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Ok(())
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    let sellers = Router::new()
        .route("/{id}/status", put(update_status))
        .route_layer(axum_middleware::from_fn(require_seller));

    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order))
        .merge(sellers)
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<OrdersBody>>, ApiError> {
    let orders = state.order_service.list(&auth.actor()).await?;
    Ok(ApiResponse::ok(OrdersBody { orders }))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<ApiResponse<OrderBody>>, ApiError> {
    let order = state.order_service.get(id, &auth.actor()).await?;
    Ok(ApiResponse::ok(OrderBody { order }))
}

async fn create_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidJson(body): ValidJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .order_service
        .place(&auth.actor(), body.into())
        .await?;
    Ok(ApiResponse::created(OrderBody { order }))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderBody>>, ApiError> {
    let order = state
        .order_service
        .update_status(id, &auth.actor(), body.status)
        .await?;
    Ok(ApiResponse::ok(OrderBody { order }))
}
