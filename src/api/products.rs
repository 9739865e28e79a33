//! Product and category API endpoints
//!
//! - GET    /api/products
//! - GET    /api/products/categories
//! - GET    /api/products/categories/{slug}
//! - GET    /api/products/{id}
//! - POST   /api/products        (seller or admin)
//! - PUT    /api/products/{id}   (owner or admin)
//! - DELETE /api/products/{id}   (owner or admin)

use axum::{
    extract::State,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::api::common::{PaginationQuery, ProductQuery};
use crate::api::middleware::{require_auth, require_seller, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, CategoryBody, Paginated, ProductBody};
use crate::api::validation::{FieldError, ValidJson, ValidPath, ValidQuery, Validate, Validator};
use crate::models::money;
use crate::models::{Category, CreateProductInput, Product, ProductFilter, UpdateProductInput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub unit: String,
    pub stock_quantity: i64,
    pub category_id: Option<i64>,
}

fn check_price(v: &mut Validator, price: Option<Decimal>) {
    if let Some(price) = price {
        v.check(price > Decimal::ZERO, "price", "Price must be positive");
        v.check(
            price.normalize().scale() <= money::SCALE,
            "price",
            "Price can have at most 2 decimal places",
        );
        v.check(price <= money::max_amount(), "price", "Price is too large");
    }
}

fn check_stock(v: &mut Validator, stock: Option<i64>) {
    if let Some(stock) = stock {
        v.check(stock >= 0, "stockQuantity", "Stock cannot be negative");
    }
}

impl Validate for CreateProductRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.length("name", &self.name, 1, 200);
        v.length("slug", &self.slug, 1, 200);
        v.length("description", &self.description, 1, usize::MAX);
        check_price(&mut v, Some(self.price));
        v.length("unit", &self.unit, 1, 50);
        check_stock(&mut v, Some(self.stock_quantity));
        v.finish()
    }
}

impl From<CreateProductRequest> for CreateProductInput {
    fn from(body: CreateProductRequest) -> Self {
        Self {
            name: body.name,
            slug: body.slug,
            description: body.description,
            price: body.price,
            unit: body.unit,
            stock_quantity: body.stock_quantity,
            category_id: body.category_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub unit: Option<String>,
    pub stock_quantity: Option<i64>,
    pub category_id: Option<i64>,
}

impl Validate for UpdateProductRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut v = Validator::new();
        v.optional_length("name", self.name.as_deref(), 1, 200);
        v.optional_length("slug", self.slug.as_deref(), 1, 200);
        v.optional_length("description", self.description.as_deref(), 1, usize::MAX);
        check_price(&mut v, self.price);
        v.optional_length("unit", self.unit.as_deref(), 1, 50);
        check_stock(&mut v, self.stock_quantity);
        v.finish()
    }
}

impl From<UpdateProductRequest> for UpdateProductInput {
    fn from(body: UpdateProductRequest) -> Self {
        Self {
            name: body.name,
            slug: body.slug,
            description: body.description,
            price: body.price,
            unit: body.unit,
            stock_quantity: body.stock_quantity,
            category_id: body.category_id,
        }
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    let managed = Router::new()
        .route("/", post(create_product))
        .route("/{id}", put(update_product).delete(delete_product))
        .route_layer(axum_middleware::from_fn(require_seller))
        .route_layer(axum_middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/", get(list_products))
        .route("/categories", get(list_categories))
        .route("/categories/{slug}", get(get_category))
        .route("/{id}", get(get_product))
        .merge(managed)
}

async fn list_products(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ProductQuery>,
) -> Result<Json<ApiResponse<Paginated<Product>>>, ApiError> {
    let filter = ProductFilter {
        search: query.search.clone(),
        category_slug: query.category_slug.clone(),
    };
    let page = state.product_service.list(&filter, &query.params()).await?;
    Ok(ApiResponse::ok(page.into()))
}

async fn get_product(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<ApiResponse<ProductBody>>, ApiError> {
    let product = state.product_service.get(id).await?;
    Ok(ApiResponse::ok(ProductBody { product }))
}

async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidJson(body): ValidJson<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .product_service
        .create(auth.0.user_id, body.into())
        .await?;
    Ok(ApiResponse::created(ProductBody { product }))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(body): ValidJson<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductBody>>, ApiError> {
    let product = state
        .product_service
        .update(id, &auth.actor(), body.into())
        .await?;
    Ok(ApiResponse::ok(ProductBody { product }))
}

async fn delete_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<ApiResponse<ProductBody>>, ApiError> {
    let product = state.product_service.delete(id, &auth.actor()).await?;
    Ok(ApiResponse::ok(ProductBody { product }))
}

async fn list_categories(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<PaginationQuery>,
) -> Result<Json<ApiResponse<Paginated<Category>>>, ApiError> {
    let page = state.product_service.list_categories(&query.params()).await?;
    Ok(ApiResponse::ok(page.into()))
}

async fn get_category(
    State(state): State<AppState>,
    ValidPath(slug): ValidPath<String>,
) -> Result<Json<ApiResponse<CategoryBody>>, ApiError> {
    let category = state.product_service.category_by_slug(&slug).await?;
    Ok(ApiResponse::ok(CategoryBody { category }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_product_validation() {
        let body: CreateProductRequest = serde_json::from_value(serde_json::json!({
            "name": "River Sand",
            "slug": "river-sand",
            "description": "Per tonne",
            "price": 0,
            "unit": "tonne",
            "stockQuantity": -1
        }))
        .unwrap();

        let fields: Vec<String> = body
            .validate()
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(fields, vec!["price", "stockQuantity"]);
    }

    #[test]
    fn test_partial_update_is_valid() {
        let body: UpdateProductRequest =
            serde_json::from_value(serde_json::json!({ "price": 1250.5 })).unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.price, Some(Decimal::new(12505, 1)));
    }

    #[test]
    fn test_price_must_fit_stored_precision() {
        for price in [serde_json::json!(0.001), serde_json::json!(12.345)] {
            let body: UpdateProductRequest =
                serde_json::from_value(serde_json::json!({ "price": price })).unwrap();
            let errors = body.validate().unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, "price");
        }

        let body: UpdateProductRequest =
            serde_json::from_value(serde_json::json!({ "price": 12.50 })).unwrap();
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_price_beyond_storable_range_rejected() {
        let body: UpdateProductRequest =
            serde_json::from_value(serde_json::json!({ "price": 1e17 })).unwrap();
        let errors = body.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Price is too large");
    }
}
