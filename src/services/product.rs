//! Product and category service
//!
//! Sellers manage their own listings, admins manage any. Deleting a product
//! only hides it so existing order lines keep their reference. Category
//! reads go through the in-process cache.

use crate::cache::{Cache, CacheLayer};
use crate::db::is_unique_violation;
use crate::db::repositories::{CategoryRepository, ProductRepository};
use crate::models::{
    Category, CreateProductInput, ListParams, PagedResult, Product, ProductFilter,
    UpdateProductInput,
};
use crate::services::Actor;
use anyhow::Context;
use std::sync::Arc;

const CACHE_KEY_CATEGORY_PAGE: &str = "categories:page:";
const CACHE_KEY_CATEGORY_SLUG: &str = "categories:slug:";

#[derive(Debug, thiserror::Error)]
pub enum ProductServiceError {
    #[error("Product not found")]
    NotFound,

    #[error("Product with this slug already exists")]
    SlugExists,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("You can only modify your own products")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProductService {
    products: Arc<dyn ProductRepository>,
    categories: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
}

impl ProductService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        categories: Arc<dyn CategoryRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            products,
            categories,
            cache,
        }
    }

    /// Active products, newest first
    pub async fn list(
        &self,
        filter: &ProductFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Product>, ProductServiceError> {
        let (items, total) = self
            .products
            .list_active(filter, params)
            .await
            .context("Failed to list products")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// An active product; hidden products are reported as missing
    pub async fn get(&self, id: i64) -> Result<Product, ProductServiceError> {
        self.products
            .get_by_id(id)
            .await
            .context("Failed to get product")?
            .filter(|product| product.is_active)
            .ok_or(ProductServiceError::NotFound)
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> Result<(), ProductServiceError> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        self.categories
            .get_by_id(category_id)
            .await
            .context("Failed to get category")?
            .map(|_| ())
            .ok_or(ProductServiceError::CategoryNotFound)
    }

    async fn slug_taken(&self, slug: &str, except: Option<i64>) -> Result<bool, ProductServiceError> {
        let existing = self
            .products
            .get_by_slug(slug)
            .await
            .context("Failed to check slug uniqueness")?;
        Ok(existing.is_some_and(|product| Some(product.id) != except))
    }

    /// List a new product for `seller_id`
    pub async fn create(
        &self,
        seller_id: i64,
        input: CreateProductInput,
    ) -> Result<Product, ProductServiceError> {
        self.ensure_category(input.category_id).await?;
        if self.slug_taken(&input.slug, None).await? {
            return Err(ProductServiceError::SlugExists);
        }

        match self.products.create(seller_id, &input).await {
            Ok(product) => {
                tracing::info!(product_id = product.id, seller_id, "Product created");
                Ok(product)
            }
            Err(e) if is_unique_violation(&e) => Err(ProductServiceError::SlugExists),
            Err(e) => Err(e.context("Failed to create product").into()),
        }
    }

    /// The product `actor` may change: it must be active and theirs, unless they are an admin
    async fn owned(&self, id: i64, actor: &Actor) -> Result<Product, ProductServiceError> {
        let product = self.get(id).await?;
        if !actor.is_admin() && !product.is_owned_by(actor.id) {
            return Err(ProductServiceError::Forbidden);
        }
        Ok(product)
    }

    pub async fn update(
        &self,
        id: i64,
        actor: &Actor,
        input: UpdateProductInput,
    ) -> Result<Product, ProductServiceError> {
        let mut product = self.owned(id, actor).await?;

        if input.category_id.is_some() {
            self.ensure_category(input.category_id).await?;
        }
        if let Some(slug) = &input.slug {
            if self.slug_taken(slug, Some(id)).await? {
                return Err(ProductServiceError::SlugExists);
            }
        }

        input.apply_to(&mut product);
        match self.products.update(&product).await {
            Ok(product) => Ok(product),
            Err(e) if is_unique_violation(&e) => Err(ProductServiceError::SlugExists),
            Err(e) => Err(e.context("Failed to update product").into()),
        }
    }

    /// Hide a product from the catalogue and return it as stored
    pub async fn delete(&self, id: i64, actor: &Actor) -> Result<Product, ProductServiceError> {
        self.owned(id, actor).await?;
        if !self
            .products
            .deactivate(id)
            .await
            .context("Failed to delete product")?
        {
            return Err(ProductServiceError::NotFound);
        }
        tracing::info!(product_id = id, actor_id = actor.id, "Product deactivated");

        self.products
            .get_by_id(id)
            .await
            .context("Failed to get product")?
            .ok_or(ProductServiceError::NotFound)
    }

    /// Categories ordered by name
    pub async fn list_categories(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<Category>, ProductServiceError> {
        let key = format!("{}{}:{}", CACHE_KEY_CATEGORY_PAGE, params.page, params.limit);
        if let Some(page) = self.cache.get::<PagedResult<Category>>(&key).await? {
            return Ok(page);
        }

        let (items, total) = self
            .categories
            .list(params)
            .await
            .context("Failed to list categories")?;
        let page = PagedResult::new(items, total, params);
        self.cache.set(&key, &page).await?;
        Ok(page)
    }

    pub async fn category_by_slug(&self, slug: &str) -> Result<Category, ProductServiceError> {
        let key = format!("{}{}", CACHE_KEY_CATEGORY_SLUG, slug);
        if let Some(category) = self.cache.get::<Category>(&key).await? {
            return Ok(category);
        }

        let category = self
            .categories
            .get_by_slug(slug)
            .await
            .context("Failed to get category")?
            .ok_or(ProductServiceError::CategoryNotFound)?;
        self.cache.set(&key, &category).await?;
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxProductRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Utc;
    use rust_decimal::Decimal;

    struct Fixture {
        service: ProductService,
        cache: Arc<Cache>,
        seller: Actor,
        rival: Actor,
        admin: Actor,
    }

    async fn setup_test_service() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut actors = Vec::new();
        for (email, role) in [
            ("seller@example.com", UserRole::Seller),
            ("rival@example.com", UserRole::Seller),
            ("admin@example.com", UserRole::Admin),
        ] {
            let user = User {
                id: 0,
                name: "Test".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                role,
                phone: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let user = users.create(&user).await.unwrap();
            actors.push(Actor::new(user.id, user.role));
        }

        let cache = Arc::new(MemoryCache::new());
        let service = ProductService::new(
            SqlxProductRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool),
            cache.clone(),
        );
        Fixture {
            service,
            cache,
            seller: actors[0],
            rival: actors[1],
            admin: actors[2],
        }
    }

    fn input(slug: &str) -> CreateProductInput {
        CreateProductInput {
            name: "OPC 53 Grade Cement".to_string(),
            slug: slug.to_string(),
            description: "50 kg bag".to_string(),
            price: Decimal::new(42000, 2),
            unit: "bag".to_string(),
            stock_quantity: 100,
            category_id: Some(1),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_slug_and_unknown_category() {
        let f = setup_test_service().await;
        f.service.create(f.seller.id, input("opc-53")).await.unwrap();

        assert!(matches!(
            f.service.create(f.seller.id, input("opc-53")).await,
            Err(ProductServiceError::SlugExists)
        ));

        let mut orphan = input("opc-43");
        orphan.category_id = Some(999);
        assert!(matches!(
            f.service.create(f.seller.id, orphan).await,
            Err(ProductServiceError::CategoryNotFound)
        ));
    }

    #[tokio::test]
    async fn test_only_owner_or_admin_may_update() {
        let f = setup_test_service().await;
        let product = f.service.create(f.seller.id, input("opc-53")).await.unwrap();

        let change = UpdateProductInput {
            price: Some(Decimal::new(41000, 2)),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(product.id, &f.rival, change.clone()).await,
            Err(ProductServiceError::Forbidden)
        ));

        let updated = f.service.update(product.id, &f.admin, change).await.unwrap();
        assert_eq!(updated.price, Decimal::new(41000, 2));
        assert_eq!(updated.seller.id, f.seller.id);
    }

    #[tokio::test]
    async fn test_update_slug_conflict() {
        let f = setup_test_service().await;
        f.service.create(f.seller.id, input("opc-53")).await.unwrap();
        let other = f.service.create(f.seller.id, input("ppc")).await.unwrap();

        let same = UpdateProductInput {
            slug: Some("ppc".to_string()),
            ..Default::default()
        };
        assert!(f.service.update(other.id, &f.seller, same).await.is_ok());

        let taken = UpdateProductInput {
            slug: Some("opc-53".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(other.id, &f.seller, taken).await,
            Err(ProductServiceError::SlugExists)
        ));
    }

    #[tokio::test]
    async fn test_delete_hides_product() {
        let f = setup_test_service().await;
        let product = f.service.create(f.seller.id, input("opc-53")).await.unwrap();

        assert!(matches!(
            f.service.delete(product.id, &f.rival).await,
            Err(ProductServiceError::Forbidden)
        ));
        let hidden = f.service.delete(product.id, &f.seller).await.unwrap();
        assert!(!hidden.is_active);

        assert!(matches!(
            f.service.get(product.id).await,
            Err(ProductServiceError::NotFound)
        ));
        let page = f
            .service
            .list(&ProductFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_category_reads_are_cached() {
        let f = setup_test_service().await;

        let page = f.service.list_categories(&ListParams::new(1, 2)).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 3);

        let cached: Option<PagedResult<Category>> =
            f.cache.get("categories:page:1:2").await.unwrap();
        assert_eq!(cached.map(|p| p.items.len()), Some(2));

        let steel = f.service.category_by_slug("steel").await.unwrap();
        assert_eq!(steel.name, "Steel");
        assert!(matches!(
            f.service.category_by_slug("glass").await,
            Err(ProductServiceError::CategoryNotFound)
        ));
    }
}
