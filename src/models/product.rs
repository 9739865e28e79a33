//! Product model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CategorySummary, UserSummary};

/// A product listed by a seller.
///
/// `category` and `seller` are filled from joins when the product is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    /// URL-friendly identifier (unique)
    pub slug: String,
    pub name: String,
    pub description: String,
    /// Price per unit
    pub price: Decimal,
    /// Selling unit, e.g. "bag" or "tonne"
    pub unit: String,
    pub stock_quantity: i64,
    /// Inactive products are hidden and cannot be ordered
    pub is_active: bool,
    pub seller_id: i64,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category: Option<CategorySummary>,
    pub seller: UserSummary,
}

impl Product {
    /// Whether the given user owns this listing
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.seller_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub unit: String,
    pub stock_quantity: i64,
    pub category_id: Option<i64>,
}

/// Partial update, `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub unit: Option<String>,
    pub stock_quantity: Option<i64>,
    pub category_id: Option<i64>,
}

impl UpdateProductInput {
    /// Apply the present fields to an existing product
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(slug) = &self.slug {
            product.slug = slug.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(unit) = &self.unit {
            product.unit = unit.clone();
        }
        if let Some(stock_quantity) = self.stock_quantity {
            product.stock_quantity = stock_quantity;
        }
        if let Some(category_id) = self.category_id {
            product.category_id = Some(category_id);
        }
    }
}

/// Catalogue listing filters
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of the product name
    pub search: Option<String>,
    pub category_slug: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_apply_partial_update() {
        let mut product = Product {
            id: 1,
            slug: "tmt-bar-12mm".to_string(),
            name: "TMT Bar 12mm".to_string(),
            description: "Fe 500D".to_string(),
            price: Decimal::new(6500, 2),
            unit: "kg".to_string(),
            stock_quantity: 500,
            is_active: true,
            seller_id: 7,
            category_id: Some(2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            category: None,
            seller: UserSummary {
                id: 7,
                name: "Steel Depot".to_string(),
                email: None,
            },
        };

        UpdateProductInput {
            price: Some(Decimal::new(6800, 2)),
            stock_quantity: Some(450),
            ..Default::default()
        }
        .apply_to(&mut product);

        assert_eq!(product.price, Decimal::new(6800, 2));
        assert_eq!(product.stock_quantity, 450);
        assert_eq!(product.name, "TMT Bar 12mm");
        assert!(product.is_owned_by(7));
    }
}
