//! Order service
//!
//! Checkout itself is a single repository transaction; this layer turns its
//! outcome into errors and applies who-may-see and who-may-change rules.

use crate::db::repositories::{OrderRepository, PlaceOrderOutcome};
use crate::models::{CreateOrderInput, Order, OrderStatus, UserRole};
use crate::services::Actor;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum OrderServiceError {
    #[error("Order not found")]
    NotFound,

    #[error("Access denied")]
    Forbidden,

    #[error("You can only update orders for your products")]
    NotSellerOfOrder,

    #[error("Address not found")]
    AddressNotFound,

    #[error("Some products are not available")]
    ProductsUnavailable,

    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("Order total is too large")]
    AmountTooLarge,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self { repo }
    }

    /// Admins see every order, everyone else their own
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Order>, OrderServiceError> {
        let owner = (!actor.is_admin()).then_some(actor.id);
        Ok(self.repo.list(owner).await.context("Failed to list orders")?)
    }

    pub async fn get(&self, id: i64, actor: &Actor) -> Result<Order, OrderServiceError> {
        let order = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get order")?
            .ok_or(OrderServiceError::NotFound)?;

        if order.user_id != actor.id && !actor.is_admin() {
            return Err(OrderServiceError::Forbidden);
        }
        Ok(order)
    }

    /// Place an order for the actor and return it as stored
    pub async fn place(
        &self,
        actor: &Actor,
        input: CreateOrderInput,
    ) -> Result<Order, OrderServiceError> {
        let outcome = self
            .repo
            .place(actor.id, &input)
            .await
            .context("Failed to place order")?;

        let order_id = match outcome {
            PlaceOrderOutcome::Placed(id) => id,
            PlaceOrderOutcome::AddressNotFound => return Err(OrderServiceError::AddressNotFound),
            PlaceOrderOutcome::ProductsUnavailable => {
                return Err(OrderServiceError::ProductsUnavailable)
            }
            PlaceOrderOutcome::InsufficientStock(name) => {
                return Err(OrderServiceError::InsufficientStock(name))
            }
            PlaceOrderOutcome::AmountOutOfRange => return Err(OrderServiceError::AmountTooLarge),
        };

        let order = self
            .repo
            .get_by_id(order_id)
            .await
            .context("Failed to load placed order")?
            .ok_or_else(|| anyhow::anyhow!("Order {} not found after commit", order_id))?;

        tracing::info!(
            order_id,
            user_id = actor.id,
            total = %order.total,
            "Order placed"
        );
        Ok(order)
    }

    /// Change an order's status.
    ///
    /// Admins may update any order; a seller only one whose every line is
    /// one of their products.
    pub async fn update_status(
        &self,
        id: i64,
        actor: &Actor,
        status: OrderStatus,
    ) -> Result<Order, OrderServiceError> {
        if self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get order")?
            .is_none()
        {
            return Err(OrderServiceError::NotFound);
        }

        if actor.role == UserRole::Buyer {
            return Err(OrderServiceError::Forbidden);
        }

        if !actor.is_admin() {
            let sellers = self
                .repo
                .item_seller_ids(id)
                .await
                .context("Failed to load order sellers")?;
            if !sellers.iter().all(|seller_id| *seller_id == actor.id) {
                return Err(OrderServiceError::NotSellerOfOrder);
            }
        }

        if !self
            .repo
            .update_status(id, status)
            .await
            .context("Failed to update order status")?
        {
            return Err(OrderServiceError::NotFound);
        }
        tracing::info!(order_id = id, status = %status, actor_id = actor.id, "Order status changed");

        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get order")?
            .ok_or(OrderServiceError::NotFound)
    }
}
