//! Success envelope and response bodies
//!
//! Every successful response is `{success: true, data}`. List endpoints that
//! paginate put `{data, pagination}` inside `data`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::models::{Address, Category, Order, PagedResult, Product, SupportTicket, User};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }

    pub fn created(data: T) -> impl IntoResponse {
        (StatusCode::CREATED, Self::ok(data))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

/// One page of items with its position in the full listing
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> From<PagedResult<T>> for Paginated<T> {
    fn from(page: PagedResult<T>) -> Self {
        let pagination = Pagination {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages(),
        };
        Self {
            data: page.items,
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct CategoryBody {
    pub category: Category,
}

#[derive(Debug, Serialize)]
pub struct AddressBody {
    pub address: Address,
}

#[derive(Debug, Serialize)]
pub struct AddressesBody {
    pub addresses: Vec<Address>,
}

#[derive(Debug, Serialize)]
pub struct OrderBody {
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct OrdersBody {
    pub orders: Vec<Order>,
}

#[derive(Debug, Serialize)]
pub struct TicketBody {
    pub ticket: SupportTicket,
}

#[derive(Debug, Serialize)]
pub struct TicketsBody {
    pub tickets: Vec<SupportTicket>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListParams;

    #[test]
    fn test_paginated_shape() {
        let page = PagedResult::new(vec![1, 2, 3], 23, &ListParams::new(2, 3));
        let body = serde_json::to_value(ApiResponse {
            success: true,
            data: Paginated::from(page),
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "success": true,
                "data": {
                    "data": [1, 2, 3],
                    "pagination": { "page": 2, "limit": 3, "total": 23, "totalPages": 8 }
                }
            })
        );
    }
}
