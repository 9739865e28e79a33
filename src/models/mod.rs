//! Data models
//!
//! Database entities, service inputs and the pagination types shared by
//! every listing endpoint.

mod address;
mod category;
pub mod money;
mod order;
pub mod pagination;
mod product;
mod support;
mod user;

pub use address::{Address, CreateAddressInput, UpdateAddressInput};
pub use category::{Category, CategorySummary};
pub use order::{
    price_order, CreateOrderInput, Order, OrderItem, OrderItemProduct, OrderLine, OrderStatus,
    OrderTotals, PricedLine, PricingError, DELIVERY_FEE_MINOR, TAX_RATE_PERCENT,
};
pub use pagination::{ListParams, PagedResult};
pub use product::{CreateProductInput, Product, ProductFilter, UpdateProductInput};
pub use support::{
    CreateTicketInput, SenderType, SupportMessage, SupportTicket, TicketStatus,
};
pub use user::{CreateUserInput, UpdateProfileInput, User, UserRole, UserSummary};
