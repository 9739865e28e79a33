//! Database repositories
//!
//! One repository per aggregate. Each exposes an `async_trait` interface and
//! an SQLx implementation covering SQLite and MySQL.

pub mod address;
pub mod category;
pub mod order;
pub mod product;
pub mod support;
pub mod user;

pub use address::{AddressRepository, SqlxAddressRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use order::{OrderRepository, PlaceOrderOutcome, SqlxOrderRepository};
pub use product::{ProductRepository, SqlxProductRepository};
pub use support::{SqlxSupportRepository, SupportRepository};
pub use user::{SqlxUserRepository, UserRepository};
