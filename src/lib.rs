//! Brickyard - REST backend for a hyperlocal construction-materials marketplace
//!
//! Buyers browse products listed by sellers, keep delivery addresses and
//! place orders priced with tax and a delivery fee. Support tickets carry
//! a conversation between a customer and the administrators.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
