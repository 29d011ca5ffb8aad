// server/src/models/mod.rs

//! Records exchanged with the GraphQL data service.

pub mod buyer;
pub mod catalog;
pub mod order;
pub mod order_item;

pub use buyer::Buyer;
pub use catalog::{CatalogImage, CatalogItem};
pub use order::{Order, OrderStatus};
pub use order_item::OrderItem;
