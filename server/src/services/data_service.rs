// server/src/services/data_service.rs

//! The contract this service needs from the GraphQL data service.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Buyer, CatalogItem, Order, OrderItem, OrderStatus};

#[derive(Debug, Error)]
pub enum DataServiceError {
  #[error("data service unreachable: {0}")]
  Transport(String),

  #[error("data service returned HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("constraint violation ({constraint:?}): {message}")]
  ConstraintViolation {
    constraint: Option<String>,
    message: String,
  },

  #[error("{operation} failed: {message}")]
  Graphql { operation: &'static str, message: String },

  #[error("could not decode {operation} response: {message}")]
  Decode { operation: &'static str, message: String },
}

/// Typed query/mutation façade over the backing store.
///
/// Implementations must make `update_order_status_by_tx_ref` a single write
/// that only touches orders still in a resolvable status
/// (`OrderStatus::RESOLVABLE`), and must reject a second order with an
/// already used `chapa_tx_ref`.
#[async_trait]
pub trait DataService: Send + Sync {
  /// Returns the items that exist; missing ids are simply absent.
  async fn catalog_items_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CatalogItem>, DataServiceError>;

  async fn buyer_by_id(&self, id: Uuid) -> Result<Option<Buyer>, DataServiceError>;

  async fn insert_order(&self, order: &Order) -> Result<Order, DataServiceError>;

  /// Returns the number of inserted rows.
  async fn insert_order_items(&self, items: &[OrderItem]) -> Result<u64, DataServiceError>;

  /// Returns the number of updated rows: 0 when no resolvable order carries `tx_ref`.
  async fn update_order_status_by_tx_ref(
    &self,
    tx_ref: &str,
    status: OrderStatus,
    chapa_transaction_id: Option<&str>,
  ) -> Result<u64, DataServiceError>;

  async fn order_by_tx_ref(&self, tx_ref: &str) -> Result<Option<Order>, DataServiceError>;
}
