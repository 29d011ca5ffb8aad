// server/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Local order status.
///
/// `pending` moves to one of the other three. `completed` and `failed` are
/// terminal. `unknown` may still be resolved by a later callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Completed,
  Failed,
  Unknown,
}

impl OrderStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Completed => "completed",
      OrderStatus::Failed => "failed",
      OrderStatus::Unknown => "unknown",
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, OrderStatus::Completed | OrderStatus::Failed)
  }

  /// Statuses a reconciliation write may overwrite.
  pub const RESOLVABLE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Unknown];

  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    !self.is_terminal() && next != OrderStatus::Pending
  }

  /// Maps the gateway's verify status onto ours.
  pub fn from_gateway_status(gateway_status: &str) -> Self {
    match gateway_status {
      "success" => OrderStatus::Completed,
      "failed" => OrderStatus::Failed,
      _ => OrderStatus::Unknown,
    }
  }

  /// Text shown to the end user after the callback redirect.
  pub fn user_message(self) -> &'static str {
    match self {
      OrderStatus::Completed => "Your payment was successful!",
      OrderStatus::Failed => "Your payment failed.",
      OrderStatus::Pending | OrderStatus::Unknown => "Payment status unknown.",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub total_amount: Decimal,
  pub currency: String,
  pub return_url: String,
  pub status: OrderStatus,
  pub chapa_tx_ref: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub chapa_transaction_id: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
