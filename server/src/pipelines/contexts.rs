// server/src/pipelines/contexts.rs

//! Data structs the pipelines run on. Handlers receive them wrapped in
//! `payflow::ContextData`.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Buyer, CatalogItem, Order, OrderStatus};
use crate::services::redirect::{build_return_url, ReturnParams};
use crate::services::VerifiedTransaction;
use crate::state::AppState;

// --- Initiation ---

#[derive(Debug, Clone, PartialEq)]
pub struct RequestedItem {
  pub item_id: String,
  pub quantity: i64,
}

/// The initiation request as the client sent it, before any validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InitiatePaymentInput {
  pub buyer_id: Option<String>,
  pub items: Vec<RequestedItem>,
  pub declared_amount: Option<Decimal>,
  pub currency: String,
  pub return_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInitiation {
  pub buyer_id: Uuid,
  /// Distinct item ids in first-seen order, duplicates summed.
  pub quantities: Vec<(Uuid, u32)>,
  pub declared_amount: Decimal,
  pub currency: String,
  pub return_url: String,
}

#[derive(Clone)]
pub struct InitiatePaymentCtxData {
  pub app_state: AppState,
  pub input: InitiatePaymentInput,

  pub validated: Option<ValidatedInitiation>,
  pub lines: Vec<(CatalogItem, u32)>,
  pub authoritative_amount: Option<Decimal>,
  pub buyer: Option<Buyer>,
  pub order: Option<Order>,
  pub order_items_recorded: bool,
  pub checkout_url: Option<String>,
}

impl InitiatePaymentCtxData {
  pub fn new(app_state: AppState, input: InitiatePaymentInput) -> Self {
    Self {
      app_state,
      input,
      validated: None,
      lines: Vec::new(),
      authoritative_amount: None,
      buyer: None,
      order: None,
      order_items_recorded: false,
      checkout_url: None,
    }
  }
}

// --- Callback ---

pub const VERIFICATION_FAILED_STATUS: &str = "failure";
pub const VERIFICATION_FAILED_MESSAGE: &str = "Verification failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
  /// Send the buyer to this URL with a 302.
  Redirect(String),
  /// No order carries the reference. Nothing was changed.
  OrderNotFound,
}

#[derive(Clone)]
pub struct PaymentCallbackCtxData {
  pub app_state: AppState,
  pub tx_ref: Option<String>,

  pub order: Option<Order>,
  pub verification: Option<VerifiedTransaction>,
  pub verification_error: Option<String>,
  pub resolved_status: Option<OrderStatus>,
  pub status_persisted: bool,
  pub outcome: Option<CallbackOutcome>,
}

impl PaymentCallbackCtxData {
  pub fn new(app_state: AppState, tx_ref: Option<String>) -> Self {
    Self {
      app_state,
      tx_ref,
      order: None,
      verification: None,
      verification_error: None,
      resolved_status: None,
      status_persisted: false,
      outcome: None,
    }
  }

  /// Redirect telling the buyer verification did not complete. `None` until
  /// the order has been located.
  pub fn failure_redirect(&self) -> Option<String> {
    let order = self.order.as_ref()?;
    let order_id = order.id.to_string();
    Some(build_return_url(
      &order.return_url,
      ReturnParams {
        status: VERIFICATION_FAILED_STATUS,
        order_id: &order_id,
        tx_ref: &order.chapa_tx_ref,
        message: Some(VERIFICATION_FAILED_MESSAGE),
      },
    ))
  }
}
