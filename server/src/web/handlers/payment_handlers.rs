// server/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::{InitiatePaymentCtxData, InitiatePaymentInput, RequestedItem};
use crate::state::AppState;
use payflow::{ContextData, PipelineResult};

const HASURA_USER_ID_VARIABLE: &str = "x-hasura-user-id";

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
  pub item_id: String,
  pub quantity: i64,
}

/// Direct form of the initiation request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentPayload {
  pub buyer_id: Option<String>,
  #[serde(default)]
  pub items: Vec<ItemPayload>,
  /// Number or string.
  pub declared_amount: Option<Decimal>,
  #[serde(default)]
  pub currency: String,
  #[serde(default)]
  pub return_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeItemPayload {
  pub recipe_id: String,
  pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInput {
  #[serde(default)]
  pub recipe_items: Vec<RecipeItemPayload>,
  pub amount: Option<Decimal>,
  #[serde(default)]
  pub currency: String,
  #[serde(default)]
  pub return_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionInputWrapper {
  pub input: ActionInput,
}

#[derive(Debug, Deserialize)]
pub struct ActionName {
  pub name: String,
}

/// Hasura Action envelope. The buyer comes from the session, never from the input.
#[derive(Debug, Deserialize)]
pub struct ActionEnvelope {
  pub action: Option<ActionName>,
  pub input: ActionInputWrapper,
  #[serde(default)]
  pub session_variables: HashMap<String, String>,
}

impl From<InitiatePaymentPayload> for InitiatePaymentInput {
  fn from(payload: InitiatePaymentPayload) -> Self {
    InitiatePaymentInput {
      buyer_id: payload.buyer_id,
      items: payload
        .items
        .into_iter()
        .map(|i| RequestedItem {
          item_id: i.item_id,
          quantity: i.quantity,
        })
        .collect(),
      declared_amount: payload.declared_amount,
      currency: payload.currency,
      return_url: payload.return_url,
    }
  }
}

impl From<ActionEnvelope> for InitiatePaymentInput {
  fn from(envelope: ActionEnvelope) -> Self {
    let buyer_id = envelope
      .session_variables
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(HASURA_USER_ID_VARIABLE))
      .map(|(_, v)| v.clone());
    let input = envelope.input.input;
    InitiatePaymentInput {
      buyer_id,
      items: input
        .recipe_items
        .into_iter()
        .map(|i| RequestedItem {
          item_id: i.recipe_id,
          quantity: i.quantity,
        })
        .collect(),
      declared_amount: input.amount,
      currency: input.currency,
      return_url: input.return_url,
    }
  }
}

/// Accepts either the direct payload or a Hasura Action envelope.
pub fn parse_initiate_body(body: &[u8]) -> Result<InitiatePaymentInput, AppError> {
  let value: Value =
    serde_json::from_slice(body).map_err(|e| AppError::InvalidRequest(format!("Malformed JSON body: {}", e)))?;
  let is_action = value.get("action").is_some() || value.get("session_variables").is_some();

  if is_action {
    let envelope: ActionEnvelope = serde_json::from_value(value)
      .map_err(|e| AppError::InvalidRequest(format!("Invalid action payload: {}", e)))?;
    if let Some(action) = &envelope.action {
      info!(action = %action.name, "Received Hasura action.");
    }
    Ok(envelope.into())
  } else {
    let payload: InitiatePaymentPayload =
      serde_json::from_value(value).map_err(|e| AppError::InvalidRequest(format!("Invalid request body: {}", e)))?;
    Ok(payload.into())
  }
}

// --- Response DTO ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentResponse {
  pub checkout_url: String,
  pub order_id: String,
  pub tx_ref: String,
  pub message: String,
}

// --- Handler Implementation ---

#[instrument(name = "handler::initiate_chapa_payment", skip(app_state, body))]
pub async fn initiate_chapa_payment_handler(
  app_state: web::Data<AppState>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let input = parse_initiate_body(&body)?;
  let ctx_data = ContextData::new(InitiatePaymentCtxData::new(app_state.get_ref().clone(), input));

  match app_state.payflow.run(ctx_data.clone()).await? {
    PipelineResult::Completed => {
      let final_ctx = ctx_data.read();
      let (order, checkout_url) = match (final_ctx.order.as_ref(), final_ctx.checkout_url.as_ref()) {
        (Some(order), Some(url)) => (order, url),
        _ => {
          warn!("Initiation pipeline completed without an order or checkout URL.");
          return Err(AppError::Internal("Payment initiation finished incomplete".to_string()));
        }
      };
      info!(
        order_id = %order.id,
        tx_ref = %order.chapa_tx_ref,
        order_items_recorded = final_ctx.order_items_recorded,
        "Payment initiated successfully."
      );
      Ok(HttpResponse::Ok().json(InitiatePaymentResponse {
        checkout_url: checkout_url.clone(),
        order_id: order.id.to_string(),
        tx_ref: order.chapa_tx_ref.clone(),
        message: "Payment initiated successfully".to_string(),
      }))
    }
    PipelineResult::Stopped => {
      warn!("Initiation pipeline was stopped by a handler.");
      Err(AppError::Internal("Payment initiation was halted".to_string()))
    }
  }
}
