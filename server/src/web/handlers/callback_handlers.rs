// server/src/web/handlers/callback_handlers.rs

use actix_web::http::header::LOCATION;
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::{CallbackOutcome, PaymentCallbackCtxData};
use crate::state::AppState;
use payflow::ContextData;

/// Parameter names the gateway uses for the reference, in lookup order.
const TX_REF_KEYS: [&str; 2] = ["trx_ref", "tx_ref"];

fn form_pairs(raw: &str) -> HashMap<String, String> {
  web::Query::<HashMap<String, String>>::from_query(raw)
    .map(|q| q.into_inner())
    .unwrap_or_default()
}

fn first_present(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
  TX_REF_KEYS
    .iter()
    .filter_map(|key| lookup(*key))
    .map(|v| v.trim().to_string())
    .find(|v| !v.is_empty())
}

/// Query string first; for POST, a JSON or form body next.
pub fn extract_tx_ref(query_string: &str, method: &Method, body: &[u8]) -> Option<String> {
  let query = form_pairs(query_string);
  if let Some(found) = first_present(|key| query.get(key).cloned()) {
    return Some(found);
  }
  if method != Method::POST || body.is_empty() {
    return None;
  }

  if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
    return first_present(|key| match map.get(key) {
      Some(Value::String(s)) => Some(s.clone()),
      _ => None,
    });
  }
  let form = form_pairs(std::str::from_utf8(body).ok()?);
  first_present(|key| form.get(key).cloned())
}

fn redirect_to(url: &str) -> HttpResponse {
  HttpResponse::Found().insert_header((LOCATION, url)).finish()
}

fn order_not_found() -> HttpResponse {
  HttpResponse::Ok().json(json!({ "message": "Order not found for verification" }))
}

#[instrument(name = "handler::chapa_callback", skip(app_state, req, body), fields(method = %req.method()))]
pub async fn chapa_callback_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let tx_ref = extract_tx_ref(req.query_string(), req.method(), &body).ok_or_else(|| {
    warn!("Callback arrived without a transaction reference.");
    AppError::InvalidRequest("Missing trx_ref".to_string())
  })?;
  info!(%tx_ref, "Payment callback received.");

  let ctx_data = ContextData::new(PaymentCallbackCtxData::new(app_state.get_ref().clone(), Some(tx_ref.clone())));

  if let Err(app_err) = app_state.payflow.run(ctx_data.clone()).await {
    let timed_out = matches!(&app_err, AppError::Workflow { source } if source.is_deadline_exceeded());
    if !timed_out {
      return Err(app_err);
    }
    let failure = ctx_data.read().failure_redirect();
    return Ok(match failure {
      Some(url) => {
        error!(%tx_ref, "Callback ran out of time; sending buyer to the failure page.");
        redirect_to(&url)
      }
      None => {
        error!(%tx_ref, "Order lookup did not answer before the callback deadline.");
        order_not_found()
      }
    });
  }

  let outcome = ctx_data.read().outcome.clone();
  match outcome {
    Some(CallbackOutcome::Redirect(url)) => {
      info!(%tx_ref, "Redirecting buyer after reconciliation.");
      Ok(redirect_to(&url))
    }
    Some(CallbackOutcome::OrderNotFound) => Ok(order_not_found()),
    None => Err(AppError::Internal("Callback finished without an outcome".to_string())),
  }
}
