// server/src/pipelines/initiate_payment_pipeline.rs
use crate::errors::AppError;
use crate::models::{Order, OrderItem, OrderStatus};
use crate::pipelines::contexts::{InitiatePaymentCtxData, InitiatePaymentInput, ValidatedInitiation};
use crate::services::pricing::{amounts_match, authoritative_amount, format_amount};
use crate::services::redirect::{build_return_url, ReturnParams};
use crate::services::tx_ref::generate_tx_ref;
use crate::services::InitiatePaymentRequest;
use crate::state::AppState;
use chrono::Utc;
use payflow::{ContextData, Payflow, Pipeline, PipelineControl};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

fn missing(what: &str) -> AppError {
  AppError::Internal(format!("{} not available at this step", what))
}

/// Checks the raw request and normalises it. Duplicate item ids are merged by
/// summing their quantities.
pub fn validate_initiation(input: &InitiatePaymentInput) -> Result<ValidatedInitiation, AppError> {
  let buyer_id = match input.buyer_id.as_deref().map(str::trim) {
    None | Some("") => return Err(AppError::InvalidRequest("buyerId is required".to_string())),
    Some(raw) => Uuid::parse_str(raw).map_err(|_| AppError::InvalidRequest("buyerId must be a UUID".to_string()))?,
  };

  if input.items.is_empty() {
    return Err(AppError::InvalidRequest("At least one item is required".to_string()));
  }

  let mut quantities: Vec<(Uuid, u32)> = Vec::with_capacity(input.items.len());
  for requested in &input.items {
    let item_id = Uuid::parse_str(requested.item_id.trim())
      .map_err(|_| AppError::InvalidRequest(format!("Invalid item id: {}", requested.item_id)))?;
    let quantity = u32::try_from(requested.quantity)
      .ok()
      .filter(|q| *q > 0)
      .ok_or_else(|| AppError::InvalidRequest(format!("Quantity for item {} must be a positive integer", item_id)))?;

    match quantities.iter_mut().find(|(id, _)| *id == item_id) {
      Some((_, existing)) => {
        *existing = existing
          .checked_add(quantity)
          .ok_or_else(|| AppError::InvalidRequest(format!("Quantity for item {} is too large", item_id)))?;
      }
      None => quantities.push((item_id, quantity)),
    }
  }

  let declared_amount = input
    .declared_amount
    .ok_or_else(|| AppError::InvalidRequest("declaredAmount is required".to_string()))?;
  if declared_amount.is_sign_negative() {
    return Err(AppError::InvalidRequest("declaredAmount must not be negative".to_string()));
  }

  let currency = input.currency.trim();
  if currency.is_empty() {
    return Err(AppError::InvalidRequest("currency is required".to_string()));
  }

  let return_url = input.return_url.trim();
  match Url::parse(return_url) {
    Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
    _ => return Err(AppError::InvalidRequest("returnUrl must be an absolute http(s) URL".to_string())),
  }

  Ok(ValidatedInitiation {
    buyer_id,
    quantities,
    declared_amount,
    currency: currency.to_string(),
    return_url: return_url.to_string(),
  })
}

pub fn register_initiate_payment_pipeline(payflow: &Arc<Payflow<AppError>>, app_state: &AppState) {
  let mut p = Pipeline::<InitiatePaymentCtxData, AppError>::new(&[
    ("validate_request", false, None),
    ("resolve_catalog_items", false, None),
    ("verify_declared_amount", false, None),
    ("resolve_buyer", false, None),
    ("record_pending_order", false, None),
    ("record_order_items", true, None), // Best-effort
    ("initiate_gateway_payment", false, None),
  ])
  .with_deadline(app_state.config.initiate_timeout);

  // Step 1: Validate the request
  p.on_root("validate_request", |ctx_data: ContextData<InitiatePaymentCtxData>| {
    Box::pin(async move {
      let validated = ctx_data.with(|d| validate_initiation(&d.input))?;
      info!(
        buyer_id = %validated.buyer_id,
        distinct_items = validated.quantities.len(),
        "Initiation request validated."
      );
      ctx_data.write().validated = Some(validated);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 2: Every referenced catalog item must exist
  p.on_root("resolve_catalog_items", |ctx_data: ContextData<InitiatePaymentCtxData>| {
    Box::pin(async move {
      let (quantities, data_service) = {
        let guard = ctx_data.read();
        let validated = guard.validated.as_ref().ok_or_else(|| missing("validated request"))?;
        (validated.quantities.clone(), guard.app_state.data_service.clone())
      };

      let ids: Vec<Uuid> = quantities.iter().map(|(id, _)| *id).collect();
      let found = data_service.catalog_items_by_ids(&ids).await?;
      let mut by_id: HashMap<Uuid, _> = found.into_iter().map(|item| (item.id, item)).collect();

      let mut lines = Vec::with_capacity(quantities.len());
      for (item_id, quantity) in quantities {
        match by_id.remove(&item_id) {
          Some(item) => lines.push((item, quantity)),
          None => {
            warn!(%item_id, "Requested catalog item does not exist.");
            return Err(AppError::NotFound(format!("Item {} not found", item_id)));
          }
        }
      }

      ctx_data.write().lines = lines;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 3: Server-side total against the client's figure
  p.on_root("verify_declared_amount", |ctx_data: ContextData<InitiatePaymentCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let declared = guard
        .validated
        .as_ref()
        .map(|v| v.declared_amount)
        .ok_or_else(|| missing("validated request"))?;
      let total = authoritative_amount(guard.lines.iter().map(|(item, qty)| (item, *qty)));

      if !amounts_match(declared, total) {
        warn!(
          declared = %format_amount(declared),
          authoritative = %format_amount(total),
          "Declared amount rejected."
        );
        return Err(AppError::AmountMismatch);
      }
      guard.authoritative_amount = Some(total);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 4: Buyer contact details for the gateway
  p.on_root("resolve_buyer", |ctx_data: ContextData<InitiatePaymentCtxData>| {
    Box::pin(async move {
      let (buyer_id, data_service) = {
        let guard = ctx_data.read();
        let validated = guard.validated.as_ref().ok_or_else(|| missing("validated request"))?;
        (validated.buyer_id, guard.app_state.data_service.clone())
      };

      let buyer = data_service.buyer_by_id(buyer_id).await?.ok_or_else(|| {
        warn!(%buyer_id, "Buyer not found.");
        AppError::NotFound("Buyer details not found".to_string())
      })?;

      ctx_data.write().buyer = Some(buyer);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 5: The order exists, pending, before the gateway hears of it
  p.on_root("record_pending_order", |ctx_data: ContextData<InitiatePaymentCtxData>| {
    Box::pin(async move {
      let now = Utc::now();
      let (order, data_service) = {
        let guard = ctx_data.read();
        let validated = guard.validated.as_ref().ok_or_else(|| missing("validated request"))?;
        let total = guard.authoritative_amount.ok_or_else(|| missing("authoritative amount"))?;
        let order = Order {
          id: Uuid::new_v4(),
          user_id: validated.buyer_id,
          total_amount: total,
          currency: validated.currency.clone(),
          return_url: validated.return_url.clone(),
          status: OrderStatus::Pending,
          chapa_tx_ref: generate_tx_ref(now),
          chapa_transaction_id: None,
          created_at: now,
          updated_at: now,
        };
        (order, guard.app_state.data_service.clone())
      };

      let stored = data_service.insert_order(&order).await.map_err(|e| {
        error!(order_id = %order.id, tx_ref = %order.chapa_tx_ref, error = %e, "Failed to record pending order.");
        e
      })?;
      info!(order_id = %stored.id, tx_ref = %stored.chapa_tx_ref, "Pending order recorded.");

      ctx_data.write().order = Some(stored);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 6: Price snapshots per line
  p.on_root("record_order_items", |ctx_data: ContextData<InitiatePaymentCtxData>| {
    Box::pin(async move {
      let now = Utc::now();
      let (order_id, items, data_service) = {
        let guard = ctx_data.read();
        let order = guard.order.as_ref().ok_or_else(|| missing("order"))?;
        let items: Vec<OrderItem> = guard
          .lines
          .iter()
          .map(|(item, qty)| OrderItem::snapshot(order.id, item, *qty, now))
          .collect();
        (order.id, items, guard.app_state.data_service.clone())
      };

      let inserted = data_service.insert_order_items(&items).await.map_err(|e| {
        warn!(%order_id, error = %e, "Order items were not recorded.");
        e
      })?;
      info!(%order_id, inserted, "Order items recorded.");

      ctx_data.write().order_items_recorded = true;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 7: Hand the buyer over to the gateway
  p.on_root("initiate_gateway_payment", |ctx_data: ContextData<InitiatePaymentCtxData>| {
    Box::pin(async move {
      let (request, order_id, gateway) = {
        let guard = ctx_data.read();
        let order = guard.order.as_ref().ok_or_else(|| missing("order"))?;
        let buyer = guard.buyer.as_ref().ok_or_else(|| missing("buyer"))?;
        let config = &guard.app_state.config;
        let order_id = order.id.to_string();
        let request = InitiatePaymentRequest {
          amount: format_amount(order.total_amount),
          currency: order.currency.clone(),
          tx_ref: order.chapa_tx_ref.clone(),
          email: buyer.email.clone(),
          first_name: buyer.first_name.clone(),
          last_name: buyer.last_name.clone(),
          phone_number: buyer.phone_number.clone(),
          callback_url: config.chapa_callback_url.clone(),
          return_url: build_return_url(
            &order.return_url,
            ReturnParams {
              status: OrderStatus::Pending.as_str(),
              order_id: &order_id,
              tx_ref: &order.chapa_tx_ref,
              message: None,
            },
          ),
          title: config.chapa_payment_title.clone(),
          description: format!("Order ID: {}", order_id),
        };
        (request, order.id, guard.app_state.gateway.clone())
      };

      let checkout_url = gateway.initiate(&request).await.map_err(|e| {
        error!(%order_id, tx_ref = %request.tx_ref, error = %e, "Gateway initiation failed; order stays pending.");
        AppError::from(e)
      })?;
      info!(%order_id, tx_ref = %request.tx_ref, "Payment initiated.");

      ctx_data.write().checkout_url = Some(checkout_url);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  payflow.register_pipeline(p);
}
