// server/src/pipelines/payment_callback_pipeline.rs
use crate::errors::AppError;
use crate::models::OrderStatus;
use crate::pipelines::contexts::{CallbackOutcome, PaymentCallbackCtxData};
use crate::services::pricing::amounts_match;
use crate::services::redirect::{build_return_url, ReturnParams};
use crate::state::AppState;
use payflow::{ContextData, Payflow, Pipeline, PipelineControl, SkipCondition};
use std::sync::Arc;
use tracing::{error, info, warn};

pub fn register_payment_callback_pipeline(payflow: &Arc<Payflow<AppError>>, app_state: &AppState) {
  let verification_missing: SkipCondition<PaymentCallbackCtxData> =
    Arc::new(|ctx_data: ContextData<PaymentCallbackCtxData>| ctx_data.read().verification.is_none());

  let mut p = Pipeline::<PaymentCallbackCtxData, AppError>::new(&[
    ("locate_order", false, None),
    ("verify_with_gateway", false, None),
    ("persist_reconciled_status", false, Some(verification_missing)),
    ("compose_redirect", false, None),
  ])
  .with_deadline(app_state.config.callback_timeout);

  // Step 1: Find the order the reference belongs to
  p.on_root("locate_order", |ctx_data: ContextData<PaymentCallbackCtxData>| {
    Box::pin(async move {
      let (tx_ref, data_service) = {
        let guard = ctx_data.read();
        let tx_ref = guard
          .tx_ref
          .as_deref()
          .map(str::trim)
          .filter(|r| !r.is_empty())
          .map(str::to_string);
        (tx_ref, guard.app_state.data_service.clone())
      };
      let tx_ref = tx_ref.ok_or_else(|| AppError::InvalidRequest("Missing transaction reference".to_string()))?;

      let order = match data_service.order_by_tx_ref(&tx_ref).await {
        Ok(Some(order)) => order,
        Ok(None) => {
          warn!(%tx_ref, "Callback for unknown transaction reference.");
          ctx_data.write().outcome = Some(CallbackOutcome::OrderNotFound);
          return Ok(PipelineControl::Stop);
        }
        Err(e) => {
          error!(%tx_ref, error = %e, "Order lookup failed during callback.");
          ctx_data.write().outcome = Some(CallbackOutcome::OrderNotFound);
          return Ok(PipelineControl::Stop);
        }
      };
      info!(%tx_ref, order_id = %order.id, status = %order.status, "Order located for callback.");

      let mut guard = ctx_data.write();
      guard.tx_ref = Some(tx_ref);
      guard.order = Some(order);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 2: Ask the gateway, whatever the webhook claimed
  p.on_root("verify_with_gateway", |ctx_data: ContextData<PaymentCallbackCtxData>| {
    Box::pin(async move {
      let (tx_ref, gateway) = {
        let guard = ctx_data.read();
        let order = guard
          .order
          .as_ref()
          .ok_or_else(|| AppError::Internal("order not located".to_string()))?;
        (order.chapa_tx_ref.clone(), guard.app_state.gateway.clone())
      };

      match gateway.verify(&tx_ref).await {
        Ok(verified) => {
          info!(%tx_ref, gateway_status = %verified.status, "Transaction verified.");
          ctx_data.write().verification = Some(verified);
        }
        Err(e) => {
          warn!(%tx_ref, error = %e, "Transaction verification failed; order left unchanged.");
          ctx_data.write().verification_error = Some(e.to_string());
        }
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 3: One guarded write; terminal orders are never touched
  p.on_root("persist_reconciled_status", |ctx_data: ContextData<PaymentCallbackCtxData>| {
    Box::pin(async move {
      let (order, verified, data_service) = {
        let guard = ctx_data.read();
        let order = guard
          .order
          .clone()
          .ok_or_else(|| AppError::Internal("order not located".to_string()))?;
        let verified = guard
          .verification
          .clone()
          .ok_or_else(|| AppError::Internal("verification missing".to_string()))?;
        (order, verified, guard.app_state.data_service.clone())
      };
      let tx_ref = order.chapa_tx_ref.as_str();
      let next = OrderStatus::from_gateway_status(&verified.status);

      if let Some(amount) = verified.amount {
        if !amounts_match(amount, order.total_amount) {
          warn!(%tx_ref, order_id = %order.id, "Gateway amount differs from the order total.");
        }
      }

      if !order.status.can_transition_to(next) {
        info!(%tx_ref, stored = %order.status, gateway = %next, "Order already resolved; nothing written.");
        ctx_data.write().resolved_status = Some(order.status);
        return Ok(PipelineControl::Continue);
      }

      let outcome = data_service
        .update_order_status_by_tx_ref(tx_ref, next, verified.gateway_transaction_id.as_deref())
        .await;

      let (resolved, persisted) = match outcome {
        Ok(0) => {
          // Resolved concurrently; report what the store holds.
          let stored = match data_service.order_by_tx_ref(tx_ref).await {
            Ok(Some(current)) => current.status,
            Ok(None) => next,
            Err(e) => {
              warn!(%tx_ref, error = %e, "Could not re-read order after a no-op update.");
              next
            }
          };
          info!(%tx_ref, stored = %stored, "Order was resolved by another callback.");
          (stored, false)
        }
        Ok(_) => {
          info!(%tx_ref, order_id = %order.id, status = %next, "Order status reconciled.");
          (next, true)
        }
        Err(e) => {
          error!(%tx_ref, order_id = %order.id, error = %e, "Failed to persist reconciled status.");
          (next, false)
        }
      };

      let mut guard = ctx_data.write();
      guard.resolved_status = Some(resolved);
      guard.status_persisted = persisted;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 4: Where the buyer goes next
  p.on_root("compose_redirect", |ctx_data: ContextData<PaymentCallbackCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let redirect = if guard.verification_error.is_some() {
        guard.failure_redirect()
      } else {
        guard.order.as_ref().map(|order| {
          let status = guard.resolved_status.unwrap_or(order.status);
          let order_id = order.id.to_string();
          build_return_url(
            &order.return_url,
            ReturnParams {
              status: status.as_str(),
              order_id: &order_id,
              tx_ref: &order.chapa_tx_ref,
              message: Some(status.user_message()),
            },
          )
        })
      };
      let redirect = redirect.ok_or_else(|| AppError::Internal("order not located".to_string()))?;
      guard.outcome = Some(CallbackOutcome::Redirect(redirect));
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  payflow.register_pipeline(p);
}
