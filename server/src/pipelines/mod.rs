// server/src/pipelines/mod.rs

//! Defines and registers the payment pipelines.

use crate::errors::AppError;
use crate::state::AppState;
use payflow::Payflow;
use std::sync::Arc;

pub mod contexts;

pub mod initiate_payment_pipeline;
pub mod payment_callback_pipeline;

/// Registers every pipeline with the registry. Called once at startup.
pub fn register_all_pipelines(payflow: &Arc<Payflow<AppError>>, app_state: &AppState) {
  tracing::info!("Registering payment pipelines...");

  initiate_payment_pipeline::register_initiate_payment_pipeline(payflow, app_state);
  payment_callback_pipeline::register_payment_callback_pipeline(payflow, app_state);

  tracing::info!("All payment pipelines registered.");
}
