// server/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines::register_all_pipelines;
use crate::services::{DataService, PaymentGateway};
use payflow::Payflow;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub payflow: Arc<Payflow<AppError>>,
  pub config: Arc<AppConfig>,
  pub data_service: Arc<dyn DataService>,
  pub gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
  /// Wires the collaborators together and registers every pipeline.
  pub fn new(config: Arc<AppConfig>, data_service: Arc<dyn DataService>, gateway: Arc<dyn PaymentGateway>) -> Self {
    let payflow = Arc::new(Payflow::<AppError>::new());
    let state = AppState {
      payflow: payflow.clone(),
      config,
      data_service,
      gateway,
    };
    register_all_pipelines(&payflow, &state);
    state
  }
}
