// server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::services::chapa::GatewayError;
use crate::services::data_service::DataServiceError;
use payflow::FlowError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Invalid request: {0}")]
  InvalidRequest(String),

  #[error("Resource not found: {0}")]
  NotFound(String),

  /// The client-declared total disagrees with the server-computed one.
  /// Carries no amounts on purpose.
  #[error("Declared amount does not match the order total")]
  AmountMismatch,

  #[error("Data service error: {0}")]
  DataService(#[from] DataServiceError),

  #[error("Payment gateway unavailable: {0}")]
  GatewayUnavailable(String),

  #[error("Payment initiation failed: {0}")]
  PaymentInitiationFailed(String),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Workflow error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal server error: {0}")]
  Internal(String),
}

impl From<GatewayError> for AppError {
  fn from(err: GatewayError) -> Self {
    match err {
      GatewayError::Rejected { .. } => AppError::PaymentInitiationFailed(err.to_string()),
      other => AppError::GatewayUnavailable(other.to_string()),
    }
  }
}

impl AppError {
  /// The message shown to callers. Upstream details stay in the logs.
  pub fn public_message(&self) -> String {
    match self {
      AppError::InvalidRequest(m) | AppError::NotFound(m) => m.clone(),
      AppError::AmountMismatch => "Amount mismatch. Please try again.".to_string(),
      AppError::DataService(DataServiceError::ConstraintViolation { .. }) => {
        "Order could not be recorded, please retry".to_string()
      }
      AppError::DataService(_) => "Failed to reach the data service".to_string(),
      AppError::GatewayUnavailable(_) => "Payment service is unavailable".to_string(),
      AppError::PaymentInitiationFailed(_) => "Payment service failed to initiate".to_string(),
      AppError::Config(_) => "Configuration issue".to_string(),
      AppError::Workflow { source } if source.is_deadline_exceeded() => "Request timed out".to_string(),
      AppError::Workflow { .. } | AppError::Internal(_) => "An internal error occurred".to_string(),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::InvalidRequest(_) | AppError::AmountMismatch => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::DataService(DataServiceError::ConstraintViolation { .. }) => StatusCode::CONFLICT,
      AppError::DataService(_)
      | AppError::GatewayUnavailable(_)
      | AppError::PaymentInitiationFailed(_)
      | AppError::Config(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Rejecting request");
    }
    HttpResponse::build(status).json(json!({ "message": self.public_message() }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
