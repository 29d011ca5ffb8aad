// payflow/src/error.rs
use anyhow::Error as AnyhowError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Type mismatch during context downcast (expected {expected_type}, step: '{step_name}')")]
  TypeMismatch { step_name: String, expected_type: String },

  #[error("Error in user-provided handler or external operation. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("Configuration error for step '{step_name}': {message}")]
  ConfigurationError { step_name: String, message: String },

  /// The pipeline did not finish within its run deadline.
  /// `last_step` names the step that was executing when time ran out.
  #[error("Pipeline exceeded its deadline of {deadline:?} (last step: {last_step:?})")]
  DeadlineExceeded {
    deadline: Duration,
    last_step: Option<String>,
  },

  #[error("Internal payflow error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for FlowError {
  fn from(err: AnyhowError) -> Self {
    FlowError::HandlerError { source: err }
  }
}

impl FlowError {
  pub fn is_deadline_exceeded(&self) -> bool {
    matches!(self, FlowError::DeadlineExceeded { .. })
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
