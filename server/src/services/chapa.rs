// server/src/services/chapa.rs

//! Client for the Chapa payment gateway.

use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
  /// Transport failure or a non-2xx answer. `status` is `None` when no
  /// response arrived at all.
  #[error("gateway unavailable (status {status:?}): {body}")]
  Unavailable { status: Option<u16>, body: String },

  /// The gateway answered but refused the request.
  #[error("gateway rejected the request: {message}")]
  Rejected { message: String },
}

/// Body of `POST /transaction/initialize`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitiatePaymentRequest {
  /// Two decimal places, e.g. `"100.00"`.
  pub amount: String,
  pub currency: String,
  pub tx_ref: String,
  pub email: String,
  pub first_name: String,
  pub last_name: String,
  pub phone_number: String,
  pub callback_url: String,
  pub return_url: String,
  pub title: String,
  pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedTransaction {
  /// Raw gateway status, e.g. `success`, `failed`, `pending`.
  pub status: String,
  pub gateway_transaction_id: Option<String>,
  pub amount: Option<Decimal>,
  pub currency: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Returns the hosted checkout URL.
  async fn initiate(&self, request: &InitiatePaymentRequest) -> Result<String, GatewayError>;

  async fn verify(&self, tx_ref: &str) -> Result<VerifiedTransaction, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
  #[serde(default)]
  status: String,
  // Chapa sends either a string or a field-error object here.
  #[serde(default)]
  message: Value,
  data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CheckoutData {
  checkout_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
  #[serde(default)]
  status: String,
  #[serde(default)]
  id: Option<Value>,
  #[serde(default)]
  reference: Option<String>,
  #[serde(default)]
  amount: Option<Decimal>,
  #[serde(default)]
  currency: Option<String>,
}

fn message_text(message: &Value) -> String {
  match message {
    Value::String(s) => s.clone(),
    Value::Null => "no message".to_string(),
    other => other.to_string(),
  }
}

#[derive(Clone)]
pub struct ChapaClient {
  http: Client,
  base_url: String,
  secret_key: String,
}

impl std::fmt::Debug for ChapaClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ChapaClient").field("base_url", &self.base_url).finish()
  }
}

impl ChapaClient {
  pub fn new(
    base_url: impl Into<String>,
    secret_key: impl Into<String>,
    timeout: Duration,
  ) -> Result<Self, GatewayError> {
    let http = Client::builder().timeout(timeout).build().map_err(|e| GatewayError::Unavailable {
      status: None,
      body: format!("failed to build HTTP client: {}", e),
    })?;
    Ok(Self {
      http,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      secret_key: secret_key.into(),
    })
  }

  fn verify_url(&self, tx_ref: &str) -> Result<Url, GatewayError> {
    let invalid = |detail: String| GatewayError::Unavailable {
      status: None,
      body: format!("invalid gateway base URL {}: {}", self.base_url, detail),
    };
    let mut url = Url::parse(&format!("{}/transaction/verify", self.base_url)).map_err(|e| invalid(e.to_string()))?;
    url
      .path_segments_mut()
      .map_err(|_| invalid("cannot be a base".to_string()))?
      .push(tx_ref);
    Ok(url)
  }

  /// Sends the request and returns the body of a 2xx answer.
  async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, GatewayError> {
    let response = request
      .bearer_auth(&self.secret_key)
      .send()
      .await
      .map_err(|e| GatewayError::Unavailable {
        status: None,
        body: e.to_string(),
      })?;
    let status = response.status();
    let body = response.text().await.map_err(|e| GatewayError::Unavailable {
      status: Some(status.as_u16()),
      body: e.to_string(),
    })?;
    debug!(http_status = status.as_u16(), "Gateway responded");
    if !status.is_success() {
      warn!(http_status = status.as_u16(), "Gateway returned an error status");
      return Err(GatewayError::Unavailable {
        status: Some(status.as_u16()),
        body,
      });
    }
    Ok(body)
  }
}

#[async_trait]
impl PaymentGateway for ChapaClient {
  #[instrument(name = "chapa::initiate", skip(self, request), fields(tx_ref = %request.tx_ref))]
  async fn initiate(&self, request: &InitiatePaymentRequest) -> Result<String, GatewayError> {
    let url = format!("{}/transaction/initialize", self.base_url);
    let body = self.send(self.http.post(url).json(request)).await?;
    parse_initiate_response(&body)
  }

  #[instrument(name = "chapa::verify", skip(self))]
  async fn verify(&self, tx_ref: &str) -> Result<VerifiedTransaction, GatewayError> {
    let url = self.verify_url(tx_ref)?;
    let body = self.send(self.http.get(url)).await?;
    parse_verify_response(&body)
  }
}

fn parse_initiate_response(body: &str) -> Result<String, GatewayError> {
  let envelope: Envelope<CheckoutData> = serde_json::from_str(body).map_err(|e| GatewayError::Rejected {
    message: format!("unreadable initiate response: {}", e),
  })?;
  if envelope.status != "success" {
    return Err(GatewayError::Rejected {
      message: message_text(&envelope.message),
    });
  }
  envelope
    .data
    .and_then(|d| d.checkout_url)
    .filter(|url| !url.is_empty())
    .ok_or_else(|| GatewayError::Rejected {
      message: "response carried no checkout URL".to_string(),
    })
}

/// Any readable 2xx answer is a verification result. A non-success envelope
/// never yields a `success` transaction status.
pub fn parse_verify_response(body: &str) -> Result<VerifiedTransaction, GatewayError> {
  let envelope: Envelope<VerifyData> = serde_json::from_str(body).map_err(|e| GatewayError::Rejected {
    message: format!("unreadable verify response: {}", e),
  })?;
  let envelope_ok = envelope.status == "success";
  if !envelope_ok {
    warn!(message = %message_text(&envelope.message), "Gateway could not confirm the transaction");
  }
  let Some(data) = envelope.data else {
    return Ok(VerifiedTransaction {
      status: String::new(),
      gateway_transaction_id: None,
      amount: None,
      currency: None,
    });
  };
  let status = if envelope_ok || data.status != "success" {
    data.status
  } else {
    String::new()
  };
  let gateway_transaction_id = match data.id {
    Some(Value::String(s)) => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    _ => data.reference,
  };
  Ok(VerifiedTransaction {
    status,
    gateway_transaction_id,
    amount: data.amount,
    currency: data.currency,
  })
}
