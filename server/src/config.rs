// server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

const DEFAULT_HASURA_URL: &str = "http://graphql-engine:8080/v1/graphql";
const DEFAULT_CHAPA_BASE_URL: &str = "https://api.chapa.co/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Text,
  Json,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,

  pub hasura_graphql_url: String,
  pub hasura_admin_secret: String,

  pub chapa_secret_key: String,
  pub chapa_api_base_url: String,
  /// Where Chapa calls us back. Server-controlled, never taken from a client.
  pub chapa_callback_url: String,
  pub chapa_payment_title: String,

  /// Per-request timeout for the reqwest clients.
  pub http_client_timeout: Duration,
  /// Deadline for a whole initiation run.
  pub initiate_timeout: Duration,
  /// Deadline for a whole callback run.
  pub callback_timeout: Duration,

  pub log_format: LogFormat,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("hasura_graphql_url", &self.hasura_graphql_url)
      .field("hasura_admin_secret", &"[REDACTED]")
      .field("chapa_secret_key", &"[REDACTED]")
      .field("chapa_api_base_url", &self.chapa_api_base_url)
      .field("chapa_callback_url", &self.chapa_callback_url)
      .field("chapa_payment_title", &self.chapa_payment_title)
      .field("http_client_timeout", &self.http_client_timeout)
      .field("initiate_timeout", &self.initiate_timeout)
      .field("callback_timeout", &self.callback_timeout)
      .field("log_format", &self.log_format)
      .finish()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the config from any variable source. `from_env` passes the
  /// process environment; tests pass a map.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let get_secs = |var_name: &str, default: u64| -> Result<Duration> {
      match get_env(var_name) {
        Ok(raw) => raw
          .parse::<u64>()
          .map(Duration::from_secs)
          .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
        Err(_) => Ok(Duration::from_secs(default)),
      }
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .or_else(|_| get_env("PORT"))
      .unwrap_or_else(|_| "8082".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

    let hasura_graphql_url = get_env("HASURA_GRAPHQL_URL").unwrap_or_else(|_| DEFAULT_HASURA_URL.to_string());
    let hasura_admin_secret = get_env("HASURA_ADMIN_SECRET")?;

    let chapa_secret_key = get_env("CHAPA_SECRET_KEY")?;
    let chapa_api_base_url = get_env("CHAPA_API_BASE_URL")
      .unwrap_or_else(|_| DEFAULT_CHAPA_BASE_URL.to_string())
      .trim_end_matches('/')
      .to_string();
    let chapa_callback_url = get_env("CHAPA_CALLBACK_URL")?;
    reqwest::Url::parse(&chapa_callback_url)
      .map_err(|e| AppError::Config(format!("Invalid CHAPA_CALLBACK_URL: {}", e)))?;
    let chapa_payment_title = get_env("CHAPA_PAYMENT_TITLE").unwrap_or_else(|_| "Food Recipes Order".to_string());

    let http_client_timeout = get_secs("HTTP_CLIENT_TIMEOUT_SECS", 10)?;
    let initiate_timeout = get_secs("INITIATE_TIMEOUT_SECS", 15)?;
    let callback_timeout = get_secs("CALLBACK_TIMEOUT_SECS", 20)?;

    let log_format = match get_env("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
      Ok("json") => LogFormat::Json,
      Ok("text") | Err(_) => LogFormat::Text,
      Ok(other) => return Err(AppError::Config(format!("Invalid LOG_FORMAT: {}", other))),
    };

    Ok(Self {
      server_host,
      server_port,
      hasura_graphql_url,
      hasura_admin_secret,
      chapa_secret_key,
      chapa_api_base_url,
      chapa_callback_url,
      chapa_payment_title,
      http_client_timeout,
      initiate_timeout,
      callback_timeout,
      log_format,
    })
  }
}
