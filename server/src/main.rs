// server/src/main.rs

use hasura_actions::config::{AppConfig, LogFormat};
use hasura_actions::services::{ChapaClient, HasuraClient};
use hasura_actions::state::AppState;
use hasura_actions::web::configure_app_routes;

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Text => builder.init(),
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      // No subscriber yet; the config decides the log format.
      init_tracing(LogFormat::Text);
      tracing::error!(error = %e, "Failed to load application configuration");
      return Err(anyhow::Error::new(e).context("Failed to load application configuration"));
    }
  };
  init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "Starting Hasura actions server...");

  let hasura = HasuraClient::new(
    app_config.hasura_graphql_url.clone(),
    app_config.hasura_admin_secret.clone(),
    app_config.http_client_timeout,
  )
  .context("Failed to build the data service client")?;
  let chapa = ChapaClient::new(
    app_config.chapa_api_base_url.clone(),
    app_config.chapa_secret_key.clone(),
    app_config.http_client_timeout,
  )
  .context("Failed to build the payment gateway client")?;

  let app_state = AppState::new(app_config.clone(), Arc::new(hasura), Arc::new(chapa));
  tracing::info!("Payment pipelines registered.");

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)
  .with_context(|| format!("Failed to bind {}", server_address))?
  .run()
  .await
  .context("HTTP server stopped with an error")
}
