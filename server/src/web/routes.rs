// server/src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{callback_handlers, payment_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Mounted at the root: Hasura action handlers are configured with full URLs.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/health", web::get().to(health_check_handler))
    // Hasura action
    .route(
      "/initiate_chapa_payment",
      web::post().to(payment_handlers::initiate_chapa_payment_handler),
    )
    // Chapa calls back with GET; some setups POST
    .service(
      web::resource("/chapa/callback")
        .route(web::get().to(callback_handlers::chapa_callback_handler))
        .route(web::post().to(callback_handlers::chapa_callback_handler)),
    );
}
