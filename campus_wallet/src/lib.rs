pub mod config;
pub mod handlers;
pub mod state;

use actix_cors::Cors;
use actix_web::{HttpResponse, error::InternalError, web};
use serde_json::json;

/// Browser clients on any origin may call the API.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

/// Registers every route of the service. Shared by the server and the
/// integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected request body: {}", err);
        let body = json!({ "error": format!("Invalid request body: {err}") });
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    });

    let query_config = web::QueryConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected query string: {}", err);
        let body = json!({ "error": format!("Invalid query string: {err}") });
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    });

    cfg.app_data(json_config)
        .app_data(query_config)
        .service(handlers::index)
        .service(handlers::api_info)
        .service(handlers::health)
        .service(handlers::create_wallet)
        .service(handlers::deposit)
        .service(handlers::get_balance)
        .service(handlers::transfer)
        .service(handlers::get_wallets)
        .service(handlers::get_transactions)
        .service(handlers::get_student_transactions)
        .service(handlers::webhook_status)
        .service(handlers::intasend_webhook);
}
