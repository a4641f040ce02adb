use actix_web::{HttpResponse, Responder, get, post, web};
use serde_json::{Value, json};

use crate::state::AppState;

#[get("/webhook/intasend")]
pub async fn webhook_status() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "online",
        "message": "IntaSend webhook endpoint is ready",
        "endpoint": "/webhook/intasend",
        "methods": ["POST"],
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

/// Always answers 200: a non-200 makes the provider redeliver, and a
/// redelivery cannot fix anything that failed here.
#[post("/webhook/intasend")]
pub async fn intasend_webhook(body: web::Bytes, app_state: web::Data<AppState>) -> impl Responder {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Null) => None,
        Ok(payload) => Some(payload),
        Err(_) if body.iter().all(u8::is_ascii_whitespace) => None,
        Err(e) => {
            log::error!("Invalid webhook body: {}", e);
            return HttpResponse::Ok().json(json!({
                "status": "error",
                "message": format!("Invalid JSON payload: {e}"),
            }));
        }
    };

    let Some(payload) = payload else {
        log::warn!("Webhook received without data");
        return HttpResponse::Ok().json(json!({
            "status": "error",
            "message": "No data received",
        }));
    };

    log::info!("IntaSend webhook received: {}", payload);
    let report = app_state.webhooks.dispatch(&payload).await;
    for error in &report.errors {
        log::error!("Webhook {:?}: {}", report.event, error);
    }

    HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Webhook received",
        "event": report.event,
    }))
}
