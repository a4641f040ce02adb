mod error;
mod payments;
mod transactions;
mod wallets;
mod webhook;

use actix_web::{HttpResponse, Responder, get};
use serde_json::json;

pub use payments::*;
pub use transactions::*;
pub use wallets::*;
pub use webhook::*;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Welcome to Campus Wallet Service!")
}

#[get("/api")]
pub async fn api_info() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "online",
        "service": "University Wallet System",
        "endpoints": {
            "webhook": "/webhook/intasend",
            "health": "/health",
            "create_wallet": "/create-wallet",
            "deposit": "/deposit",
            "balance": "/balance/{student_id}",
            "transfer": "/transfer",
            "wallets": "/wallets",
            "transactions": "/transactions",
            "student_transactions": "/transactions/{student_id}",
        },
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}
