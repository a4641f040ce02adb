use actix_web::{Error, HttpResponse, get, post, web};
use common::CreateWalletRequest;
use serde_json::json;

use super::error::wallet_error;
use crate::state::AppState;

#[post("/create-wallet")]
pub async fn create_wallet(
    body: web::Json<CreateWalletRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let created = app_state
        .service
        .create_wallet(&body)
        .await
        .map_err(|e| wallet_error("Failed to create wallet", e))?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": format!("Wallet created successfully for {}", created.student_name),
        "student_id": created.student_id,
        "student_name": created.student_name,
        "wallet_id": created.wallet_id,
        "balance": created.balance,
    })))
}

#[get("/balance/{student_id}")]
pub async fn get_balance(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let student_id = path.into_inner();

    let view = app_state
        .service
        .balance(&student_id)
        .await
        .map_err(|e| wallet_error(&format!("Failed to fetch balance for {student_id}"), e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "student_id": view.student_id,
        "student_name": view.student_name,
        "balance": view.balance,
        "available_balance": view.available_balance,
        "currency": view.currency,
        "wallet_id": view.wallet_id,
    })))
}

#[get("/wallets")]
pub async fn get_wallets(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let wallets = app_state
        .service
        .list_wallets()
        .await
        .map_err(|e| wallet_error("Failed to get wallets", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": wallets.len(),
        "wallets": wallets,
    })))
}
