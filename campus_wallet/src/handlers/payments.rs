use actix_web::{Error, HttpResponse, post, web};
use common::{DepositRequest, TransferRequest};
use serde_json::json;

use super::error::wallet_error;
use crate::state::AppState;

#[post("/deposit")]
pub async fn deposit(
    body: web::Json<DepositRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let deposit = app_state
        .service
        .deposit(&body)
        .await
        .map_err(|e| wallet_error("Failed to process deposit", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "M-Pesa STK push sent. Check your phone to complete payment.",
        "student_id": deposit.student_id,
        "amount": deposit.amount,
        "phone": deposit.phone,
        "result": deposit.result,
    })))
}

#[post("/transfer")]
pub async fn transfer(
    body: web::Json<TransferRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let receipt = app_state
        .service
        .transfer(&body)
        .await
        .map_err(|e| wallet_error("Failed to process transfer", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!(
            "Transfer successful: {} {} from {} to {}",
            receipt.amount, receipt.currency, receipt.from_student, receipt.to_student
        ),
        "from_student": receipt.from_student,
        "to_student": receipt.to_student,
        "amount": receipt.amount,
        "currency": receipt.currency,
        "tracking_id": receipt.tracking_id,
        "details": receipt.details,
    })))
}
