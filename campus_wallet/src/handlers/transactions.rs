use actix_web::{Error, HttpResponse, get, web};
use serde::Deserialize;
use serde_json::json;

use super::error::wallet_error;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
struct TransactionQuery {
    #[serde(default)]
    limit: Option<String>,
}

impl TransactionQuery {
    /// Unparseable or negative limits fall back to the default.
    fn limit(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 0)
            .unwrap_or(DEFAULT_LIMIT)
    }
}

#[get("/transactions")]
pub async fn get_transactions(
    query: web::Query<TransactionQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let transactions = app_state
        .service
        .list_transactions(query.limit())
        .await
        .map_err(|e| wallet_error("Failed to get transactions", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

#[get("/transactions/{student_id}")]
pub async fn get_student_transactions(
    path: web::Path<String>,
    query: web::Query<TransactionQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let student_id = path.into_inner();

    let transactions = app_state
        .service
        .student_transactions(&student_id, query.limit())
        .await
        .map_err(|e| wallet_error(&format!("Failed to get transactions for {student_id}"), e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "student_id": student_id,
        "count": transactions.len(),
        "transactions": transactions,
    })))
}
