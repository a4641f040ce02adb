use actix_web::{Error, HttpResponse, error::InternalError, http::StatusCode};
use common::{ErrorKind, WalletError};
use serde_json::json;

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InsufficientFunds => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Provider | ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Turns a domain error into `{ "error": ..., "details"?: ... }` with the
/// matching status code.
pub(crate) fn wallet_error(context: &str, err: WalletError) -> Error {
    let status = status_for(err.kind());
    if status.is_server_error() {
        log::error!("{}: {}", context, err);
    } else {
        log::warn!("{}: {}", context, err);
    }

    let mut body = json!({ "error": err.to_string() });
    if let Some(details) = err.details() {
        body["details"] = details.clone();
    }
    if let WalletError::InsufficientFunds {
        available,
        requested,
        ..
    } = &err
    {
        body["available_balance"] = json!(available);
        body["required_amount"] = json!(requested);
    }
    InternalError::from_response(err, HttpResponse::build(status).json(body)).into()
}
