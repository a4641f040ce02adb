use serde_json::Value;

use crate::helpers::amount_from_value;

/// Balance figures a provider response reports for one side of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BalanceSnapshot {
    pub current_balance: Option<f64>,
    pub available_balance: Option<f64>,
}

impl BalanceSnapshot {
    fn from_details(details: Option<&Value>, side: &str) -> Option<Self> {
        let side = details?.get(side)?;
        if !side.is_object() {
            return None;
        }
        Some(BalanceSnapshot {
            current_balance: side.get("current_balance").and_then(amount_from_value),
            available_balance: side.get("available_balance").and_then(amount_from_value),
        })
    }
}

/// Interpretation of an intra-wallet transfer response. The provider signals
/// both outcomes through the body, so the shape decides.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Success {
        tracking_id: Option<String>,
        origin: Option<BalanceSnapshot>,
        destination: Option<BalanceSnapshot>,
    },
    Error {
        message: String,
        origin: Option<BalanceSnapshot>,
    },
    Unrecognized,
}

impl TransferOutcome {
    /// An `error` field wins even when a `details` block is also present.
    pub fn classify(body: &Value) -> Self {
        let Some(fields) = body.as_object() else {
            return TransferOutcome::Unrecognized;
        };
        let details = fields.get("details");

        if let Some(error) = fields.get("error") {
            let message = match error {
                Value::String(s) => s.clone(),
                Value::Null => "Transfer failed".to_string(),
                other => other.to_string(),
            };
            return TransferOutcome::Error {
                message,
                origin: BalanceSnapshot::from_details(details, "origin"),
            };
        }

        if fields.contains_key("tracking_id") || details.is_some() {
            let tracking_id = match fields.get("tracking_id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            };
            return TransferOutcome::Success {
                tracking_id,
                origin: BalanceSnapshot::from_details(details, "origin"),
                destination: BalanceSnapshot::from_details(details, "destination"),
            };
        }

        TransferOutcome::Unrecognized
    }

    /// Available balance the provider reported for the origin when it
    /// rejected a transfer for more than that amount.
    pub fn exceeded_available(&self, requested: f64) -> Option<f64> {
        match self {
            TransferOutcome::Error {
                origin: Some(BalanceSnapshot {
                    available_balance: Some(available),
                    ..
                }),
                ..
            } if requested > *available => Some(*available),
            _ => None,
        }
    }
}
