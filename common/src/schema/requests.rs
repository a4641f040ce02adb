use serde::Deserialize;

use crate::error::WalletError;
use crate::helpers::de_optional_amount;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWalletRequest {
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepositRequest {
    pub student_id: Option<String>,
    #[serde(default, deserialize_with = "de_optional_amount")]
    pub amount: Option<f64>,
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferRequest {
    pub from_student: Option<String>,
    pub to_student: Option<String>,
    #[serde(default, deserialize_with = "de_optional_amount")]
    pub amount: Option<f64>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `Ok(None)` when the amount is missing, an error when it is out of range.
fn positive(amount: Option<f64>) -> Result<Option<f64>, WalletError> {
    match amount {
        Some(a) if !(a.is_finite() && a > 0.0) => Err(WalletError::Validation(
            "amount must be greater than 0".to_string(),
        )),
        other => Ok(other),
    }
}

pub(crate) struct ValidCreateWallet<'a> {
    pub student_id: &'a str,
    pub student_name: &'a str,
}

pub(crate) struct ValidDeposit<'a> {
    pub student_id: &'a str,
    pub amount: f64,
    pub phone: &'a str,
}

pub(crate) struct ValidTransfer<'a> {
    pub from_student: &'a str,
    pub to_student: &'a str,
    pub amount: f64,
}

impl CreateWalletRequest {
    pub(crate) fn validate(&self) -> Result<ValidCreateWallet<'_>, WalletError> {
        match (present(&self.student_id), present(&self.student_name)) {
            (Some(student_id), Some(student_name)) => Ok(ValidCreateWallet {
                student_id,
                student_name,
            }),
            _ => Err(WalletError::Validation(
                "student_id and student_name are required".to_string(),
            )),
        }
    }
}

impl DepositRequest {
    pub(crate) fn validate(&self) -> Result<ValidDeposit<'_>, WalletError> {
        match (
            present(&self.student_id),
            positive(self.amount)?,
            present(&self.phone),
        ) {
            (Some(student_id), Some(amount), Some(phone)) => Ok(ValidDeposit {
                student_id,
                amount,
                phone,
            }),
            _ => Err(WalletError::Validation(
                "student_id, amount, and phone are required".to_string(),
            )),
        }
    }
}

impl TransferRequest {
    pub(crate) fn validate(&self) -> Result<ValidTransfer<'_>, WalletError> {
        match (
            present(&self.from_student),
            present(&self.to_student),
            positive(self.amount)?,
        ) {
            (Some(from_student), Some(to_student), Some(amount)) => Ok(ValidTransfer {
                from_student,
                to_student,
                amount,
            }),
            _ => Err(WalletError::Validation(
                "from_student, to_student, and amount are required".to_string(),
            )),
        }
    }
}
