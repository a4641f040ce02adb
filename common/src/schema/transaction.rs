use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionType {
    WalletCreated,
    Deposit,
    Transfer,
    PaymentComplete,
    PaymentFailed,
    Topup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Maps a free-form provider state (`COMPLETE`, `PROCESSING`, `FAILED`...)
    /// onto a local status. Unknown or absent states count as completed.
    pub fn from_provider_state(state: Option<&str>) -> Self {
        match state.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("failed" | "failure" | "error" | "cancelled" | "canceled") => {
                TransactionStatus::Failed
            }
            Some("pending" | "processing" | "queued" | "initiated") => TransactionStatus::Pending,
            _ => TransactionStatus::Completed,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!(
                "Transaction status must be either 'pending', 'completed' or 'failed', got '{other}'"
            )),
        }
    }
}

/// Audit payload stored with a transaction. Text that no longer parses as
/// JSON is handed back verbatim instead of failing the read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metadata {
    Structured(Value),
    Raw(String),
}

impl Metadata {
    pub fn from_stored(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Metadata::Structured(value),
            Err(e) => {
                log::warn!("Stored transaction metadata is not valid JSON: {}", e);
                Metadata::Raw(text)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub transaction_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub student_id: Option<String>,
    pub from_student: Option<String>,
    pub to_student: Option<String>,
    pub amount: f64,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Raw `transactions` row; metadata is still undecoded text.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TransactionRow {
    pub id: i64,
    pub transaction_id: Option<String>,
    #[sqlx(rename = "type")]
    pub kind: TransactionType,
    pub student_id: Option<String>,
    pub from_student: Option<String>,
    pub to_student: Option<String>,
    pub amount: f64,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub metadata: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: row.id,
            transaction_id: row.transaction_id,
            kind: row.kind,
            student_id: row.student_id,
            from_student: row.from_student,
            to_student: row.to_student,
            amount: row.amount,
            status: row.status,
            description: row.description,
            metadata: row.metadata.map(Metadata::from_stored),
            timestamp: row.timestamp,
        }
    }
}

/// Transaction about to be appended. Single-party events set `student_id`,
/// transfers set both `from_student` and `to_student`.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: TransactionType,
    pub amount: f64,
    pub status: TransactionStatus,
    pub student_id: Option<String>,
    pub from_student: Option<String>,
    pub to_student: Option<String>,
    pub description: Option<String>,
    pub transaction_id: Option<String>,
    pub metadata: Option<Value>,
}

impl NewTransaction {
    pub fn new(kind: TransactionType, amount: f64, status: TransactionStatus) -> Self {
        NewTransaction {
            kind,
            amount,
            status,
            student_id: None,
            from_student: None,
            to_student: None,
            description: None,
            transaction_id: None,
            metadata: None,
        }
    }

    pub fn student(mut self, student_id: &str) -> Self {
        self.student_id = Some(student_id.to_string());
        self
    }

    pub fn parties(mut self, from_student: &str, to_student: &str) -> Self {
        self.student_id = None;
        self.from_student = Some(from_student.to_string());
        self.to_student = Some(to_student.to_string());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn transaction_id(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
