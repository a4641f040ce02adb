use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Local mirror of a student's provider wallet. `balance` is a cache of the
/// provider's last known current balance, never a source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: i64,
    pub student_id: String,
    pub student_name: String,
    pub wallet_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub balance: f64,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct NewWallet {
    pub student_id: String,
    pub student_name: String,
    pub wallet_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl NewWallet {
    pub fn new(student_id: &str, student_name: &str, wallet_id: &str) -> Self {
        NewWallet {
            student_id: student_id.to_string(),
            student_name: student_name.to_string(),
            wallet_id: wallet_id.to_string(),
            phone: None,
            email: None,
        }
    }

    pub fn with_contact(mut self, phone: Option<String>, email: Option<String>) -> Self {
        self.phone = phone;
        self.email = email;
        self
    }
}
