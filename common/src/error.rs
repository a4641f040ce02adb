use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider responded with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected provider response: {0}")]
    Decode(String),

    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientFunds,
    Provider,
    Store,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("{0}")]
    Validation(String),

    #[error("Wallet already exists for student {0}")]
    DuplicateWallet(String),

    #[error("No wallet found for student {0}")]
    WalletNotFound(String),

    /// `details` holds the provider body when the provider itself refused
    /// the transfer.
    #[error(
        "Insufficient balance. Available: {available} {currency}, Required: {requested} {currency}"
    )]
    InsufficientFunds {
        available: f64,
        requested: f64,
        currency: String,
        details: Option<Value>,
    },

    #[error("Unable to fetch sender wallet balance: {0}")]
    BalanceUnavailable(ProviderError),

    #[error("{message}")]
    TransferRejected { message: String, details: Value },

    #[error("Transfer failed")]
    TransferFailed { details: Value },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WalletError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateKey(key) => WalletError::Validation(format!("Duplicate key: {key}")),
            other => WalletError::Store(other),
        }
    }
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::Validation(_)
            | WalletError::DuplicateWallet(_)
            | WalletError::TransferRejected { .. } => ErrorKind::Validation,
            WalletError::WalletNotFound(_) => ErrorKind::NotFound,
            WalletError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            WalletError::BalanceUnavailable(_)
            | WalletError::TransferFailed { .. }
            | WalletError::Provider(_) => ErrorKind::Provider,
            WalletError::Store(_) => ErrorKind::Store,
        }
    }

    /// Provider payload attached to the error, if any.
    pub fn details(&self) -> Option<&Value> {
        match self {
            WalletError::TransferRejected { details, .. } | WalletError::TransferFailed { details } => {
                Some(details)
            }
            WalletError::InsufficientFunds { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}
