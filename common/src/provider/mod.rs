mod intasend;
mod mock;

pub use intasend::*;
pub use mock::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::helpers::de_amount;

fn default_currency() -> String {
    "KES".to_string()
}

/// Wallet as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderWallet {
    pub wallet_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, deserialize_with = "de_amount_or_zero")]
    pub current_balance: f64,
    #[serde(default, deserialize_with = "de_amount_or_zero")]
    pub available_balance: f64,
}

/// Live balance of a provider wallet. `available_balance` excludes funds that
/// are still settling and is the figure that gates outgoing transfers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    #[serde(deserialize_with = "de_amount")]
    pub current_balance: f64,
    #[serde(deserialize_with = "de_amount")]
    pub available_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveBalance {
    #[serde(flatten)]
    pub balance: WalletBalance,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// Mobile-money collection into a provider wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRequest {
    pub wallet_id: String,
    pub amount: f64,
    pub phone: String,
    pub email: Option<String>,
}

fn de_amount_or_zero<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(crate::helpers::de_optional_amount(d)?.unwrap_or_default())
}

/// Capability-scoped facade over the external wallet service. Failures are
/// always reported as `ProviderError`, never swallowed.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn create_wallet(
        &self,
        label: &str,
        currency: &str,
        can_disburse: bool,
    ) -> Result<ProviderWallet, ProviderError>;

    async fn get_balance(&self, wallet_id: &str) -> Result<LiveBalance, ProviderError>;

    async fn list_wallets(&self) -> Result<Vec<ProviderWallet>, ProviderError>;

    /// Starts a collection; completion arrives later through a webhook.
    async fn initiate_mobile_collection(
        &self,
        request: &CollectionRequest,
    ) -> Result<Value, ProviderError>;

    /// Returns the provider's response body whatever its shape; callers
    /// classify it with [`crate::TransferOutcome::classify`].
    async fn transfer(
        &self,
        origin_wallet_id: &str,
        destination_wallet_id: &str,
        amount: f64,
        narrative: &str,
    ) -> Result<Value, ProviderError>;

    async fn wallet_transactions(&self, wallet_id: &str) -> Result<Vec<Value>, ProviderError>;
}
