//! In-process provider double for tests and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::{CollectionRequest, LiveBalance, ProviderWallet, WalletBalance, WalletProvider};
use crate::error::ProviderError;

/// Provider double with scripted balances, call counters and injectable
/// failures. Transfers move funds between the scripted balances unless a
/// canned response is queued.
#[derive(Default)]
pub struct MockProvider {
    balances: Mutex<HashMap<String, WalletBalance>>,
    failing_balances: Mutex<HashSet<String>>,
    transfer_responses: Mutex<Vec<Value>>,
    collections: Mutex<Vec<CollectionRequest>>,
    fail_create: Mutex<bool>,
    create_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    collection_calls: AtomicUsize,
    transfer_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_balance(&self, wallet_id: &str, current: f64, available: f64) {
        self.balances.lock().await.insert(
            wallet_id.to_string(),
            WalletBalance {
                current_balance: current,
                available_balance: available,
            },
        );
    }

    pub async fn balance_of(&self, wallet_id: &str) -> Option<WalletBalance> {
        self.balances.lock().await.get(wallet_id).copied()
    }

    /// Makes every balance fetch for `wallet_id` fail.
    pub async fn fail_balance_for(&self, wallet_id: &str) {
        self.failing_balances
            .lock()
            .await
            .insert(wallet_id.to_string());
    }

    pub async fn set_fail_on_create(&self, fail: bool) {
        *self.fail_create.lock().await = fail;
    }

    /// Queues a raw body for the next `transfer` call.
    pub async fn push_transfer_response(&self, response: Value) {
        self.transfer_responses.lock().await.push(response);
    }

    pub async fn collections(&self) -> Vec<CollectionRequest> {
        self.collections.lock().await.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn collection_calls(&self) -> usize {
        self.collection_calls.load(Ordering::SeqCst)
    }

    pub fn transfer_calls(&self) -> usize {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    fn unavailable(wallet_id: &str) -> ProviderError {
        ProviderError::Api {
            status: 503,
            body: format!("balance for {wallet_id} unavailable"),
        }
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn create_wallet(
        &self,
        label: &str,
        currency: &str,
        _can_disburse: bool,
    ) -> Result<ProviderWallet, ProviderError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_create.lock().await {
            return Err(ProviderError::Api {
                status: 400,
                body: "wallet creation rejected".to_string(),
            });
        }
        let wallet_id = format!("MOCK{n:04}");
        self.set_balance(&wallet_id, 0.0, 0.0).await;
        Ok(ProviderWallet {
            wallet_id,
            label: Some(label.to_string()),
            currency: currency.to_string(),
            current_balance: 0.0,
            available_balance: 0.0,
        })
    }

    async fn get_balance(&self, wallet_id: &str) -> Result<LiveBalance, ProviderError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_balances.lock().await.contains(wallet_id) {
            return Err(Self::unavailable(wallet_id));
        }
        let balance = self.balance_of(wallet_id).await.ok_or(ProviderError::Api {
            status: 404,
            body: format!("wallet {wallet_id} not found"),
        })?;
        Ok(LiveBalance {
            balance,
            currency: "KES".to_string(),
        })
    }

    async fn list_wallets(&self) -> Result<Vec<ProviderWallet>, ProviderError> {
        let balances = self.balances.lock().await;
        let mut wallets: Vec<_> = balances
            .iter()
            .map(|(wallet_id, balance)| ProviderWallet {
                wallet_id: wallet_id.clone(),
                label: None,
                currency: "KES".to_string(),
                current_balance: balance.current_balance,
                available_balance: balance.available_balance,
            })
            .collect();
        wallets.sort_by(|a, b| a.wallet_id.cmp(&b.wallet_id));
        Ok(wallets)
    }

    async fn initiate_mobile_collection(
        &self,
        request: &CollectionRequest,
    ) -> Result<Value, ProviderError> {
        let n = self.collection_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.collections.lock().await.push(request.clone());
        Ok(json!({
            "invoice": { "invoice_id": format!("INV{n:04}"), "state": "PENDING" },
            "customer": { "phone_number": request.phone },
        }))
    }

    async fn transfer(
        &self,
        origin_wallet_id: &str,
        destination_wallet_id: &str,
        amount: f64,
        narrative: &str,
    ) -> Result<Value, ProviderError> {
        let n = self.transfer_calls.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut queued = self.transfer_responses.lock().await;
            if !queued.is_empty() {
                return Ok(queued.remove(0));
            }
        }

        let mut balances = self.balances.lock().await;
        let origin = balances.get(origin_wallet_id).copied().unwrap_or(WalletBalance {
            current_balance: 0.0,
            available_balance: 0.0,
        });
        if amount > origin.available_balance {
            return Ok(json!({
                "error": "Insufficient balance",
                "details": { "origin": {
                    "current_balance": origin.current_balance,
                    "available_balance": origin.available_balance,
                } },
            }));
        }
        let origin = WalletBalance {
            current_balance: origin.current_balance - amount,
            available_balance: origin.available_balance - amount,
        };
        let destination = balances
            .get(destination_wallet_id)
            .copied()
            .map(|b| WalletBalance {
                current_balance: b.current_balance + amount,
                available_balance: b.available_balance + amount,
            })
            .unwrap_or(WalletBalance {
                current_balance: amount,
                available_balance: amount,
            });
        balances.insert(origin_wallet_id.to_string(), origin);
        balances.insert(destination_wallet_id.to_string(), destination);

        Ok(json!({
            "tracking_id": format!("TRK{n:04}"),
            "narrative": narrative,
            "details": {
                "origin": origin,
                "destination": destination,
            },
        }))
    }

    async fn wallet_transactions(&self, wallet_id: &str) -> Result<Vec<Value>, ProviderError> {
        if self.balance_of(wallet_id).await.is_none() {
            return Err(ProviderError::Api {
                status: 404,
                body: format!("wallet {wallet_id} not found"),
            });
        }
        Ok(Vec::new())
    }
}
