use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::db::Database;
use crate::error::WalletError;
use crate::provider::{CollectionRequest, WalletProvider};
use crate::schema::{
    CreateWalletRequest, DepositRequest, NewTransaction, NewWallet, Transaction,
    TransactionStatus, TransactionType, TransferRequest, Wallet,
};
use crate::transfer::{BalanceSnapshot, TransferOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct WalletCreated {
    pub student_id: String,
    pub student_name: String,
    pub wallet_id: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepositInitiated {
    pub student_id: String,
    pub amount: f64,
    pub phone: String,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub student_id: String,
    pub student_name: String,
    pub wallet_id: String,
    pub balance: f64,
    pub available_balance: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub from_student: String,
    pub to_student: String,
    pub amount: f64,
    pub currency: String,
    pub tracking_id: String,
    pub details: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Wallet operations over the local store and the provider. Validation and
/// pre-condition checks run before the provider is called; local writes made
/// after a provider success are logged on failure and never undo the result.
#[derive(Clone)]
pub struct WalletService {
    db: Database,
    provider: Arc<dyn WalletProvider>,
    currency: String,
}

impl WalletService {
    pub fn new(db: Database, provider: Arc<dyn WalletProvider>, currency: impl Into<String>) -> Self {
        Self {
            db,
            provider,
            currency: currency.into(),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }

    async fn wallet_for(&self, student_id: &str) -> Result<Wallet, WalletError> {
        self.db
            .get_wallet_by_student_id(student_id)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(student_id.to_string()))
    }

    async fn record(&self, transaction: NewTransaction) {
        if let Err(e) = self.db.add_transaction(&transaction).await {
            log::error!(
                "Failed to record {:?} transaction after provider call: {}",
                transaction.kind,
                e
            );
        }
    }

    async fn cache_balance(&self, student_id: &str, balance: f64) {
        match self.db.update_wallet_balance(student_id, balance).await {
            Ok(true) => log::debug!("Cached balance {} for {}", balance, student_id),
            Ok(false) => log::warn!("No local wallet to cache balance for {}", student_id),
            Err(e) => log::error!("Failed to cache balance for {}: {}", student_id, e),
        }
    }

    pub async fn create_wallet(
        &self,
        request: &CreateWalletRequest,
    ) -> Result<WalletCreated, WalletError> {
        let valid = request.validate()?;

        if self
            .db
            .get_wallet_by_student_id(valid.student_id)
            .await?
            .is_some()
        {
            log::warn!("Wallet already exists for student {}", valid.student_id);
            return Err(WalletError::DuplicateWallet(valid.student_id.to_string()));
        }

        let provider_wallet = self
            .provider
            .create_wallet(valid.student_id, &self.currency, true)
            .await?;

        let wallet = NewWallet::new(valid.student_id, valid.student_name, &provider_wallet.wallet_id)
            .with_contact(request.phone.clone(), request.email.clone());
        self.db.add_wallet(&wallet).await?;

        self.record(
            NewTransaction::new(
                TransactionType::WalletCreated,
                0.0,
                TransactionStatus::Completed,
            )
            .student(valid.student_id)
            .description(format!("Wallet created for {}", valid.student_name)),
        )
        .await;

        log::info!(
            "Wallet {} created for student {}",
            provider_wallet.wallet_id,
            valid.student_id
        );
        Ok(WalletCreated {
            student_id: valid.student_id.to_string(),
            student_name: valid.student_name.to_string(),
            wallet_id: provider_wallet.wallet_id,
            balance: provider_wallet.current_balance,
        })
    }

    /// Sends a mobile-money collection request. The pending transaction is
    /// recorded as soon as the request is accepted; settlement arrives later
    /// through the webhook.
    pub async fn deposit(&self, request: &DepositRequest) -> Result<DepositInitiated, WalletError> {
        let valid = request.validate()?;
        let wallet = self.wallet_for(valid.student_id).await?;

        let result = self
            .provider
            .initiate_mobile_collection(&CollectionRequest {
                wallet_id: wallet.wallet_id.clone(),
                amount: valid.amount,
                phone: valid.phone.to_string(),
                email: request.email.clone().or_else(|| wallet.email.clone()),
            })
            .await?;

        self.record(
            NewTransaction::new(TransactionType::Deposit, valid.amount, TransactionStatus::Pending)
                .student(valid.student_id)
                .description(format!("M-Pesa deposit to {}", wallet.student_name))
                .metadata(json!({ "phone": valid.phone, "method": "M-PESA" })),
        )
        .await;

        log::info!(
            "Deposit of {} requested for student {}",
            valid.amount,
            valid.student_id
        );
        Ok(DepositInitiated {
            student_id: valid.student_id.to_string(),
            amount: valid.amount,
            phone: valid.phone.to_string(),
            result,
        })
    }

    /// Live balance from the provider; the cache is refreshed on the way.
    pub async fn balance(&self, student_id: &str) -> Result<BalanceView, WalletError> {
        let wallet = self.wallet_for(student_id).await?;
        let live = self.provider.get_balance(&wallet.wallet_id).await?;
        self.cache_balance(student_id, live.balance.current_balance)
            .await;

        Ok(BalanceView {
            student_id: wallet.student_id,
            student_name: wallet.student_name,
            wallet_id: wallet.wallet_id,
            balance: live.balance.current_balance,
            available_balance: live.balance.available_balance,
            currency: live.currency,
        })
    }

    /// Moves funds between two students' wallets.
    ///
    /// The available-balance check is optimistic: concurrent transfers from
    /// the same wallet can all pass it, and the provider remains the final
    /// authority. A provider rejection that reveals the origin's true
    /// available balance is reported as `InsufficientFunds`.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, WalletError> {
        let valid = request.validate()?;
        let from_wallet = self.wallet_for(valid.from_student).await?;
        let to_wallet = self.wallet_for(valid.to_student).await?;

        let sender_balance = self
            .provider
            .get_balance(&from_wallet.wallet_id)
            .await
            .map_err(WalletError::BalanceUnavailable)?;

        let available = sender_balance.balance.available_balance;
        if valid.amount > available {
            log::warn!(
                "Transfer of {} from {} refused: only {} available",
                valid.amount,
                valid.from_student,
                available
            );
            return Err(WalletError::InsufficientFunds {
                available,
                requested: valid.amount,
                currency: self.currency.clone(),
                details: None,
            });
        }

        let response = self
            .provider
            .transfer(
                &from_wallet.wallet_id,
                &to_wallet.wallet_id,
                valid.amount,
                &format!(
                    "Transfer from {} to {}",
                    from_wallet.student_name, to_wallet.student_name
                ),
            )
            .await?;

        match TransferOutcome::classify(&response) {
            outcome @ TransferOutcome::Error { .. } => {
                if let Some(available) = outcome.exceeded_available(valid.amount) {
                    log::warn!(
                        "Provider rejected transfer from {}: {} available, {} requested",
                        valid.from_student,
                        available,
                        valid.amount
                    );
                    return Err(WalletError::InsufficientFunds {
                        available,
                        requested: valid.amount,
                        currency: self.currency.clone(),
                        details: Some(response),
                    });
                }
                let message = match outcome {
                    TransferOutcome::Error { message, .. } => message,
                    _ => "Transfer failed".to_string(),
                };
                log::warn!("Provider rejected transfer from {}: {}", valid.from_student, message);
                Err(WalletError::TransferRejected {
                    message,
                    details: response,
                })
            }
            TransferOutcome::Success {
                tracking_id,
                origin,
                destination,
            } => {
                let tracking_id = tracking_id.unwrap_or_else(|| "N/A".to_string());

                self.record(
                    NewTransaction::new(
                        TransactionType::Transfer,
                        valid.amount,
                        TransactionStatus::Completed,
                    )
                    .parties(valid.from_student, valid.to_student)
                    .description(format!(
                        "Transfer: {} -> {}",
                        from_wallet.student_name, to_wallet.student_name
                    ))
                    .transaction_id(Some(tracking_id.clone()))
                    .metadata(response.clone()),
                )
                .await;

                self.cache_snapshot(valid.from_student, origin).await;
                self.cache_snapshot(valid.to_student, destination).await;

                log::info!(
                    "Transferred {} from {} to {} (tracking id {})",
                    valid.amount,
                    valid.from_student,
                    valid.to_student,
                    tracking_id
                );
                Ok(TransferReceipt {
                    from_student: valid.from_student.to_string(),
                    to_student: valid.to_student.to_string(),
                    amount: valid.amount,
                    currency: self.currency.clone(),
                    tracking_id,
                    details: response,
                })
            }
            TransferOutcome::Unrecognized => {
                log::error!("Unrecognized transfer response: {}", response);
                Err(WalletError::TransferFailed { details: response })
            }
        }
    }

    /// A side without a reported current balance keeps its cached figure.
    async fn cache_snapshot(&self, student_id: &str, snapshot: Option<BalanceSnapshot>) {
        if let Some(current) = snapshot.and_then(|s| s.current_balance) {
            self.cache_balance(student_id, current).await;
        }
    }

    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, WalletError> {
        Ok(self.db.list_wallets().await?)
    }

    pub async fn list_transactions(&self, limit: i64) -> Result<Vec<Transaction>, WalletError> {
        Ok(self.db.list_transactions(limit).await?)
    }

    pub async fn student_transactions(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<Transaction>, WalletError> {
        self.wallet_for(student_id).await?;
        Ok(self.db.list_transactions_for_student(student_id, limit).await?)
    }

    /// Provider-side history for a student's wallet.
    pub async fn provider_history(&self, student_id: &str) -> Result<Vec<Value>, WalletError> {
        let wallet = self.wallet_for(student_id).await?;
        Ok(self.provider.wallet_transactions(&wallet.wallet_id).await?)
    }

    /// Refreshes every cached balance from the provider. A wallet whose fetch
    /// fails is counted and skipped.
    pub async fn sync_balances(&self) -> Result<SyncReport, WalletError> {
        let wallets = self.db.list_wallets().await?;
        let mut report = SyncReport::default();

        for wallet in wallets {
            let live = match self.provider.get_balance(&wallet.wallet_id).await {
                Ok(live) => live,
                Err(e) => {
                    log::error!(
                        "Failed to fetch balance for {} ({}): {}",
                        wallet.student_id,
                        wallet.wallet_id,
                        e
                    );
                    report.failed += 1;
                    continue;
                }
            };

            let new_balance = live.balance.current_balance;
            if let Err(e) = self
                .db
                .update_wallet_balance(&wallet.student_id, new_balance)
                .await
            {
                log::error!("Failed to store balance for {}: {}", wallet.student_id, e);
                report.failed += 1;
                continue;
            }

            if new_balance != wallet.balance {
                log::info!(
                    "{} ({}): {} -> {}",
                    wallet.student_name,
                    wallet.student_id,
                    wallet.balance,
                    new_balance
                );
                report.updated += 1;
            } else {
                report.unchanged += 1;
            }
        }

        log::info!(
            "Balance sync complete: {} updated, {} unchanged, {} failed",
            report.updated,
            report.unchanged,
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use crate::schema::Metadata;

    async fn setup() -> (WalletService, Arc<MockProvider>) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let provider = Arc::new(MockProvider::new());
        let service = WalletService::new(db, provider.clone(), "KES");
        (service, provider)
    }

    fn create_request(student_id: &str, name: &str) -> CreateWalletRequest {
        CreateWalletRequest {
            student_id: Some(student_id.into()),
            student_name: Some(name.into()),
            ..Default::default()
        }
    }

    fn transfer_request(from: &str, to: &str, amount: f64) -> TransferRequest {
        TransferRequest {
            from_student: Some(from.into()),
            to_student: Some(to.into()),
            amount: Some(amount),
        }
    }

    async fn with_wallet(service: &WalletService, student_id: &str, name: &str) -> String {
        service
            .create_wallet(&create_request(student_id, name))
            .await
            .unwrap()
            .wallet_id
    }

    #[tokio::test]
    async fn create_wallet_succeeds_once_per_student() {
        let (service, provider) = setup().await;

        let created = service.create_wallet(&create_request("S1", "Ann")).await.unwrap();
        assert_eq!(created.student_id, "S1");
        assert_eq!(provider.create_calls(), 1);

        let again = service.create_wallet(&create_request("S1", "Ann")).await;
        assert!(matches!(again, Err(WalletError::DuplicateWallet(_))));
        assert_eq!(provider.create_calls(), 1);

        let history = service.student_transactions("S1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionType::WalletCreated);
        assert_eq!(history[0].status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn create_wallet_validates_before_calling_provider() {
        let (service, provider) = setup().await;
        let request = CreateWalletRequest {
            student_id: Some("S1".into()),
            ..Default::default()
        };
        let result = service.create_wallet(&request).await;
        assert!(matches!(result, Err(WalletError::Validation(_))));
        assert_eq!(provider.create_calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_on_create_leaves_no_wallet() {
        let (service, provider) = setup().await;
        provider.set_fail_on_create(true).await;

        let result = service.create_wallet(&create_request("S1", "Ann")).await;
        assert!(matches!(result, Err(WalletError::Provider(_))));
        assert!(service.db().get_wallet_by_student_id("S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deposit_records_pending_transaction() {
        let (service, provider) = setup().await;
        let wallet_id = with_wallet(&service, "S1", "Ann").await;

        let request = DepositRequest {
            student_id: Some("S1".into()),
            amount: Some(150.0),
            phone: Some("0712345678".into()),
            email: None,
        };
        let deposit = service.deposit(&request).await.unwrap();
        assert_eq!(deposit.amount, 150.0);

        let collections = provider.collections().await;
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].wallet_id, wallet_id);

        let latest = &service.list_transactions(1).await.unwrap()[0];
        assert_eq!(latest.kind, TransactionType::Deposit);
        assert_eq!(latest.status, TransactionStatus::Pending);
        assert_eq!(latest.student_id.as_deref(), Some("S1"));
        assert_eq!(
            latest.metadata,
            Some(Metadata::Structured(
                json!({ "phone": "0712345678", "method": "M-PESA" })
            ))
        );
    }

    #[tokio::test]
    async fn deposit_for_unknown_student_is_not_found() {
        let (service, provider) = setup().await;
        let request = DepositRequest {
            student_id: Some("ghost".into()),
            amount: Some(10.0),
            phone: Some("0712345678".into()),
            email: None,
        };
        let result = service.deposit(&request).await;
        assert!(matches!(result, Err(WalletError::WalletNotFound(id)) if id == "ghost"));
        assert_eq!(provider.collection_calls(), 0);
    }

    #[tokio::test]
    async fn balance_read_refreshes_cache_with_live_figure() {
        let (service, provider) = setup().await;
        let wallet_id = with_wallet(&service, "S1", "Ann").await;
        provider.set_balance(&wallet_id, 320.0, 300.0).await;

        let view = service.balance("S1").await.unwrap();
        assert_eq!(view.balance, 320.0);
        assert_eq!(view.available_balance, 300.0);

        let cached = service.db().get_wallet_by_student_id("S1").await.unwrap().unwrap();
        assert_eq!(cached.balance, 320.0);
    }

    #[tokio::test]
    async fn transfer_above_available_never_reaches_provider() {
        let (service, provider) = setup().await;
        let a = with_wallet(&service, "A", "Ann").await;
        with_wallet(&service, "B", "Ben").await;
        provider.set_balance(&a, 600.0, 100.0).await;

        let result = service.transfer(&transfer_request("A", "B", 150.0)).await;
        match result {
            Err(WalletError::InsufficientFunds {
                available,
                requested,
                details,
                ..
            }) => {
                assert_eq!(available, 100.0);
                assert_eq!(requested, 150.0);
                assert!(details.is_none());
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(provider.transfer_calls(), 0);
    }

    #[tokio::test]
    async fn transfer_names_the_missing_side() {
        let (service, provider) = setup().await;
        with_wallet(&service, "A", "Ann").await;

        let result = service.transfer(&transfer_request("A", "Z", 1.0)).await;
        assert!(matches!(result, Err(WalletError::WalletNotFound(id)) if id == "Z"));
        assert_eq!(provider.balance_calls(), 0);
    }

    #[tokio::test]
    async fn transfer_fails_when_sender_balance_is_unavailable() {
        let (service, provider) = setup().await;
        let a = with_wallet(&service, "A", "Ann").await;
        with_wallet(&service, "B", "Ben").await;
        provider.fail_balance_for(&a).await;

        let result = service.transfer(&transfer_request("A", "B", 1.0)).await;
        assert!(matches!(result, Err(WalletError::BalanceUnavailable(_))));
        assert_eq!(provider.transfer_calls(), 0);
    }

    #[tokio::test]
    async fn successful_transfer_records_and_caches_both_sides() {
        let (service, provider) = setup().await;
        let a = with_wallet(&service, "A", "Ann").await;
        let b = with_wallet(&service, "B", "Ben").await;
        provider.set_balance(&a, 500.0, 500.0).await;
        provider.set_balance(&b, 50.0, 50.0).await;
        provider
            .push_transfer_response(json!({
                "tracking_id": "T1",
                "details": {
                    "origin": { "current_balance": 200 },
                    "destination": { "current_balance": 350 },
                },
            }))
            .await;

        let receipt = service.transfer(&transfer_request("A", "B", 300.0)).await.unwrap();
        assert_eq!(receipt.tracking_id, "T1");
        assert_eq!(provider.transfer_calls(), 1);

        let transfers: Vec<_> = service
            .list_transactions(10)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TransactionType::Transfer)
            .collect();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].status, TransactionStatus::Completed);
        assert_eq!(transfers[0].transaction_id.as_deref(), Some("T1"));
        assert_eq!(transfers[0].from_student.as_deref(), Some("A"));
        assert_eq!(transfers[0].to_student.as_deref(), Some("B"));
        assert!(transfers[0].student_id.is_none());

        let a_cached = service.db().get_wallet_by_student_id("A").await.unwrap().unwrap();
        let b_cached = service.db().get_wallet_by_student_id("B").await.unwrap().unwrap();
        assert_eq!(a_cached.balance, 200.0);
        assert_eq!(b_cached.balance, 350.0);
    }

    #[tokio::test]
    async fn missing_snapshot_leaves_cached_balance_untouched() {
        let (service, provider) = setup().await;
        let a = with_wallet(&service, "A", "Ann").await;
        with_wallet(&service, "B", "Ben").await;
        provider.set_balance(&a, 100.0, 100.0).await;
        service.db().update_wallet_balance("B", 75.0).await.unwrap();
        provider
            .push_transfer_response(json!({
                "details": { "origin": { "current_balance": 90 } },
            }))
            .await;

        let receipt = service.transfer(&transfer_request("A", "B", 10.0)).await.unwrap();
        assert_eq!(receipt.tracking_id, "N/A");

        let b_cached = service.db().get_wallet_by_student_id("B").await.unwrap().unwrap();
        assert_eq!(b_cached.balance, 75.0);
        let a_cached = service.db().get_wallet_by_student_id("A").await.unwrap().unwrap();
        assert_eq!(a_cached.balance, 90.0);
    }

    #[tokio::test]
    async fn provider_rejection_with_snapshot_reports_insufficient_funds() {
        let (service, provider) = setup().await;
        let a = with_wallet(&service, "A", "Ann").await;
        with_wallet(&service, "B", "Ben").await;
        provider.set_balance(&a, 500.0, 500.0).await;
        provider
            .push_transfer_response(json!({
                "error": "Wallet balance is too low",
                "details": { "origin": { "available_balance": 120, "current_balance": 500 } },
            }))
            .await;

        let result = service.transfer(&transfer_request("A", "B", 300.0)).await;
        match result {
            Err(err @ WalletError::InsufficientFunds { .. }) => {
                assert_eq!(
                    err.to_string(),
                    "Insufficient balance. Available: 120 KES, Required: 300 KES"
                );
                let details = err.details().unwrap();
                assert_eq!(details["error"], "Wallet balance is too low");
                assert_eq!(details["details"]["origin"]["available_balance"], 120);
            }
            other => panic!("unexpected result {other:?}"),
        }
        let transfers = service.list_transactions(10).await.unwrap();
        assert!(transfers.iter().all(|t| t.kind != TransactionType::Transfer));
    }

    #[tokio::test]
    async fn insufficient_funds_message_uses_configured_currency() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let provider = Arc::new(MockProvider::new());
        let service = WalletService::new(db, provider.clone(), "UGX");
        let a = with_wallet(&service, "A", "Ann").await;
        with_wallet(&service, "B", "Ben").await;
        provider.set_balance(&a, 40.0, 40.0).await;

        let err = service
            .transfer(&transfer_request("A", "B", 50.0))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient balance. Available: 40 UGX, Required: 50 UGX"
        );

        provider.set_balance(&a, 100.0, 100.0).await;
        let receipt = service.transfer(&transfer_request("A", "B", 50.0)).await.unwrap();
        assert_eq!(receipt.currency, "UGX");
    }

    #[tokio::test]
    async fn provider_rejection_without_snapshot_passes_message_through() {
        let (service, provider) = setup().await;
        let a = with_wallet(&service, "A", "Ann").await;
        with_wallet(&service, "B", "Ben").await;
        provider.set_balance(&a, 500.0, 500.0).await;
        provider
            .push_transfer_response(json!({ "error": "Destination wallet is frozen" }))
            .await;

        let result = service.transfer(&transfer_request("A", "B", 10.0)).await;
        match result {
            Err(WalletError::TransferRejected { message, details }) => {
                assert_eq!(message, "Destination wallet is frozen");
                assert_eq!(details["error"], "Destination wallet is frozen");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrecognized_transfer_response_is_a_failure() {
        let (service, provider) = setup().await;
        let a = with_wallet(&service, "A", "Ann").await;
        with_wallet(&service, "B", "Ben").await;
        provider.set_balance(&a, 500.0, 500.0).await;
        provider.push_transfer_response(json!({ "status": "queued" })).await;

        let result = service.transfer(&transfer_request("A", "B", 10.0)).await;
        assert!(matches!(result, Err(WalletError::TransferFailed { .. })));
    }

    #[tokio::test]
    async fn sync_counts_updated_unchanged_and_failed_wallets() {
        let (service, provider) = setup().await;
        let a = with_wallet(&service, "A", "Ann").await;
        with_wallet(&service, "B", "Ben").await;
        let c = with_wallet(&service, "C", "Cat").await;
        provider.set_balance(&a, 40.0, 40.0).await;
        provider.fail_balance_for(&c).await;

        let report = service.sync_balances().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                updated: 1,
                unchanged: 1,
                failed: 1
            }
        );
        let cached = service.db().get_wallet_by_student_id("A").await.unwrap().unwrap();
        assert_eq!(cached.balance, 40.0);
    }
}
