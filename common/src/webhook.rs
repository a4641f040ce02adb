use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::db::Database;
use crate::helpers::{amount_field, string_field};
use crate::provider::WalletProvider;
use crate::schema::{NewTransaction, TransactionStatus, TransactionType, Wallet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentComplete,
    PaymentFailed,
    WalletTopup,
    WalletTransfer,
    Unknown(Option<String>),
}

impl WebhookEvent {
    /// Accepts the provider's discriminators (`COMPLETE`, `wallet.topup`...)
    /// and their snake-case names.
    pub fn from_payload(payload: &Value) -> Self {
        let name = string_field(payload, "event");
        match name.as_deref() {
            Some("COMPLETE" | "payment_complete") => WebhookEvent::PaymentComplete,
            Some("FAILED" | "payment_failed") => WebhookEvent::PaymentFailed,
            Some("wallet.topup" | "wallet_topup") => WebhookEvent::WalletTopup,
            Some("wallet.transfer" | "wallet_transfer") => WebhookEvent::WalletTransfer,
            _ => WebhookEvent::Unknown(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// A transaction row was written.
    Recorded,
    /// The event referenced wallets this system does not know.
    Skipped,
    Unhandled,
    /// Processing stopped on an internal error; see `errors`.
    Failed,
}

/// What a delivery did. Internal failures end up in `errors` instead of
/// being returned, so the caller can always acknowledge.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookReport {
    pub event: Option<String>,
    pub outcome: WebhookOutcome,
    pub errors: Vec<String>,
}

/// Applies provider-pushed events to the local store.
///
/// Deliveries are at-least-once with no deduplication key, so a re-delivered
/// event is recorded again.
#[derive(Clone)]
pub struct WebhookRouter {
    db: Database,
    provider: Arc<dyn WalletProvider>,
}

impl WebhookRouter {
    pub fn new(db: Database, provider: Arc<dyn WalletProvider>) -> Self {
        Self { db, provider }
    }

    pub async fn dispatch(&self, payload: &Value) -> WebhookReport {
        let mut report = WebhookReport {
            event: string_field(payload, "event"),
            outcome: WebhookOutcome::Unhandled,
            errors: Vec::new(),
        };

        report.outcome = match WebhookEvent::from_payload(payload) {
            WebhookEvent::PaymentComplete => self.payment_complete(payload, &mut report.errors).await,
            WebhookEvent::PaymentFailed => self.payment_failed(payload, &mut report.errors).await,
            WebhookEvent::WalletTopup => self.wallet_topup(payload, &mut report.errors).await,
            WebhookEvent::WalletTransfer => self.wallet_transfer(payload, &mut report.errors).await,
            WebhookEvent::Unknown(name) => {
                log::warn!("Unhandled webhook event: {:?}", name);
                WebhookOutcome::Unhandled
            }
        };

        log::info!(
            "Webhook {:?} processed: {:?} ({} errors)",
            report.event,
            report.outcome,
            report.errors.len()
        );
        report
    }

    async fn record(&self, transaction: NewTransaction, errors: &mut Vec<String>) -> WebhookOutcome {
        match self.db.add_transaction(&transaction).await {
            Ok(id) => {
                log::debug!("Webhook {:?} transaction saved as #{}", transaction.kind, id);
                WebhookOutcome::Recorded
            }
            Err(e) => {
                log::error!("Failed to save webhook {:?} transaction: {}", transaction.kind, e);
                errors.push(format!("failed to save transaction: {e}"));
                WebhookOutcome::Failed
            }
        }
    }

    async fn wallet_by_provider_id(
        &self,
        wallet_id: Option<&str>,
        errors: &mut Vec<String>,
    ) -> Option<Wallet> {
        let wallet_id = wallet_id?;
        match self.db.get_wallet_by_wallet_id(wallet_id).await {
            Ok(wallet) => wallet,
            Err(e) => {
                log::error!("Failed to look up wallet {}: {}", wallet_id, e);
                errors.push(format!("failed to look up wallet {wallet_id}: {e}"));
                None
            }
        }
    }

    /// Refreshes the cached balance from the provider. Failures are noted and
    /// the event is still recorded.
    async fn sync_balance(&self, wallet: &Wallet, errors: &mut Vec<String>) {
        let live = match self.provider.get_balance(&wallet.wallet_id).await {
            Ok(live) => live,
            Err(e) => {
                log::error!("Failed to fetch balance for wallet {}: {}", wallet.wallet_id, e);
                errors.push(format!("failed to fetch balance for {}: {e}", wallet.wallet_id));
                return;
            }
        };
        let balance = live.balance.current_balance;
        match self.db.update_wallet_balance(&wallet.student_id, balance).await {
            Ok(_) => log::info!("Updated balance for {}: {} {}", wallet.student_name, balance, live.currency),
            Err(e) => {
                log::error!("Failed to cache balance for {}: {}", wallet.student_id, e);
                errors.push(format!("failed to cache balance for {}: {e}", wallet.student_id));
            }
        }
    }

    async fn payment_complete(&self, payload: &Value, errors: &mut Vec<String>) -> WebhookOutcome {
        let amount = amount_field(payload, &["value", "amount"]).unwrap_or(0.0);
        let account = string_field(payload, "account").unwrap_or_else(|| "unknown".to_string());
        log::info!(
            "Payment completed: invoice {:?}, {} from {}",
            string_field(payload, "invoice_id"),
            amount,
            account
        );

        let transaction = NewTransaction::new(
            TransactionType::PaymentComplete,
            amount,
            TransactionStatus::Completed,
        )
        .description(format!("Payment completed for account {account}"))
        .transaction_id(string_field(payload, "invoice_id"))
        .metadata(payload.clone());
        self.record(transaction, errors).await
    }

    async fn payment_failed(&self, payload: &Value, errors: &mut Vec<String>) -> WebhookOutcome {
        let reason = string_field(payload, "failed_reason").unwrap_or_else(|| "unknown".to_string());
        log::warn!(
            "Payment failed: invoice {:?}: {}",
            string_field(payload, "invoice_id"),
            reason
        );

        let transaction =
            NewTransaction::new(TransactionType::PaymentFailed, 0.0, TransactionStatus::Failed)
                .description(format!("Payment failed: {reason}"))
                .transaction_id(string_field(payload, "invoice_id"))
                .metadata(payload.clone());
        self.record(transaction, errors).await
    }

    async fn wallet_topup(&self, payload: &Value, errors: &mut Vec<String>) -> WebhookOutcome {
        let wallet_id = string_field(payload, "wallet_id");
        let Some(wallet) = self.wallet_by_provider_id(wallet_id.as_deref(), errors).await else {
            log::warn!("Top-up for wallet {:?} not found in local database", wallet_id);
            return WebhookOutcome::Skipped;
        };

        self.sync_balance(&wallet, errors).await;

        let status = string_field(payload, "status");
        let transaction = NewTransaction::new(
            TransactionType::Topup,
            amount_field(payload, &["amount"]).unwrap_or(0.0),
            TransactionStatus::from_provider_state(status.as_deref()),
        )
        .student(&wallet.student_id)
        .description(format!("Wallet top-up for {}", wallet.student_name))
        .metadata(payload.clone());
        self.record(transaction, errors).await
    }

    async fn wallet_transfer(&self, payload: &Value, errors: &mut Vec<String>) -> WebhookOutcome {
        let origin_id = string_field(payload, "origin_wallet_id");
        let destination_id = string_field(payload, "destination_wallet_id");
        let origin = self.wallet_by_provider_id(origin_id.as_deref(), errors).await;
        let destination = self
            .wallet_by_provider_id(destination_id.as_deref(), errors)
            .await;

        let (origin, destination) = match (origin, destination) {
            (Some(origin), Some(destination)) => (origin, destination),
            (origin, destination) => {
                if origin.is_none() {
                    log::warn!("Origin wallet not found: {:?}", origin_id);
                }
                if destination.is_none() {
                    log::warn!("Destination wallet not found: {:?}", destination_id);
                }
                return WebhookOutcome::Skipped;
            }
        };

        self.sync_balance(&origin, errors).await;
        self.sync_balance(&destination, errors).await;

        let description = string_field(payload, "narrative").unwrap_or_else(|| {
            format!(
                "Transfer: {} -> {}",
                origin.student_name, destination.student_name
            )
        });
        let status = string_field(payload, "status");
        let transaction = NewTransaction::new(
            TransactionType::Transfer,
            amount_field(payload, &["amount"]).unwrap_or(0.0),
            TransactionStatus::from_provider_state(status.as_deref()),
        )
        .parties(&origin.student_id, &destination.student_id)
        .description(description)
        .transaction_id(string_field(payload, "tracking_id"))
        .metadata(payload.clone());
        self.record(transaction, errors).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use crate::schema::{Metadata, NewWallet};
    use serde_json::json;

    async fn setup() -> (WebhookRouter, Database, Arc<MockProvider>) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let provider = Arc::new(MockProvider::new());
        db.add_wallet(&NewWallet::new("A", "Ann", "WA")).await.unwrap();
        db.add_wallet(&NewWallet::new("B", "Ben", "WB")).await.unwrap();
        let router = WebhookRouter::new(db.clone(), provider.clone());
        (router, db, provider)
    }

    #[test]
    fn provider_and_snake_case_names_resolve_alike() {
        assert_eq!(
            WebhookEvent::from_payload(&json!({ "event": "COMPLETE" })),
            WebhookEvent::PaymentComplete
        );
        assert_eq!(
            WebhookEvent::from_payload(&json!({ "event": "wallet_transfer" })),
            WebhookEvent::WalletTransfer
        );
        assert_eq!(
            WebhookEvent::from_payload(&json!({})),
            WebhookEvent::Unknown(None)
        );
    }

    #[tokio::test]
    async fn payment_complete_records_invoice_and_value() {
        let (router, db, _) = setup().await;
        let payload = json!({
            "event": "COMPLETE",
            "invoice_id": "INV-9",
            "value": "250.50",
            "account": "254712345678",
        });

        let report = router.dispatch(&payload).await;
        assert_eq!(report.outcome, WebhookOutcome::Recorded);
        assert!(report.errors.is_empty());

        let tx = &db.list_transactions(1).await.unwrap()[0];
        assert_eq!(tx.kind, TransactionType::PaymentComplete);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.amount, 250.5);
        assert_eq!(tx.transaction_id.as_deref(), Some("INV-9"));
        assert_eq!(
            tx.description.as_deref(),
            Some("Payment completed for account 254712345678")
        );
        assert_eq!(tx.metadata, Some(Metadata::Structured(payload)));
    }

    #[tokio::test]
    async fn payment_complete_without_amount_defaults_to_zero() {
        let (router, db, _) = setup().await;
        router
            .dispatch(&json!({ "event": "payment_complete", "invoice_id": "INV-1" }))
            .await;
        assert_eq!(db.list_transactions(1).await.unwrap()[0].amount, 0.0);
    }

    #[tokio::test]
    async fn negative_payment_value_is_stored_as_zero() {
        let (router, db, _) = setup().await;
        let report = router
            .dispatch(&json!({ "event": "COMPLETE", "invoice_id": "INV-3", "value": "-500" }))
            .await;

        assert_eq!(report.outcome, WebhookOutcome::Recorded);
        let tx = &db.list_transactions(1).await.unwrap()[0];
        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.transaction_id.as_deref(), Some("INV-3"));
    }

    #[tokio::test]
    async fn non_numeric_topup_amount_still_records_the_event() {
        let (router, db, provider) = setup().await;
        provider.set_balance("WA", 10.0, 10.0).await;

        let report = router
            .dispatch(&json!({ "event": "wallet.topup", "wallet_id": "WA", "amount": "NaN" }))
            .await;

        assert_eq!(report.outcome, WebhookOutcome::Recorded);
        assert!(report.errors.is_empty());
        let tx = &db.list_transactions(1).await.unwrap()[0];
        assert_eq!(tx.kind, TransactionType::Topup);
        assert_eq!(tx.amount, 0.0);
    }

    #[tokio::test]
    async fn payment_failed_records_reason_with_zero_amount() {
        let (router, db, _) = setup().await;
        router
            .dispatch(&json!({
                "event": "FAILED",
                "invoice_id": "INV-2",
                "value": 99,
                "failed_reason": "Request cancelled by user",
            }))
            .await;

        let tx = &db.list_transactions(1).await.unwrap()[0];
        assert_eq!(tx.kind, TransactionType::PaymentFailed);
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.amount, 0.0);
        assert_eq!(
            tx.description.as_deref(),
            Some("Payment failed: Request cancelled by user")
        );
    }

    #[tokio::test]
    async fn repeated_topup_is_recorded_twice() {
        let (router, db, provider) = setup().await;
        provider.set_balance("WA", 700.0, 700.0).await;
        let payload = json!({ "event": "wallet.topup", "wallet_id": "WA", "amount": 200 });

        router.dispatch(&payload).await;
        let report = router.dispatch(&payload).await;
        assert_eq!(report.outcome, WebhookOutcome::Recorded);

        let history = db.list_transactions_for_student("A", 10).await.unwrap();
        let topups: Vec<_> = history
            .iter()
            .filter(|t| t.kind == TransactionType::Topup)
            .collect();
        assert_eq!(topups.len(), 2);
        assert_eq!(provider.balance_calls(), 2);

        let wallet = db.get_wallet_by_student_id("A").await.unwrap().unwrap();
        assert_eq!(wallet.balance, 700.0);
    }

    #[tokio::test]
    async fn topup_for_unknown_wallet_is_skipped() {
        let (router, db, provider) = setup().await;
        let report = router
            .dispatch(&json!({ "event": "wallet.topup", "wallet_id": "NOPE", "amount": 5 }))
            .await;

        assert_eq!(report.outcome, WebhookOutcome::Skipped);
        assert!(db.list_transactions(10).await.unwrap().is_empty());
        assert_eq!(provider.balance_calls(), 0);
    }

    #[tokio::test]
    async fn topup_is_recorded_even_when_balance_fetch_fails() {
        let (router, db, provider) = setup().await;
        provider.fail_balance_for("WA").await;

        let report = router
            .dispatch(&json!({
                "event": "wallet_topup",
                "wallet_id": "WA",
                "amount": 50,
                "status": "PROCESSING",
            }))
            .await;

        assert_eq!(report.outcome, WebhookOutcome::Recorded);
        assert_eq!(report.errors.len(), 1);
        let tx = &db.list_transactions(1).await.unwrap()[0];
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.student_id.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn transfer_to_unknown_destination_writes_nothing() {
        let (router, db, provider) = setup().await;
        provider.set_balance("WA", 10.0, 10.0).await;

        let report = router
            .dispatch(&json!({
                "event": "wallet.transfer",
                "origin_wallet_id": "WA",
                "destination_wallet_id": "GHOST",
                "amount": 10,
            }))
            .await;

        assert_eq!(report.outcome, WebhookOutcome::Skipped);
        assert!(db.list_transactions(10).await.unwrap().is_empty());
        assert_eq!(provider.balance_calls(), 0);
        let wallet = db.get_wallet_by_student_id("A").await.unwrap().unwrap();
        assert_eq!(wallet.balance, 0.0);
    }

    #[tokio::test]
    async fn transfer_event_syncs_both_sides_and_records_parties() {
        let (router, db, provider) = setup().await;
        provider.set_balance("WA", 200.0, 200.0).await;
        provider.set_balance("WB", 350.0, 350.0).await;

        router
            .dispatch(&json!({
                "event": "wallet.transfer",
                "origin_wallet_id": "WA",
                "destination_wallet_id": "WB",
                "amount": "300",
                "narrative": "Lunch money",
                "tracking_id": "T77",
            }))
            .await;

        let tx = &db.list_transactions(1).await.unwrap()[0];
        assert_eq!(tx.kind, TransactionType::Transfer);
        assert_eq!(tx.from_student.as_deref(), Some("A"));
        assert_eq!(tx.to_student.as_deref(), Some("B"));
        assert!(tx.student_id.is_none());
        assert_eq!(tx.description.as_deref(), Some("Lunch money"));
        assert_eq!(tx.transaction_id.as_deref(), Some("T77"));
        assert_eq!(tx.amount, 300.0);

        let a = db.get_wallet_by_student_id("A").await.unwrap().unwrap();
        let b = db.get_wallet_by_student_id("B").await.unwrap().unwrap();
        assert_eq!(a.balance, 200.0);
        assert_eq!(b.balance, 350.0);
    }

    #[tokio::test]
    async fn unknown_event_is_acknowledged_without_writes() {
        let (router, db, _) = setup().await;
        let report = router.dispatch(&json!({ "event": "invoice.created" })).await;

        assert_eq!(report.outcome, WebhookOutcome::Unhandled);
        assert_eq!(report.event.as_deref(), Some("invoice.created"));
        assert!(db.list_transactions(10).await.unwrap().is_empty());
    }
}
