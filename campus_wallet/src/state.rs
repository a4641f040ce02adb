use std::sync::Arc;

use common::{Database, WalletProvider, WalletService, WebhookRouter};

pub struct AppState {
    pub service: WalletService,
    pub webhooks: WebhookRouter,
}

impl AppState {
    pub fn new(db: Database, provider: Arc<dyn WalletProvider>, currency: &str) -> Self {
        AppState {
            service: WalletService::new(db.clone(), provider.clone(), currency),
            webhooks: WebhookRouter::new(db, provider),
        }
    }
}
