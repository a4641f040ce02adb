use std::sync::Arc;

use anyhow::Context;
use common::{Database, IntaSendClient, IntaSendConfig};

use crate::state::AppState;

pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub currency: String,
    pub intasend: IntaSendConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://wallet_system.db".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = match std::env::var("PORT") {
            Ok(port) => port
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got `{port}`"))?,
            Err(_) => 5000,
        };

        let currency = std::env::var("WALLET_CURRENCY").unwrap_or_else(|_| "KES".to_string());

        let intasend = IntaSendConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            currency,
            intasend,
        })
    }

    pub async fn create_app_state(&self) -> anyhow::Result<AppState> {
        let db = Database::new(&self.database_url)
            .await
            .with_context(|| format!("Failed to open database `{}`", self.database_url))?;
        log::info!("Database initialized successfully!");

        let provider =
            IntaSendClient::new(&self.intasend).context("Failed to create IntaSend client")?;

        Ok(AppState::new(db, Arc::new(provider), &self.currency))
    }
}
