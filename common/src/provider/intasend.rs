use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{CollectionRequest, LiveBalance, ProviderWallet, WalletProvider};
use crate::error::ProviderError;
use crate::helpers::{fallback_email, normalize_phone};

const LIVE_BASE_URL: &str = "https://payment.intasend.com/api/v1";
const SANDBOX_BASE_URL: &str = "https://sandbox.intasend.com/api/v1";

#[derive(Debug, Clone)]
pub struct IntaSendConfig {
    pub publishable_key: String,
    pub secret_key: String,
    pub is_live: bool,
    pub base_url: Option<String>,
    pub country_code: String,
    pub email_domain: String,
}

impl IntaSendConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let publishable_key = std::env::var("INTASEND_PUBLISHABLE_KEY")
            .context("INTASEND_PUBLISHABLE_KEY must be set")?;

        let secret_key =
            std::env::var("INTASEND_SECRET_KEY").context("INTASEND_SECRET_KEY must be set")?;

        let is_live = std::env::var("INTASEND_IS_LIVE")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let base_url = std::env::var("INTASEND_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let country_code =
            std::env::var("PHONE_COUNTRY_CODE").unwrap_or_else(|_| "254".to_string());

        let email_domain =
            std::env::var("DEPOSIT_EMAIL_DOMAIN").unwrap_or_else(|_| "university.ac.ke".to_string());

        Ok(Self {
            publishable_key,
            secret_key,
            is_live,
            base_url,
            country_code,
            email_domain,
        })
    }

    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.is_live => LIVE_BASE_URL.to_string(),
            None => SANDBOX_BASE_URL.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// REST client for the IntaSend wallets and collection APIs.
pub struct IntaSendClient {
    http: Client,
    base_url: String,
    secret_key: String,
    publishable_key: String,
    country_code: String,
    email_domain: String,
}

impl IntaSendClient {
    pub fn new(config: &IntaSendConfig) -> Result<Self, ProviderError> {
        if config.secret_key.trim().is_empty() || config.publishable_key.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "IntaSend API keys are empty".to_string(),
            ));
        }
        let http = Client::builder().build()?;
        log::info!(
            "IntaSend client targeting {} ({})",
            config.api_base_url(),
            if config.is_live { "live" } else { "sandbox" }
        );
        Ok(Self {
            http,
            base_url: config.api_base_url(),
            secret_key: config.secret_key.clone(),
            publishable_key: config.publishable_key.clone(),
            country_code: config.country_code.clone(),
            email_domain: config.email_domain.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.secret_key)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends the request and decodes a successful JSON body. Non-2xx answers
    /// become `ProviderError::Api` carrying the body text.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            log::error!("IntaSend request failed with {}: {}", status, body);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(format!("{e}: {body}")))
    }
}

#[async_trait]
impl WalletProvider for IntaSendClient {
    async fn create_wallet(
        &self,
        label: &str,
        currency: &str,
        can_disburse: bool,
    ) -> Result<ProviderWallet, ProviderError> {
        let body = json!({
            "label": label,
            "wallet_type": "WORKING",
            "currency": currency,
            "can_disburse": can_disburse,
        });
        let wallet: ProviderWallet = self.send(self.http.post(self.url("wallets/")).json(&body)).await?;
        log::info!("Created provider wallet {} for label {}", wallet.wallet_id, label);
        Ok(wallet)
    }

    async fn get_balance(&self, wallet_id: &str) -> Result<LiveBalance, ProviderError> {
        let balance: LiveBalance = self
            .send(self.http.get(self.url(&format!("wallets/{wallet_id}/"))))
            .await?;
        log::debug!(
            "Wallet {} balance: {} {} (available {})",
            wallet_id,
            balance.currency,
            balance.balance.current_balance,
            balance.balance.available_balance
        );
        Ok(balance)
    }

    async fn list_wallets(&self) -> Result<Vec<ProviderWallet>, ProviderError> {
        let page: Page<ProviderWallet> = self.send(self.http.get(self.url("wallets/"))).await?;
        Ok(page.results)
    }

    async fn initiate_mobile_collection(
        &self,
        request: &CollectionRequest,
    ) -> Result<Value, ProviderError> {
        let phone_number = normalize_phone(&request.phone, &self.country_code);
        let email = request
            .email
            .clone()
            .unwrap_or_else(|| fallback_email(&request.wallet_id, &self.email_domain));

        let body = json!({
            "public_key": self.publishable_key,
            "amount": request.amount,
            "phone_number": phone_number,
            "email": email,
            "narrative": format!("Wallet top-up for {}", request.wallet_id),
            "wallet_id": request.wallet_id,
        });
        let response: Value = self
            .send(self.http.post(self.url("payment/mpesa-stk-push/")).json(&body))
            .await?;
        log::info!(
            "Collection of {} requested from {} into wallet {}",
            request.amount,
            phone_number,
            request.wallet_id
        );
        Ok(response)
    }

    async fn transfer(
        &self,
        origin_wallet_id: &str,
        destination_wallet_id: &str,
        amount: f64,
        narrative: &str,
    ) -> Result<Value, ProviderError> {
        let body = json!({
            "wallet_id": destination_wallet_id,
            "amount": amount,
            "narrative": narrative,
        });
        let response = self
            .authorized(
                self.http
                    .post(self.url(&format!("wallets/{origin_wallet_id}/intra_transfer/")))
                    .json(&body),
            )
            .send()
            .await?;

        // Rejections come back as JSON bodies too; only an unreadable body is
        // a provider failure here.
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                log::debug!("Transfer response ({}): {}", status, value);
                Ok(value)
            }
            Err(_) if !status.is_success() => Err(ProviderError::Api {
                status: status.as_u16(),
                body: text,
            }),
            Err(e) => Err(ProviderError::Decode(format!("{e}: {text}"))),
        }
    }

    async fn wallet_transactions(&self, wallet_id: &str) -> Result<Vec<Value>, ProviderError> {
        let page: Page<Value> = self
            .send(self.http.get(self.url(&format!("wallets/{wallet_id}/transactions/"))))
            .await?;
        Ok(page.results)
    }
}
