use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use dirtybox_core::PricingPlan;

use crate::types::{
    Block, CreateSubscriptionRequest, CreateTransactionRequest, CreateUserRequest,
    CreatedSubscription, CreatedTransaction, CreatedUser, PricingQuery, Ward,
};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

/// Line-of-business API the funnel finalizes against.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn fetch_blocks(&self) -> Result<Vec<Block>, BackendError>;
    async fn fetch_wards(&self, block_id: &str) -> Result<Vec<Ward>, BackendError>;
    /// Creating an already-registered user returns the existing record.
    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreatedUser, BackendError>;
    async fn fetch_pricing_options(
        &self,
        query: &PricingQuery,
    ) -> Result<Vec<PricingPlan>, BackendError>;
    async fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, BackendError>;
    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreatedTransaction, BackendError>;
}

pub struct HttpBackendClient {
    client: reqwest::Client,
    base_url: String,
    api_token: SecretString,
}

impl HttpBackendClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_token: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url, api_token }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.api_token.expose_secret())
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status { status: status.as_u16(), body });
        }
        serde_json::from_str(&body).map_err(|error| BackendError::Decode(error.to_string()))
    }
}

#[async_trait]
impl BackendApi for HttpBackendClient {
    async fn fetch_blocks(&self) -> Result<Vec<Block>, BackendError> {
        self.get_json("/api/blocks").await
    }

    async fn fetch_wards(&self, block_id: &str) -> Result<Vec<Ward>, BackendError> {
        self.get_json(&format!("/api/blocks/{block_id}/wards")).await
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreatedUser, BackendError> {
        let response = self
            .client
            .post(format!("{}/api/users", self.base_url))
            .bearer_auth(self.api_token.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // A duplicate registration answers 409 with the existing record.
        if status.as_u16() == 409 {
            let existing: serde_json::Value = serde_json::from_str(&body)
                .map_err(|error| BackendError::Decode(error.to_string()))?;
            let id = existing
                .pointer("/user/id")
                .or_else(|| existing.pointer("/id"))
                .and_then(|value| value.as_str())
                .ok_or_else(|| {
                    BackendError::Decode("conflict response carried no user id".to_owned())
                })?;
            info!(event_name = "backend.user.exists", user_id = id, "reusing registered user");
            return Ok(CreatedUser { id: id.to_owned() });
        }

        if !status.is_success() {
            return Err(BackendError::Status { status: status.as_u16(), body });
        }
        serde_json::from_str(&body).map_err(|error| BackendError::Decode(error.to_string()))
    }

    async fn fetch_pricing_options(
        &self,
        query: &PricingQuery,
    ) -> Result<Vec<PricingPlan>, BackendError> {
        debug!(
            event_name = "backend.pricing.fetch",
            bin_size_id = %query.bin_size_id,
            frequency = %query.frequency,
            "fetching pricing options"
        );
        self.post_json("/api/pricing-options/search", query).await
    }

    async fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, BackendError> {
        self.post_json("/api/subscriptions", request).await
    }

    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreatedTransaction, BackendError> {
        self.post_json("/api/transactions", request).await
    }
}

/// Records every call and answers from canned data; for tests.
#[derive(Default)]
pub struct FakeBackend {
    pub blocks: Vec<Block>,
    pub wards: Vec<Ward>,
    pub pricing: Vec<PricingPlan>,
    pub fail_subscriptions: bool,
    created_users: Mutex<Vec<CreateUserRequest>>,
    created_subscriptions: Mutex<Vec<CreateSubscriptionRequest>>,
    created_transactions: Mutex<Vec<CreateTransactionRequest>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_wards(mut self, wards: Vec<Ward>) -> Self {
        self.wards = wards;
        self
    }

    pub fn with_pricing(mut self, pricing: Vec<PricingPlan>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn created_users(&self) -> Vec<CreateUserRequest> {
        self.created_users.lock().expect("user log lock").clone()
    }

    pub fn created_subscriptions(&self) -> Vec<CreateSubscriptionRequest> {
        self.created_subscriptions.lock().expect("subscription log lock").clone()
    }

    pub fn created_transactions(&self) -> Vec<CreateTransactionRequest> {
        self.created_transactions.lock().expect("transaction log lock").clone()
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn fetch_blocks(&self) -> Result<Vec<Block>, BackendError> {
        Ok(self.blocks.clone())
    }

    async fn fetch_wards(&self, _block_id: &str) -> Result<Vec<Ward>, BackendError> {
        Ok(self.wards.clone())
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<CreatedUser, BackendError> {
        let mut users = self.created_users.lock().expect("user log lock");
        let index = users
            .iter()
            .position(|existing| existing.wa_id == request.wa_id)
            .unwrap_or_else(|| {
                users.push(request.clone());
                users.len() - 1
            });
        Ok(CreatedUser { id: format!("usr-{index}") })
    }

    async fn fetch_pricing_options(
        &self,
        _query: &PricingQuery,
    ) -> Result<Vec<PricingPlan>, BackendError> {
        Ok(self.pricing.clone())
    }

    async fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, BackendError> {
        if self.fail_subscriptions {
            return Err(BackendError::Status { status: 500, body: "forced failure".to_owned() });
        }
        let mut subscriptions = self.created_subscriptions.lock().expect("subscription log lock");
        subscriptions.push(request.clone());
        Ok(CreatedSubscription { id: format!("sub-{}", subscriptions.len() - 1) })
    }

    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreatedTransaction, BackendError> {
        let mut transactions = self.created_transactions.lock().expect("transaction log lock");
        transactions.push(request.clone());
        Ok(CreatedTransaction { id: format!("txn-{}", transactions.len() - 1) })
    }
}
