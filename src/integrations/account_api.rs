use crate::{
    error::{AppError, Result},
    models::{OrderAck, OrderRejection, OrderRequest, PortfolioEntry, Wallet},
    services::account_gateway::AccountGateway,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AccountApiClient {
    api_url: String,
    client: Client,
}

impl AccountApiClient {
    /// Builds a client for the trading backend rooted at `api_url`.
    ///
    /// # Arguments
    /// * `api_url` - base URL; endpoint paths are appended to it.
    /// * `timeout_secs` - per-request timeout.
    ///
    /// # Returns
    /// * `Err(AppError::Internal)` when the HTTP client cannot be constructed.
    pub fn new(api_url: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs.clamp(1, 4)))
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::Internal(format!("Account HTTP client init failed: {}", e)))?;
        Ok(Self { api_url, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, credential: &str) -> Result<T> {
        let response = self
            .client
            .get(self.endpoint(path))
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ExternalAPI(format!(
                "GET {} returned {}",
                path, status
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("GET {} parse failed: {}", path, e)))
    }

    // Read failures are logged and collapsed to `None`.
    async fn read<T: DeserializeOwned>(&self, path: &str, credential: &str) -> Option<T> {
        match self.get_json(path, credential).await {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Account backend read skipped path={} err={}", path, err);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl AccountGateway for AccountApiClient {
    async fn get_profile(&self, credential: &str) -> Option<Value> {
        self.read("users/profile", credential).await
    }

    async fn get_portfolio(&self, credential: &str) -> Option<Vec<PortfolioEntry>> {
        self.read("portfolio", credential).await
    }

    async fn get_wallet(&self, credential: &str) -> Option<Wallet> {
        self.read("wallet", credential).await
    }

    async fn get_order_history(&self, credential: &str) -> Option<Value> {
        self.read("orders", credential).await
    }

    async fn get_wallet_transactions(&self, credential: &str) -> Option<Value> {
        self.read("wallet/transactions", credential).await
    }

    async fn submit_order(
        &self,
        credential: &str,
        order: &OrderRequest,
    ) -> std::result::Result<OrderAck, OrderRejection> {
        let response = self
            .client
            .post(self.endpoint("orders"))
            .bearer_auth(credential)
            .json(order)
            .send()
            .await
            .map_err(|e| OrderRejection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrderRejection(rejection_message(status, &body)));
        }

        // The ack body is informational; an unreadable one still means the order went through.
        Ok(response.json::<OrderAck>().await.unwrap_or_default())
    }
}

/// Upstream error detail for a failed order, falling back to the status line.
fn rejection_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|payload| {
        ["message", "error", "detail"].iter().find_map(|key| {
            payload
                .get(*key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
    });

    detail.unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()))
}
