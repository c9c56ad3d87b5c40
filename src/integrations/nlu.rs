use crate::{
    error::{AppError, Result},
    models::Intent,
    services::slot_extractor::LanguageUnderstanding,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote NLU service speaking a small JSON protocol:
/// `POST {api_url}/extract {text}` -> `{coin}` and
/// `POST {api_url}/classify {text, coin}` -> `{intent}`.
#[derive(Clone, Debug)]
pub struct NluClient {
    api_url: String,
    client: Client,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    coin: Option<String>,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    coin: Option<&'a str>,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    intent: Option<String>,
}

impl NluClient {
    pub fn new(api_url: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(8))
            .build()
            .map_err(|e| AppError::Internal(format!("NLU HTTP client init failed: {}", e)))?;
        Ok(Self { api_url, client })
    }

    async fn post<B: Serialize + Sync, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/{}", self.api_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("NLU {} request failed: {}", path, e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalAPI(format!(
                "NLU {} returned {}",
                path,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("NLU {} parse failed: {}", path, e)))
    }
}

#[async_trait::async_trait]
impl LanguageUnderstanding for NluClient {
    async fn extract_coin(&self, text: &str) -> Result<Option<String>> {
        let response: ExtractResponse = self.post("extract", &ExtractRequest { text }).await?;
        Ok(response.coin.filter(|coin| !coin.trim().is_empty()))
    }

    async fn classify_intent(&self, text: &str, coin: Option<&str>) -> Result<Intent> {
        let response: ClassifyResponse =
            self.post("classify", &ClassifyRequest { text, coin }).await?;
        Ok(response
            .intent
            .as_deref()
            .map(Intent::from_label)
            .unwrap_or(Intent::General))
    }
}
