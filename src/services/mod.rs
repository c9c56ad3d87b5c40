// All service modules
pub mod account_gateway;
pub mod chat_service;
pub mod dialogue_policy;
pub mod market_data;
pub mod response_composer;
pub mod session_store;
pub mod slot_extractor;

#[cfg(test)]
pub mod test_support;

// Re-export for convenience
pub use chat_service::ChatService;
pub use market_data::{MarketDataGateway, PgMarketData};

use crate::{
    config::{Config, SessionBackend},
    integrations::{account_api::AccountApiClient, nlu::NluClient, openai::OpenAiClient},
};
use dialogue_policy::DialoguePolicy;
use response_composer::ResponseComposer;
use session_store::{InMemorySessionStore, RedisSessionStore, SessionStore};
use slot_extractor::{KeywordNlu, LanguageUnderstanding, SlotExtractor};
use std::sync::Arc;

/// Wires the configured collaborators into a ready chat service.
pub async fn build_chat_service(
    config: &Config,
    market: Arc<dyn MarketDataGateway>,
) -> anyhow::Result<ChatService> {
    let nlu: Arc<dyn LanguageUnderstanding> = match config.nlu_api_url.as_deref() {
        Some(url) => {
            tracing::info!("Using remote NLU service at {}", url);
            Arc::new(NluClient::new(url.to_string())?)
        }
        None => Arc::new(KeywordNlu::new()),
    };
    let extractor = SlotExtractor::new(nlu);

    let account = Arc::new(AccountApiClient::new(
        config.account_api_url.clone(),
        config.account_api_timeout_secs,
    )?);

    let llm = OpenAiClient::from_config(config)?;
    tracing::info!("LLM provider configured: {}", llm.is_configured());
    let composer = ResponseComposer::new(Arc::new(llm));

    let sessions = build_session_store(config).await?;
    tracing::info!("Session store: {}", sessions.backend_name());

    let policy = DialoguePolicy::new(market, account, extractor.clone(), composer);
    Ok(ChatService::new(sessions, extractor, policy))
}

async fn build_session_store(config: &Config) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.session_backend() {
        SessionBackend::Memory => Ok(Arc::new(InMemorySessionStore::new(
            config.session_max_entries,
            config.session_idle_ttl_secs,
        ))),
        SessionBackend::Redis => {
            let client = redis::Client::open(config.redis_url.clone())?;
            let manager = redis::aio::ConnectionManager::new(client).await?;
            Ok(Arc::new(RedisSessionStore::new(
                manager,
                config.session_idle_ttl_secs,
            )))
        }
    }
}
