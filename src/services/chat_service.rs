use crate::{
    error::{AppError, Result},
    services::{
        dialogue_policy::{DialoguePolicy, Turn},
        session_store::SessionStore,
        slot_extractor::SlotExtractor,
    },
    utils::credential_fingerprint,
};
use std::sync::Arc;

/// Session key for a caller: hashed credential when present, else origin.
pub fn session_key(credential: Option<&str>, origin: &str) -> String {
    match credential.map(str::trim).filter(|c| !c.is_empty()) {
        Some(credential) => format!("token:{}", credential_fingerprint(credential)),
        None => format!("ip:{}", origin),
    }
}

/// Runs one chat message end to end.
pub struct ChatService {
    sessions: Arc<dyn SessionStore>,
    extractor: SlotExtractor,
    policy: DialoguePolicy,
}

impl ChatService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        extractor: SlotExtractor,
        policy: DialoguePolicy,
    ) -> Self {
        Self {
            sessions,
            extractor,
            policy,
        }
    }

    /// Answers `message` for the session at `key`.
    ///
    /// The session is read at the start and written back only after a reply
    /// exists; a failed request leaves it untouched.
    pub async fn handle_message(
        &self,
        key: &str,
        credential: Option<&str>,
        message: &str,
    ) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::BadRequest("message is required".to_string()));
        }

        let mut session = self.sessions.get(key).await.unwrap_or_default();
        let slots = self.extractor.extract(message).await;
        let coin = slots.coin.clone().or_else(|| session.last_coin.clone());

        let reply = {
            let turn = Turn::new(message, credential, coin, &session.history);
            self.policy.respond(&turn).await?
        };
        tracing::debug!(
            "Chat reply ready branch={} coin_from_message={}",
            reply.branch.as_str(),
            slots.coin.is_some()
        );

        if let Some(coin) = slots.coin {
            session.last_coin = Some(coin);
        }
        session.record_turn(message, &reply.text);
        self.sessions.upsert(key, session).await;

        Ok(reply.text)
    }

    pub async fn clear_session(&self, key: &str) {
        self.sessions.evict(key).await;
    }

    pub fn session_backend(&self) -> &'static str {
        self.sessions.backend_name()
    }
}
