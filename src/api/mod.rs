pub mod chat;
pub mod health;

use crate::services::{ChatService, MarketDataGateway};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::net::SocketAddr;
use std::sync::Arc;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub market: Arc<dyn MarketDataGateway>,
}

/// Credential forwarded to the account backend, taken from `Authorization`.
///
/// A `Bearer ` prefix is stripped; any other value is passed through as-is.
pub fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Network origin of the caller: first `X-Forwarded-For` hop, else the peer.
pub fn client_origin(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}
