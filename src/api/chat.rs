use super::{bearer_credential, client_origin, AppState};
use crate::{
    error::{AppError, Result},
    models::{ChatReply, ChatRequest},
    services::chat_service::session_key,
};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;

#[derive(Debug, Serialize)]
pub struct ClearSessionResponse {
    pub cleared: bool,
}

fn caller_key(headers: &HeaderMap, peer: SocketAddr, credential: Option<&str>) -> String {
    session_key(credential, &client_origin(headers, peer))
}

/// POST /api/v1/chat
pub async fn send_message(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>> {
    let Json(req) = payload.map_err(|rejection| {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let message = req.message.unwrap_or_default();

    let credential = bearer_credential(&headers);
    let key = caller_key(&headers, peer, credential.as_deref());

    let reply = state
        .chat
        .handle_message(&key, credential.as_deref(), &message)
        .await?;
    Ok(Json(ChatReply { reply }))
}

/// DELETE /api/v1/chat/session
pub async fn clear_session(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<ClearSessionResponse> {
    let credential = bearer_credential(&headers);
    let key = caller_key(&headers, peer, credential.as_deref());
    state.chat.clear_session(&key).await;
    tracing::debug!("Cleared chat session");
    Json(ClearSessionResponse { cleared: true })
}
