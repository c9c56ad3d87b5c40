use super::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub market_data: String,
    pub session_store: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let market_status = if state.market.is_reachable().await {
        "connected".to_string()
    } else {
        "disconnected".to_string()
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        market_data: market_status,
        session_store: state.chat.session_backend().to_string(),
    })
}
