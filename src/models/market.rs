use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ==================== COIN ====================
/// Snapshot of one coin row from the market-data store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoinFact {
    /// Identifier shared with the trading backend.
    pub coin_id: String,
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub change_24h: f64,
    pub last_updated: DateTime<Utc>,
}

impl CoinFact {
    pub fn display_symbol(&self) -> String {
        self.symbol.to_ascii_uppercase()
    }
}

// ==================== NEWS ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
}
