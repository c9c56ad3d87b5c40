use crate::{
    db::Database,
    models::{CoinFact, NewsItem},
};

/// Read-only view over cached coin facts and news.
///
/// Lookups never fail towards the caller: a store error is logged and
/// reported as "nothing found".
#[async_trait::async_trait]
pub trait MarketDataGateway: Send + Sync {
    async fn find_coin(&self, name_or_symbol: &str) -> Option<CoinFact>;

    async fn latest_news(&self, limit: i64) -> Vec<NewsItem>;

    async fn is_reachable(&self) -> bool {
        true
    }
}

/// PostgreSQL-backed market data.
pub struct PgMarketData {
    db: Database,
}

impl PgMarketData {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl MarketDataGateway for PgMarketData {
    async fn find_coin(&self, name_or_symbol: &str) -> Option<CoinFact> {
        if name_or_symbol.trim().is_empty() {
            return None;
        }
        match self.db.find_coin(name_or_symbol).await {
            Ok(coin) => coin,
            Err(err) => {
                tracing::warn!("Coin lookup failed coin={} err={}", name_or_symbol, err);
                None
            }
        }
    }

    async fn latest_news(&self, limit: i64) -> Vec<NewsItem> {
        match self.db.latest_news(limit.max(0)).await {
            Ok(news) => news,
            Err(err) => {
                tracing::warn!("News lookup failed limit={} err={}", limit, err);
                Vec::new()
            }
        }
    }

    async fn is_reachable(&self) -> bool {
        self.db.ping().await
    }
}
