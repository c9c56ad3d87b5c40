use sqlx::{postgres::PgPoolOptions, PgPool};
use crate::{config::Config, error::Result, models::*};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        // migrations live at the crate root: ./migrations
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// ==================== MARKET QUERIES ====================
impl Database {
    /// Most recent row whose name or symbol matches, ignoring case.
    pub async fn find_coin(&self, name_or_symbol: &str) -> Result<Option<CoinFact>> {
        let coin = sqlx::query_as::<_, CoinFact>(
            "SELECT coin_id, name, symbol,
                    price::FLOAT8 AS price,
                    market_cap::FLOAT8 AS market_cap,
                    volume_24h::FLOAT8 AS volume_24h,
                    change_24h::FLOAT8 AS change_24h,
                    last_updated
             FROM coin_data
             WHERE LOWER(name) = LOWER($1) OR LOWER(symbol) = LOWER($1)
             ORDER BY last_updated DESC
             LIMIT 1",
        )
        .bind(name_or_symbol.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(coin)
    }

    pub async fn latest_news(&self, limit: i64) -> Result<Vec<NewsItem>> {
        let news = sqlx::query_as::<_, NewsItem>(
            "SELECT title, url, source, published_at
             FROM crypto_news
             ORDER BY published_at DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(news)
    }
}
