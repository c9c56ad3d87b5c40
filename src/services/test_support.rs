// In-process doubles for the four collaborators, recording what they were asked.

use crate::{
    error::{AppError, Result},
    models::{account::PortfolioCoin, *},
    services::{
        account_gateway::AccountGateway,
        market_data::MarketDataGateway,
        response_composer::CompletionProvider,
        slot_extractor::{KeywordNlu, LanguageUnderstanding},
    },
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn coin(coin_id: &str, name: &str, symbol: &str, price: f64) -> CoinFact {
    CoinFact {
        coin_id: coin_id.to_string(),
        name: name.to_string(),
        symbol: symbol.to_string(),
        price,
        market_cap: price * 19_000_000.0,
        volume_24h: 35_000_000_000.0,
        change_24h: -1.234,
        last_updated: ts(0),
    }
}

pub fn bitcoin() -> CoinFact {
    coin("1", "Bitcoin", "btc", 42012.5)
}

pub fn ethereum() -> CoinFact {
    coin("2", "Ethereum", "eth", 2000.0)
}

pub fn news(title: &str, secs: i64) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        url: format!("https://news.example/{}", title.to_lowercase().replace(' ', "-")),
        source: "CoinWire".to_string(),
        published_at: ts(secs),
    }
}

pub fn holding(coin: &CoinFact, quantity: f64) -> PortfolioEntry {
    PortfolioEntry {
        coin: PortfolioCoin {
            id: coin.coin_id.clone(),
            name: coin.name.clone(),
            symbol: coin.symbol.clone(),
        },
        quantity,
    }
}

// ==================== MARKET ====================

#[derive(Default)]
pub struct FakeMarket {
    pub coins: Vec<CoinFact>,
    pub news: Vec<NewsItem>,
    pub calls: AtomicUsize,
}

impl FakeMarket {
    pub fn with_coins(coins: Vec<CoinFact>) -> Self {
        Self {
            coins,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MarketDataGateway for FakeMarket {
    async fn find_coin(&self, name_or_symbol: &str) -> Option<CoinFact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.coins
            .iter()
            .filter(|c| {
                c.name.eq_ignore_ascii_case(name_or_symbol)
                    || c.symbol.eq_ignore_ascii_case(name_or_symbol)
            })
            .max_by_key(|c| c.last_updated)
            .cloned()
    }

    async fn latest_news(&self, limit: i64) -> Vec<NewsItem> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut items = self.news.clone();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(limit.max(0) as usize);
        items
    }
}

// ==================== ACCOUNT ====================

pub struct FakeAccount {
    pub profile: Option<Value>,
    pub portfolio: Option<Vec<PortfolioEntry>>,
    pub wallet: Option<Wallet>,
    pub orders: Option<Value>,
    pub transactions: Option<Value>,
    pub order_result: std::result::Result<OrderAck, OrderRejection>,
    pub submitted: Mutex<Vec<OrderRequest>>,
    pub reads: Mutex<Vec<&'static str>>,
}

impl Default for FakeAccount {
    fn default() -> Self {
        Self {
            profile: None,
            portfolio: None,
            wallet: None,
            orders: None,
            transactions: None,
            order_result: Ok(OrderAck::default()),
            submitted: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
        }
    }
}

impl FakeAccount {
    pub fn with_wallet(balance: f64) -> Self {
        Self {
            wallet: Some(Wallet { balance }),
            ..Self::default()
        }
    }

    pub fn with_portfolio(portfolio: Vec<PortfolioEntry>) -> Self {
        Self {
            portfolio: Some(portfolio),
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<&'static str> {
        self.reads.lock().unwrap().clone()
    }

    fn record(&self, what: &'static str) {
        self.reads.lock().unwrap().push(what);
    }
}

#[async_trait::async_trait]
impl AccountGateway for FakeAccount {
    async fn get_profile(&self, _credential: &str) -> Option<Value> {
        self.record("profile");
        self.profile.clone()
    }

    async fn get_portfolio(&self, _credential: &str) -> Option<Vec<PortfolioEntry>> {
        self.record("portfolio");
        self.portfolio.clone()
    }

    async fn get_wallet(&self, _credential: &str) -> Option<Wallet> {
        self.record("wallet");
        self.wallet.clone()
    }

    async fn get_order_history(&self, _credential: &str) -> Option<Value> {
        self.record("orders");
        self.orders.clone()
    }

    async fn get_wallet_transactions(&self, _credential: &str) -> Option<Value> {
        self.record("transactions");
        self.transactions.clone()
    }

    async fn submit_order(
        &self,
        _credential: &str,
        order: &OrderRequest,
    ) -> std::result::Result<OrderAck, OrderRejection> {
        self.submitted.lock().unwrap().push(order.clone());
        self.order_result.clone()
    }
}

// ==================== NLU ====================

/// Keyword NLU that counts how often it is consulted.
#[derive(Default)]
pub struct CountingNlu {
    inner: KeywordNlu,
    pub calls: AtomicUsize,
}

impl CountingNlu {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LanguageUnderstanding for CountingNlu {
    async fn extract_coin(&self, text: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.extract_coin(text).await
    }

    async fn classify_intent(&self, text: &str, coin: Option<&str>) -> Result<Intent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.classify_intent(text, coin).await
    }
}

// ==================== LLM ====================

pub struct FakeLlm {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for FakeLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| AppError::ExternalAPI("model unavailable".to_string()))
    }
}
