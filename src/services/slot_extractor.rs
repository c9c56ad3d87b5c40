use crate::{
    error::Result,
    models::Intent,
    utils::{contains_any_keyword, tokenize_words},
};
use std::sync::Arc;

/// Text-understanding collaborator: coin mention and query intent.
#[async_trait::async_trait]
pub trait LanguageUnderstanding: Send + Sync {
    async fn extract_coin(&self, text: &str) -> Result<Option<String>>;

    async fn classify_intent(&self, text: &str, coin: Option<&str>) -> Result<Intent>;
}

/// Slots recovered from one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slots {
    /// Lower-cased coin identifier mentioned in this message.
    pub coin: Option<String>,
}

/// Wraps the NLU collaborator so its failures never reach the user.
#[derive(Clone)]
pub struct SlotExtractor {
    nlu: Arc<dyn LanguageUnderstanding>,
}

impl SlotExtractor {
    pub fn new(nlu: Arc<dyn LanguageUnderstanding>) -> Self {
        Self { nlu }
    }

    pub async fn extract(&self, text: &str) -> Slots {
        let coin = match self.nlu.extract_coin(text).await {
            Ok(coin) => coin
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
            Err(err) => {
                tracing::warn!("Coin extraction failed, continuing without coin: {}", err);
                None
            }
        };
        Slots { coin }
    }

    pub async fn classify_intent(&self, text: &str, coin: Option<&str>) -> Intent {
        match self.nlu.classify_intent(text, coin).await {
            Ok(intent) => intent,
            Err(err) => {
                tracing::warn!("Intent classification failed, using general: {}", err);
                Intent::General
            }
        }
    }
}

// ==================== KEYWORD NLU ====================

fn normalize_coin_alias(word: &str) -> Option<&'static str> {
    match word {
        "btc" | "bitcoin" | "xbt" => Some("bitcoin"),
        "eth" | "ether" | "ethereum" => Some("ethereum"),
        "sol" | "solana" => Some("solana"),
        "bnb" | "binancecoin" => Some("bnb"),
        "xrp" | "ripple" => Some("xrp"),
        "ada" | "cardano" => Some("cardano"),
        "doge" | "dogecoin" => Some("dogecoin"),
        "dot" | "polkadot" => Some("polkadot"),
        "ltc" | "litecoin" => Some("litecoin"),
        "avax" | "avalanche" => Some("avalanche"),
        "link" | "chainlink" => Some("chainlink"),
        "matic" | "polygon" => Some("polygon"),
        "trx" | "tron" => Some("tron"),
        "usdt" | "tether" => Some("tether"),
        "usdc" => Some("usd-coin"),
        "strk" | "starknet" => Some("starknet"),
        _ => None,
    }
}

const MARKET_CAP_KEYWORDS: &[&str] = &[
    "market cap",
    "marketcap",
    "market_cap",
    "mcap",
    "capitalization",
];
const VOLUME_KEYWORDS: &[&str] = &["volume", "traded"];
const CHANGE_KEYWORDS: &[&str] = &[
    "change",
    "changed",
    "performance",
    "perform",
    "gain",
    "drop",
    "24h",
    "up or down",
];
const PRICE_KEYWORDS: &[&str] = &["price", "cost", "how much is", "trading at", "value of"];

/// Zero-dependency NLU used when no remote service is configured.
#[derive(Debug, Default, Clone)]
pub struct KeywordNlu;

impl KeywordNlu {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl LanguageUnderstanding for KeywordNlu {
    async fn extract_coin(&self, text: &str) -> Result<Option<String>> {
        Ok(tokenize_words(text)
            .iter()
            .find_map(|word| normalize_coin_alias(word))
            .map(str::to_string))
    }

    async fn classify_intent(&self, text: &str, _coin: Option<&str>) -> Result<Intent> {
        let lower = text.to_lowercase();
        // first matching family wins
        let intent = if contains_any_keyword(&lower, MARKET_CAP_KEYWORDS) {
            Intent::MarketCap
        } else if contains_any_keyword(&lower, VOLUME_KEYWORDS) {
            Intent::Volume
        } else if contains_any_keyword(&lower, CHANGE_KEYWORDS) {
            Intent::Change
        } else if contains_any_keyword(&lower, PRICE_KEYWORDS) {
            Intent::Price
        } else {
            Intent::General
        };
        Ok(intent)
    }
}
