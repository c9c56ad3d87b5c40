use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Backend ids arrive as JSON strings or numbers; both are kept as text.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

// ==================== PORTFOLIO ====================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioCoin {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub coin: PortfolioCoin,
    pub quantity: f64,
}

impl PortfolioEntry {
    pub fn holds(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        !identifier.is_empty()
            && (self.coin.id.eq_ignore_ascii_case(identifier)
                || self.coin.name.eq_ignore_ascii_case(identifier)
                || self.coin.symbol.eq_ignore_ascii_case(identifier))
    }
}

// ==================== WALLET ====================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: f64,
}

// ==================== ORDERS ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Buy,
    Sell,
}

impl OrderType {
    pub fn verb(&self) -> &'static str {
        match self {
            OrderType::Buy => "buy",
            OrderType::Sell => "sell",
        }
    }
}

/// Body of `POST orders` on the trading backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub coin_id: String,
    pub quantity: Decimal,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderAck {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Order submission failure; the text is relayed to the user unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRejection(pub String);
