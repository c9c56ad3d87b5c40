use crate::constants::MAX_HISTORY_ENTRIES;
use serde::{Deserialize, Serialize};

// ==================== HTTP ====================
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

// ==================== INTENT ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Price,
    MarketCap,
    Volume,
    Change,
    General,
}

impl Intent {
    /// Anything outside the known labels is `General`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "price" => Intent::Price,
            "market_cap" | "marketcap" => Intent::MarketCap,
            "volume" => Intent::Volume,
            "change" => Intent::Change,
            _ => Intent::General,
        }
    }
}

// ==================== SESSION ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub history: Vec<HistoryEntry>,
    pub last_coin: Option<String>,
}

impl UserSession {
    /// Appends one exchange and drops the oldest entries past the cap.
    pub fn record_turn(&mut self, user_text: &str, bot_text: &str) {
        self.history.push(HistoryEntry {
            speaker: Speaker::User,
            text: user_text.to_string(),
        });
        self.history.push(HistoryEntry {
            speaker: Speaker::Bot,
            text: bot_text.to_string(),
        });
        if self.history.len() > MAX_HISTORY_ENTRIES {
            let overflow = self.history.len() - MAX_HISTORY_ENTRIES;
            self.history.drain(..overflow);
        }
    }
}
