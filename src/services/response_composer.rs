use crate::{
    constants::MAX_HISTORY_ENTRIES,
    error::Result,
    models::{HistoryEntry, PortfolioEntry, Speaker, Wallet},
};
use serde_json::Value;
use std::sync::Arc;

/// Generative model collaborator. Errors propagate to the caller.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

const SYSTEM_FRAMING: &str = "You are a knowledgeable cryptocurrency trading assistant for an exchange platform. \
Answer questions about crypto markets, trading and the user's own account. \
Never invent account data that is not provided below.";

const ANSWER_INSTRUCTION: &str =
    "Give a detailed and specific answer, using the account data above when it is relevant.";

/// Account data gathered for the prompt; absent blocks are left out.
#[derive(Debug, Clone, Default)]
pub struct AccountContext {
    pub profile: Option<Value>,
    pub portfolio: Option<Vec<PortfolioEntry>>,
    pub wallet: Option<Wallet>,
    pub orders: Option<Value>,
    pub transactions: Option<Value>,
}

impl AccountContext {
    pub fn is_empty(&self) -> bool {
        self.profile.is_none()
            && self.portfolio.is_none()
            && self.wallet.is_none()
            && self.orders.is_none()
            && self.transactions.is_none()
    }

    fn render(&self) -> String {
        let mut blocks = Vec::new();
        if let Some(profile) = &self.profile {
            blocks.push(format!("Profile: {}", profile));
        }
        if let Some(portfolio) = &self.portfolio {
            let holdings = if portfolio.is_empty() {
                "empty".to_string()
            } else {
                portfolio
                    .iter()
                    .map(|entry| {
                        format!(
                            "{} {} ({})",
                            entry.quantity,
                            entry.coin.symbol.to_ascii_uppercase(),
                            entry.coin.name
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            blocks.push(format!("Portfolio: {}", holdings));
        }
        if let Some(wallet) = &self.wallet {
            blocks.push(format!("Wallet balance: ${:.2}", wallet.balance));
        }
        if let Some(orders) = &self.orders {
            blocks.push(format!("Order history: {}", orders));
        }
        if let Some(transactions) = &self.transactions {
            blocks.push(format!("Wallet transactions: {}", transactions));
        }
        blocks.join("\n")
    }
}

/// Builds the fallback prompt and relays the model's answer.
#[derive(Clone)]
pub struct ResponseComposer {
    provider: Arc<dyn CompletionProvider>,
}

impl ResponseComposer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub async fn compose(
        &self,
        query: &str,
        history: &[HistoryEntry],
        account: Option<&AccountContext>,
    ) -> Result<String> {
        let prompt = build_prompt(query, history, account);
        let raw = self.provider.complete(&prompt).await?;
        Ok(normalize_reply(&raw))
    }
}

pub fn build_prompt(
    query: &str,
    history: &[HistoryEntry],
    account: Option<&AccountContext>,
) -> String {
    let mut sections = vec![SYSTEM_FRAMING.to_string()];

    let recent = &history[history.len().saturating_sub(MAX_HISTORY_ENTRIES)..];
    if !recent.is_empty() {
        let lines = recent
            .iter()
            .map(|entry| {
                let speaker = match entry.speaker {
                    Speaker::User => "User",
                    Speaker::Bot => "Assistant",
                };
                format!("{}: {}", speaker, entry.text)
            })
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("Conversation so far:\n{}", lines));
    }

    if let Some(account) = account.filter(|ctx| !ctx.is_empty()) {
        sections.push(format!("User account data:\n{}", account.render()));
    }

    sections.push(format!("User query: {}", query));
    sections.push(ANSWER_INSTRUCTION.to_string());
    sections.join("\n\n")
}

/// Flattens model output to a single plain line.
///
/// Heading markers, bold/italic markers and backticks are removed;
/// underscores inside a word (`market_cap`) are kept.
pub fn normalize_reply(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim_start().trim_start_matches('#'))
        .flat_map(str::split_whitespace)
        .map(strip_emphasis)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_emphasis(word: &str) -> String {
    let word = word
        .replace("**", "")
        .replace("__", "")
        .replace(['*', '`'], "");
    let word = word.trim_start_matches('_');
    match word.rfind(|c: char| c.is_alphanumeric()) {
        Some(last) => {
            let (body, tail) = word.split_at(last + 1);
            format!("{}{}", body, tail.replace('_', ""))
        }
        None => word.replace('_', ""),
    }
}
