// src/models/mod.rs
pub mod account;
pub mod chat;
pub mod market;

// Re-export commonly used types so other modules can use `crate::models::X`
pub use account::{OrderAck, OrderRejection, OrderRequest, OrderType, PortfolioEntry, Wallet};
pub use chat::{ChatReply, ChatRequest, HistoryEntry, Intent, Speaker, UserSession};
pub use market::{CoinFact, NewsItem};
