/// Application constants

// API version
pub const API_VERSION: &str = "v1";

// Conversation memory
pub const MAX_HISTORY_TURNS: usize = 10;
pub const MAX_HISTORY_ENTRIES: usize = MAX_HISTORY_TURNS * 2;

// News
pub const NEWS_LIMIT: i64 = 5;

// Orders
pub const ORDER_QUANTITY_DECIMALS: u32 = 8;

// Branch keyword sets (matched against the lower-cased message)
pub const NEWS_KEYWORDS: &[&str] = &["news", "headlines", "latest news"];
pub const BUY_KEYWORD: &str = "buy";
pub const SELL_KEYWORD: &str = "sell";
pub const DOLLAR_KEYWORDS: &[&str] = &["dollar", "usd", "worth", "$"];
pub const HOLDINGS_KEYWORDS: &[&str] = &[
    "holding",
    "do i have",
    "do i own",
    "i own",
    "my position",
];
pub const ACCOUNT_KEYWORDS: &[&str] = &["profile", "portfolio", "orders", "wallet", "transaction"];
pub const ORDER_HISTORY_KEYWORD: &str = "orders";
pub const TRANSACTION_KEYWORD: &str = "transaction";

// Fixed replies
pub const NO_NEWS_REPLY: &str = "No news available at the moment.";
