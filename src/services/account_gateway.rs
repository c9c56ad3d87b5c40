use crate::models::{OrderAck, OrderRejection, OrderRequest, PortfolioEntry, Wallet};
use serde_json::Value;

/// Authenticated access to the trading backend.
///
/// Every call forwards the caller's credential. Reads collapse any
/// transport or auth failure into `None`; only order submission reports
/// why it failed, so the reason can be shown to the user.
#[async_trait::async_trait]
pub trait AccountGateway: Send + Sync {
    async fn get_profile(&self, credential: &str) -> Option<Value>;

    async fn get_portfolio(&self, credential: &str) -> Option<Vec<PortfolioEntry>>;

    async fn get_wallet(&self, credential: &str) -> Option<Wallet>;

    async fn get_order_history(&self, credential: &str) -> Option<Value>;

    async fn get_wallet_transactions(&self, credential: &str) -> Option<Value>;

    async fn submit_order(
        &self,
        credential: &str,
        order: &OrderRequest,
    ) -> std::result::Result<OrderAck, OrderRejection>;
}

/// Finds the portfolio position for a coin, trying each identifier in turn.
pub fn find_holding<'a>(
    portfolio: &'a [PortfolioEntry],
    identifiers: &[&str],
) -> Option<&'a PortfolioEntry> {
    portfolio
        .iter()
        .find(|entry| identifiers.iter().any(|id| entry.holds(id)))
}
