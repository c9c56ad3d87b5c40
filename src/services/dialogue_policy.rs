//! Branch selection for an incoming chat message.
//!
//! Branches are tried in the fixed order of [`BRANCH_ORDER`]. The first one
//! whose predicate holds runs its handler; the handler either answers
//! (success or a specific rejection, final for the request) or declines, in
//! which case the next matching branch is tried. Only the generative
//! fallback can fail the request.

use crate::{
    constants::{
        ACCOUNT_KEYWORDS, BUY_KEYWORD, DOLLAR_KEYWORDS, HOLDINGS_KEYWORDS, NEWS_KEYWORDS,
        NEWS_LIMIT, NO_NEWS_REPLY, ORDER_HISTORY_KEYWORD, ORDER_QUANTITY_DECIMALS, SELL_KEYWORD,
        TRANSACTION_KEYWORD,
    },
    error::{AppError, Result},
    models::{CoinFact, HistoryEntry, Intent, OrderRequest, OrderType},
    services::{
        account_gateway::{find_holding, AccountGateway},
        market_data::MarketDataGateway,
        response_composer::{AccountContext, ResponseComposer},
        slot_extractor::SlotExtractor,
    },
    utils::{contains_any_keyword, extract_amount_from_text},
};
use futures_util::future::OptionFuture;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::sync::Arc;

/// One message plus everything the policy may consult about it.
#[derive(Debug, Clone)]
pub struct Turn<'a> {
    pub message: &'a str,
    lower: String,
    pub credential: Option<&'a str>,
    /// Coin from this message, else the remembered one.
    pub coin: Option<String>,
    pub history: &'a [HistoryEntry],
}

impl<'a> Turn<'a> {
    pub fn new(
        message: &'a str,
        credential: Option<&'a str>,
        coin: Option<String>,
        history: &'a [HistoryEntry],
    ) -> Self {
        Self {
            message,
            lower: message.to_lowercase(),
            credential: credential.filter(|c| !c.trim().is_empty()),
            coin,
            history,
        }
    }

    fn mentions_any(&self, keywords: &[&str]) -> bool {
        contains_any_keyword(&self.lower, keywords)
    }

    fn mentions(&self, keyword: &str) -> bool {
        self.lower.contains(keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    News,
    Trade,
    Holdings,
    MarketData,
    Generative,
}

/// Evaluation order. First match wins.
pub const BRANCH_ORDER: [Branch; 5] = [
    Branch::News,
    Branch::Trade,
    Branch::Holdings,
    Branch::MarketData,
    Branch::Generative,
];

impl Branch {
    pub fn matches(&self, turn: &Turn<'_>) -> bool {
        match self {
            Branch::News => turn.mentions_any(NEWS_KEYWORDS),
            Branch::Trade => {
                turn.credential.is_some()
                    && (turn.mentions(BUY_KEYWORD) || turn.mentions(SELL_KEYWORD))
            }
            Branch::Holdings => {
                turn.coin.is_some()
                    && turn.credential.is_some()
                    && turn.mentions_any(HOLDINGS_KEYWORDS)
            }
            Branch::MarketData => turn.coin.is_some(),
            Branch::Generative => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::News => "news",
            Branch::Trade => "trade",
            Branch::Holdings => "holdings",
            Branch::MarketData => "market_data",
            Branch::Generative => "generative",
        }
    }
}

enum BranchOutcome {
    Reply(String),
    Decline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyReply {
    pub branch: Branch,
    pub text: String,
}

#[derive(Clone)]
pub struct DialoguePolicy {
    market: Arc<dyn MarketDataGateway>,
    account: Arc<dyn AccountGateway>,
    extractor: SlotExtractor,
    composer: ResponseComposer,
}

impl DialoguePolicy {
    pub fn new(
        market: Arc<dyn MarketDataGateway>,
        account: Arc<dyn AccountGateway>,
        extractor: SlotExtractor,
        composer: ResponseComposer,
    ) -> Self {
        Self {
            market,
            account,
            extractor,
            composer,
        }
    }

    pub async fn respond(&self, turn: &Turn<'_>) -> Result<PolicyReply> {
        for branch in BRANCH_ORDER {
            if !branch.matches(turn) {
                continue;
            }
            tracing::debug!("Dialogue branch selected: {}", branch.as_str());
            match self.run(branch, turn).await? {
                BranchOutcome::Reply(text) => return Ok(PolicyReply { branch, text }),
                BranchOutcome::Decline => {
                    tracing::debug!("Branch {} declined; continuing", branch.as_str());
                }
            }
        }
        Err(AppError::Internal("No dialogue branch produced a reply".to_string()))
    }

    async fn run(&self, branch: Branch, turn: &Turn<'_>) -> Result<BranchOutcome> {
        let outcome = match branch {
            Branch::News => BranchOutcome::Reply(self.answer_news().await),
            Branch::Trade => BranchOutcome::Reply(self.answer_trade(turn).await),
            Branch::Holdings => BranchOutcome::Reply(self.answer_holdings(turn).await),
            Branch::MarketData => self.answer_market_data(turn).await,
            Branch::Generative => BranchOutcome::Reply(self.answer_generative(turn).await?),
        };
        Ok(outcome)
    }

    async fn answer_news(&self) -> String {
        let mut items = self.market.latest_news(NEWS_LIMIT).await;
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(NEWS_LIMIT as usize);
        if items.is_empty() {
            return NO_NEWS_REPLY.to_string();
        }

        let bullets = items
            .iter()
            .map(|item| {
                format!(
                    "• {} ({}, {}) {}",
                    item.title,
                    item.source,
                    item.published_at.format("%Y-%m-%d"),
                    item.url
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("Here are the latest crypto headlines:\n{}", bullets)
    }

    async fn answer_trade(&self, turn: &Turn<'_>) -> String {
        let Some(credential) = turn.credential else {
            return "Please log in to trade.".to_string();
        };
        let order_type = if turn.mentions(BUY_KEYWORD) {
            OrderType::Buy
        } else {
            OrderType::Sell
        };
        let verb = order_type.verb();

        let Some(amount) = extract_amount_from_text(turn.message) else {
            return format!(
                "How much would you like to {}? Please include an amount, for example \"{} 0.5 bitcoin\" or \"{} $100 worth of bitcoin\".",
                verb, verb, verb
            );
        };
        let in_dollars = turn.mentions_any(DOLLAR_KEYWORDS);

        let Some(coin) = turn.coin.as_deref() else {
            return format!(
                "Which coin would you like to {}? Please mention it by name or symbol.",
                verb
            );
        };
        let Some(fact) = self.market.find_coin(coin).await else {
            return no_data_reply(coin);
        };
        let symbol = fact.display_symbol();

        let plan = match plan_order(order_type, amount, in_dollars, fact.price) {
            Ok(plan) => plan,
            Err(rejection) => return rejection.message(&symbol),
        };

        let coin_id = match order_type {
            OrderType::Buy => {
                let Some(wallet) = self.account.get_wallet(credential).await else {
                    return "I couldn't retrieve your wallet balance right now, so no order was placed. Please try again shortly.".to_string();
                };
                if wallet.balance < plan.cost {
                    return format!(
                        "Insufficient balance. This order needs ${:.2} but your wallet balance is ${:.2}.",
                        plan.cost, wallet.balance
                    );
                }
                fact.coin_id.clone()
            }
            OrderType::Sell => {
                let portfolio = self.account.get_portfolio(credential).await.unwrap_or_default();
                let Some(holding) =
                    find_holding(&portfolio, &[coin, fact.name.as_str(), fact.symbol.as_str()])
                else {
                    return format!("You don't hold any {} to sell.", symbol);
                };
                if holding.quantity < plan.quantity_f64() {
                    return format!(
                        "Insufficient {} holdings. You have {} {} but tried to sell {}.",
                        symbol,
                        holding.quantity,
                        symbol,
                        plan.quantity.normalize()
                    );
                }
                holding.coin.id.clone()
            }
        };

        let order = OrderRequest {
            coin_id,
            quantity: plan.quantity,
            order_type,
        };
        tracing::info!(
            "Submitting {:?} order coin={} quantity={}",
            order.order_type,
            order.coin_id,
            order.quantity
        );
        match self.account.submit_order(credential, &order).await {
            Ok(ack) => {
                tracing::info!("Order accepted id={:?} status={:?}", ack.id, ack.status);
                let past = match order_type {
                    OrderType::Buy => "bought",
                    OrderType::Sell => "sold",
                };
                format!(
                    "Order placed: {} {} {} at about ${:.2} each (≈ ${:.2}).",
                    past,
                    plan.quantity.normalize(),
                    symbol,
                    fact.price,
                    plan.quantity_f64() * fact.price
                )
            }
            Err(rejection) => {
                tracing::info!(
                    "Order rejected upstream coin={} reason={}",
                    order.coin_id,
                    rejection.0
                );
                format!("Order failed: {}", rejection.0)
            }
        }
    }

    async fn answer_holdings(&self, turn: &Turn<'_>) -> String {
        let (Some(credential), Some(coin)) = (turn.credential, turn.coin.as_deref()) else {
            return "Please log in to check your holdings.".to_string();
        };

        let (portfolio, fact) = tokio::join!(
            self.account.get_portfolio(credential),
            self.market.find_coin(coin)
        );
        let portfolio = portfolio.unwrap_or_default();

        let mut identifiers = vec![coin];
        if let Some(fact) = &fact {
            identifiers.push(fact.name.as_str());
            identifiers.push(fact.symbol.as_str());
        }

        match find_holding(&portfolio, &identifiers) {
            Some(holding) => {
                let symbol = holding.coin.symbol.to_ascii_uppercase();
                match fact.filter(|f| f.price > 0.0) {
                    Some(fact) => format!(
                        "You hold {} {}, currently worth ${:.2}.",
                        holding.quantity,
                        symbol,
                        holding.quantity * fact.price
                    ),
                    None => format!("You hold {} {}.", holding.quantity, symbol),
                }
            }
            None => {
                let display = fact
                    .map(|f| f.display_symbol())
                    .unwrap_or_else(|| coin.to_string());
                format!("You don't hold any {}.", display)
            }
        }
    }

    async fn answer_market_data(&self, turn: &Turn<'_>) -> BranchOutcome {
        let Some(coin) = turn.coin.as_deref() else {
            return BranchOutcome::Decline;
        };
        let Some(fact) = self.market.find_coin(coin).await else {
            return BranchOutcome::Reply(no_data_reply(coin));
        };
        let intent = self
            .extractor
            .classify_intent(turn.message, Some(coin))
            .await;
        match format_market_answer(&fact, intent) {
            Some(text) => BranchOutcome::Reply(text),
            None => BranchOutcome::Decline,
        }
    }

    async fn answer_generative(&self, turn: &Turn<'_>) -> Result<String> {
        let account = match turn.credential {
            Some(credential) if turn.mentions_any(ACCOUNT_KEYWORDS) => {
                Some(self.gather_account_context(turn, credential).await)
            }
            _ => None,
        };
        self.composer
            .compose(turn.message, turn.history, account.as_ref())
            .await
    }

    async fn gather_account_context(&self, turn: &Turn<'_>, credential: &str) -> AccountContext {
        let orders: OptionFuture<_> = turn
            .mentions(ORDER_HISTORY_KEYWORD)
            .then(|| self.account.get_order_history(credential))
            .into();
        let transactions: OptionFuture<_> = turn
            .mentions(TRANSACTION_KEYWORD)
            .then(|| self.account.get_wallet_transactions(credential))
            .into();

        let (profile, portfolio, wallet, orders, transactions) = tokio::join!(
            self.account.get_profile(credential),
            self.account.get_portfolio(credential),
            self.account.get_wallet(credential),
            orders,
            transactions
        );

        AccountContext {
            profile,
            portfolio,
            wallet,
            orders: orders.flatten(),
            transactions: transactions.flatten(),
        }
    }
}

fn no_data_reply(coin: &str) -> String {
    format!("Sorry, I don't have any market data for {} right now.", coin)
}

/// Templated answer for a specific intent; `None` for `General`.
pub fn format_market_answer(fact: &CoinFact, intent: Intent) -> Option<String> {
    let symbol = fact.display_symbol();
    let text = match intent {
        Intent::Price => format!(
            "The current price of {} ({}) is ${:.2}.",
            fact.name, symbol, fact.price
        ),
        Intent::MarketCap => format!(
            "The market cap of {} ({}) is ${:.2}.",
            fact.name, symbol, fact.market_cap
        ),
        Intent::Volume => format!(
            "The 24h trading volume of {} ({}) is ${:.2}.",
            fact.name, symbol, fact.volume_24h
        ),
        Intent::Change => format!(
            "{} ({}) has changed {:+.2}% over the last 24 hours.",
            fact.name, symbol, fact.change_24h
        ),
        Intent::General => return None,
    };
    Some(text)
}

// ==================== ORDER PLANNING ====================

#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub quantity: Decimal,
    /// Wallet balance a BUY needs.
    pub cost: f64,
}

impl TradePlan {
    fn quantity_f64(&self) -> f64 {
        self.quantity.to_f64().unwrap_or(f64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRejection {
    PriceUnavailable,
    AmountTooSmall,
    AmountTooLarge,
}

impl PlanRejection {
    fn message(&self, symbol: &str) -> String {
        match self {
            PlanRejection::PriceUnavailable => format!(
                "I can't price {} right now, so no order was placed.",
                symbol
            ),
            PlanRejection::AmountTooSmall => format!(
                "That amount is too small to trade {}. Please use a larger amount.",
                symbol
            ),
            PlanRejection::AmountTooLarge => format!(
                "That amount is too large to trade {}. Please use a smaller amount.",
                symbol
            ),
        }
    }
}

/// Quantity and cost for an order.
///
/// A dollar-denominated BUY converts the amount at `price`; every other
/// order takes the amount as a coin quantity. Quantities are rounded to
/// eight fractional digits.
pub fn plan_order(
    order_type: OrderType,
    amount: f64,
    in_dollars: bool,
    price: f64,
) -> std::result::Result<TradePlan, PlanRejection> {
    if !price.is_finite() || price <= 0.0 {
        return Err(PlanRejection::PriceUnavailable);
    }

    let dollar_buy = order_type == OrderType::Buy && in_dollars;
    let raw_quantity = if dollar_buy { amount / price } else { amount };
    let quantity = Decimal::from_f64(raw_quantity)
        .ok_or(PlanRejection::AmountTooLarge)?
        .round_dp(ORDER_QUANTITY_DECIMALS);
    if !quantity.is_sign_positive() || quantity.is_zero() {
        return Err(PlanRejection::AmountTooSmall);
    }

    let cost = if in_dollars {
        amount
    } else {
        quantity.to_f64().unwrap_or(f64::MAX) * price
    };

    Ok(TradePlan { quantity, cost })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderRejection, Speaker};
    use crate::services::test_support::*;

    struct Harness {
        market: Arc<FakeMarket>,
        account: Arc<FakeAccount>,
        nlu: Arc<CountingNlu>,
        llm: Arc<FakeLlm>,
        policy: DialoguePolicy,
    }

    fn harness(market: FakeMarket, account: FakeAccount, llm: FakeLlm) -> Harness {
        let market = Arc::new(market);
        let account = Arc::new(account);
        let nlu = Arc::new(CountingNlu::default());
        let llm = Arc::new(llm);
        let policy = DialoguePolicy::new(
            market.clone(),
            account.clone(),
            SlotExtractor::new(nlu.clone()),
            ResponseComposer::new(llm.clone()),
        );
        Harness {
            market,
            account,
            nlu,
            llm,
            policy,
        }
    }

    fn default_harness() -> Harness {
        harness(
            FakeMarket::with_coins(vec![bitcoin(), ethereum()]),
            FakeAccount::default(),
            FakeLlm::replying("A **thoughtful**\nanswer."),
        )
    }

    fn select_branch(turn: &Turn<'_>) -> Branch {
        BRANCH_ORDER
            .into_iter()
            .find(|branch| branch.matches(turn))
            .unwrap_or(Branch::Generative)
    }

    fn turn<'a>(message: &'a str, credential: Option<&'a str>, coin: Option<&str>) -> Turn<'a> {
        Turn::new(message, credential, coin.map(str::to_string), &[])
    }

    // ---------- branch selection ----------

    #[test]
    fn news_outranks_everything() {
        let t = turn("buy bitcoin news", Some("tok"), Some("bitcoin"));
        assert_eq!(select_branch(&t), Branch::News);
    }

    #[test]
    fn trade_requires_credential() {
        let t = turn("buy 1 bitcoin", None, Some("bitcoin"));
        assert_eq!(select_branch(&t), Branch::MarketData);
        let t = turn("buy 1 bitcoin", Some("tok"), Some("bitcoin"));
        assert_eq!(select_branch(&t), Branch::Trade);
    }

    #[test]
    fn holdings_requires_coin_credential_and_keyword() {
        let t = turn("how much bitcoin do i have", Some("tok"), Some("bitcoin"));
        assert_eq!(select_branch(&t), Branch::Holdings);
        let t = turn("how much bitcoin do i have", None, Some("bitcoin"));
        assert_eq!(select_branch(&t), Branch::MarketData);
        let t = turn("what do i have?", Some("tok"), None);
        assert_eq!(select_branch(&t), Branch::Generative);
    }

    #[test]
    fn blank_credential_counts_as_absent() {
        let t = turn("sell 1 eth", Some("  "), Some("ethereum"));
        assert_eq!(select_branch(&t), Branch::MarketData);
    }

    // ---------- news ----------

    #[tokio::test]
    async fn news_lists_at_most_five_newest_first() {
        let mut market = FakeMarket::default();
        market.news = (0..8).map(|i| news(&format!("Story {}", i), i * 60)).collect();
        let h = harness(market, FakeAccount::default(), FakeLlm::failing());

        let reply = h
            .policy
            .respond(&turn("any news today?", None, None))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::News);
        let bullets: Vec<&str> = reply.text.lines().filter(|l| l.starts_with('•')).collect();
        assert_eq!(bullets.len(), 5);
        assert!(bullets[0].contains("Story 7"));
        assert!(bullets[4].contains("Story 3"));
    }

    #[tokio::test]
    async fn news_without_items_is_a_normal_reply() {
        let h = harness(FakeMarket::default(), FakeAccount::default(), FakeLlm::failing());
        let reply = h
            .policy
            .respond(&turn("latest headlines", None, None))
            .await
            .unwrap();
        assert_eq!(reply.text, NO_NEWS_REPLY);
    }

    // ---------- market data ----------

    #[tokio::test]
    async fn price_answer_uses_uppercase_symbol_and_two_decimals() {
        let h = default_harness();
        let reply = h
            .policy
            .respond(&turn("what is the price of btc", None, Some("bitcoin")))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::MarketData);
        assert!(reply.text.contains("BTC"));
        assert!(reply.text.contains("42012.50"));
        assert!(h.llm.prompts().is_empty());
    }

    #[test]
    fn market_templates_cover_specific_intents() {
        let fact = bitcoin();
        let answer = |intent| format_market_answer(&fact, intent).unwrap();
        assert!(answer(Intent::MarketCap).contains("market cap"));
        assert!(answer(Intent::Volume).contains("24h trading volume"));
        assert!(answer(Intent::Change).contains("-1.23%"));
        assert!(format_market_answer(&fact, Intent::General).is_none());
    }

    #[tokio::test]
    async fn unknown_coin_gets_no_data_reply() {
        let h = default_harness();
        let reply = h
            .policy
            .respond(&turn("price of dogecoin", None, Some("dogecoin")))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::MarketData);
        assert!(reply.text.contains("don't have any market data for dogecoin"));
    }

    #[tokio::test]
    async fn general_intent_falls_through_to_generative() {
        let h = default_harness();
        let reply = h
            .policy
            .respond(&turn("should I invest in bitcoin?", None, Some("bitcoin")))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::Generative);
        assert_eq!(reply.text, "A thoughtful answer.");
        assert_eq!(h.llm.prompts().len(), 1);
        assert_eq!(h.nlu.calls(), 1);
    }

    // ---------- trade ----------

    #[tokio::test]
    async fn trade_without_amount_prompts_for_one() {
        let h = default_harness();
        let reply = h
            .policy
            .respond(&turn("buy some bitcoin", Some("tok"), Some("bitcoin")))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::Trade);
        assert!(reply.text.starts_with("How much would you like to buy?"));
        assert!(h.account.submitted().is_empty());
    }

    #[tokio::test]
    async fn trade_without_coin_prompts_for_one() {
        let h = default_harness();
        let reply = h
            .policy
            .respond(&turn("sell 3", Some("tok"), None))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::Trade);
        assert!(reply.text.starts_with("Which coin would you like to sell?"));
        assert!(h.account.submitted().is_empty());
    }

    #[tokio::test]
    async fn trade_for_unknown_coin_gets_no_data_reply() {
        let h = default_harness();
        let reply = h
            .policy
            .respond(&turn("buy 3 doge", Some("tok"), Some("dogecoin")))
            .await
            .unwrap();
        assert!(reply.text.contains("don't have any market data"));
        assert!(h.account.submitted().is_empty());
    }

    #[tokio::test]
    async fn dollar_buy_over_balance_is_rejected_without_order() {
        let h = harness(
            FakeMarket::with_coins(vec![bitcoin()]),
            FakeAccount::with_wallet(100.0),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("buy 150 dollars of bitcoin", Some("tok"), Some("bitcoin")))
            .await
            .unwrap();
        assert!(reply.text.starts_with("Insufficient balance"));
        assert!(reply.text.contains("$150.00"));
        assert!(h.account.submitted().is_empty());
    }

    #[tokio::test]
    async fn dollar_buy_at_balance_submits_one_order() {
        let h = harness(
            FakeMarket::with_coins(vec![bitcoin()]),
            FakeAccount::with_wallet(100.0),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("buy $100 worth of bitcoin", Some("tok"), Some("bitcoin")))
            .await
            .unwrap();
        assert!(reply.text.starts_with("Order placed: bought"), "{}", reply.text);

        let submitted = h.account.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].order_type, OrderType::Buy);
        assert_eq!(submitted[0].coin_id, "1");
        // 100 / 42012.5 rounded to 8 places
        assert_eq!(submitted[0].quantity, Decimal::new(238024, 8));
    }

    #[tokio::test]
    async fn coin_quantity_buy_checks_quantity_times_price() {
        let h = harness(
            FakeMarket::with_coins(vec![ethereum()]),
            FakeAccount::with_wallet(3999.0),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("buy 2 eth", Some("tok"), Some("ethereum")))
            .await
            .unwrap();
        assert!(reply.text.contains("needs $4000.00"));
        assert!(h.account.submitted().is_empty());
    }

    #[tokio::test]
    async fn buy_with_unreadable_wallet_places_nothing() {
        let h = default_harness();
        let reply = h
            .policy
            .respond(&turn("buy 1 eth", Some("tok"), Some("ethereum")))
            .await
            .unwrap();
        assert!(reply.text.contains("couldn't retrieve your wallet"));
        assert!(h.account.submitted().is_empty());
    }

    #[tokio::test]
    async fn sell_of_unheld_coin_is_rejected() {
        let h = harness(
            FakeMarket::with_coins(vec![bitcoin(), ethereum()]),
            FakeAccount::with_portfolio(vec![holding(&ethereum(), 5.0)]),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("sell 1 btc", Some("tok"), Some("bitcoin")))
            .await
            .unwrap();
        assert_eq!(reply.text, "You don't hold any BTC to sell.");
        assert!(h.account.submitted().is_empty());
    }

    #[tokio::test]
    async fn sell_above_held_quantity_gets_distinct_rejection() {
        let h = harness(
            FakeMarket::with_coins(vec![ethereum()]),
            FakeAccount::with_portfolio(vec![holding(&ethereum(), 0.5)]),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("sell 2 eth", Some("tok"), Some("ethereum")))
            .await
            .unwrap();
        assert!(reply.text.starts_with("Insufficient ETH holdings"));
        assert!(h.account.submitted().is_empty());
    }

    #[tokio::test]
    async fn sell_within_holdings_uses_portfolio_coin_id() {
        let h = harness(
            FakeMarket::with_coins(vec![ethereum()]),
            FakeAccount::with_portfolio(vec![holding(&ethereum(), 3.0)]),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("sell 1.5 eth", Some("tok"), Some("ethereum")))
            .await
            .unwrap();
        assert!(reply.text.starts_with("Order placed: sold 1.5 ETH"), "{}", reply.text);
        let submitted = h.account.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].coin_id, "2");
        assert_eq!(submitted[0].order_type, OrderType::Sell);
    }

    #[tokio::test]
    async fn upstream_order_error_is_relayed() {
        let mut account = FakeAccount::with_wallet(1_000_000.0);
        account.order_result = Err(OrderRejection("Trading is paused for BTC".to_string()));
        let h = harness(FakeMarket::with_coins(vec![bitcoin()]), account, FakeLlm::failing());

        let reply = h
            .policy
            .respond(&turn("buy 1 btc", Some("tok"), Some("bitcoin")))
            .await
            .unwrap();
        assert_eq!(reply.text, "Order failed: Trading is paused for BTC");
        assert_eq!(h.account.submitted().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_orders_are_not_serialized() {
        // Both orders pass against the balance read at call time; nothing
        // stops the pair from jointly exceeding it.
        let h = harness(
            FakeMarket::with_coins(vec![bitcoin()]),
            FakeAccount::with_wallet(100.0),
            FakeLlm::failing(),
        );
        let first = turn("buy $80 of bitcoin", Some("tok"), Some("bitcoin"));
        let second = turn("buy $80 of bitcoin", Some("tok"), Some("bitcoin"));
        let (a, b) = tokio::join!(h.policy.respond(&first), h.policy.respond(&second));

        assert!(a.unwrap().text.starts_with("Order placed"));
        assert!(b.unwrap().text.starts_with("Order placed"));
        assert_eq!(h.account.submitted().len(), 2);
    }

    #[test]
    fn plan_order_rejects_unpriced_and_dust() {
        assert_eq!(
            plan_order(OrderType::Buy, 10.0, true, 0.0),
            Err(PlanRejection::PriceUnavailable)
        );
        assert_eq!(
            plan_order(OrderType::Buy, 0.000_000_001, false, 10.0),
            Err(PlanRejection::AmountTooSmall)
        );
    }

    #[test]
    fn plan_order_rejects_amounts_beyond_decimal_range() {
        assert_eq!(
            plan_order(OrderType::Sell, 1e30, false, 10.0),
            Err(PlanRejection::AmountTooLarge)
        );
        assert_eq!(
            plan_order(OrderType::Buy, f64::INFINITY, true, 10.0),
            Err(PlanRejection::AmountTooLarge)
        );
    }

    #[tokio::test]
    async fn oversized_trade_amount_is_not_called_too_small() {
        let h = harness(
            FakeMarket::with_coins(vec![bitcoin()]),
            FakeAccount::with_portfolio(vec![holding(&bitcoin(), 1.0)]),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn(
                "sell 123456789012345678901234567890 btc",
                Some("tok"),
                Some("bitcoin"),
            ))
            .await
            .unwrap();
        assert_eq!(
            reply.text,
            "That amount is too large to trade BTC. Please use a smaller amount."
        );
        assert!(h.account.submitted().is_empty());
    }

    #[test]
    fn plan_order_dollar_sell_keeps_amount_as_quantity() {
        let plan = plan_order(OrderType::Sell, 50.0, true, 2000.0).unwrap();
        assert_eq!(plan.quantity, Decimal::new(50, 0));
    }

    // ---------- holdings ----------

    #[tokio::test]
    async fn holdings_report_quantity_and_value() {
        let h = harness(
            FakeMarket::with_coins(vec![ethereum()]),
            FakeAccount::with_portfolio(vec![holding(&ethereum(), 1.5)]),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("how much eth do i have", Some("tok"), Some("ethereum")))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::Holdings);
        assert_eq!(reply.text, "You hold 1.5 ETH, currently worth $3000.00.");
    }

    #[tokio::test]
    async fn holdings_without_price_omit_value() {
        let h = harness(
            FakeMarket::default(),
            FakeAccount::with_portfolio(vec![holding(&ethereum(), 1.5)]),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("what's my position in eth", Some("tok"), Some("ethereum")))
            .await
            .unwrap();
        assert_eq!(reply.text, "You hold 1.5 ETH.");
    }

    #[tokio::test]
    async fn holdings_for_unheld_coin_say_so() {
        let h = harness(
            FakeMarket::with_coins(vec![bitcoin()]),
            FakeAccount::with_portfolio(vec![]),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("do i own any bitcoin", Some("tok"), Some("bitcoin")))
            .await
            .unwrap();
        assert_eq!(reply.text, "You don't hold any BTC.");
    }

    #[tokio::test]
    async fn holdings_with_unreadable_portfolio_report_nothing_held() {
        let h = harness(
            FakeMarket::with_coins(vec![bitcoin()]),
            FakeAccount::default(),
            FakeLlm::failing(),
        );
        let reply = h
            .policy
            .respond(&turn("how much bitcoin do i have", Some("tok"), Some("bitcoin")))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::Holdings);
        assert_eq!(reply.text, "You don't hold any BTC.");
        assert_eq!(h.account.reads(), vec!["portfolio"]);
        assert!(h.llm.prompts().is_empty());
    }

    // ---------- generative ----------

    #[tokio::test]
    async fn generative_without_account_keywords_reads_nothing() {
        let h = default_harness();
        let reply = h
            .policy
            .respond(&turn("explain proof of stake", Some("tok"), None))
            .await
            .unwrap();
        assert_eq!(reply.branch, Branch::Generative);
        assert!(h.account.reads().is_empty());
        assert!(!h.llm.prompts()[0].contains("User account data"));
    }

    #[tokio::test]
    async fn generative_account_keywords_without_credential_read_nothing() {
        let h = default_harness();
        h.policy
            .respond(&turn("summarize my portfolio", None, None))
            .await
            .unwrap();
        assert!(h.account.reads().is_empty());
    }

    #[tokio::test]
    async fn generative_gathers_account_context_and_tolerates_gaps() {
        let mut account = FakeAccount::with_wallet(250.0);
        account.profile = None;
        account.orders = Some(serde_json::json!([{"id": 9, "orderType": "BUY"}]));
        let h = harness(FakeMarket::default(), account, FakeLlm::replying("ok"));

        let history = vec![
            HistoryEntry {
                speaker: Speaker::User,
                text: "hi".to_string(),
            },
            HistoryEntry {
                speaker: Speaker::Bot,
                text: "hello".to_string(),
            },
        ];
        let t = Turn::new("show my wallet and recent orders", Some("tok"), None, &history);
        let reply = h.policy.respond(&t).await.unwrap();
        assert_eq!(reply.text, "ok");

        let mut reads = h.account.reads();
        reads.sort();
        assert_eq!(reads, vec!["orders", "portfolio", "profile", "wallet"]);

        let prompt = &h.llm.prompts()[0];
        assert!(prompt.contains("User: hi"));
        assert!(prompt.contains("Wallet balance: $250.00"));
        assert!(prompt.contains("Order history:"));
        assert!(!prompt.contains("Profile:"));
        assert!(prompt.contains("User query: show my wallet and recent orders"));
    }

    #[tokio::test]
    async fn generative_transaction_keyword_adds_wallet_transactions() {
        let mut account = FakeAccount::with_wallet(80.0);
        account.transactions = Some(serde_json::json!([{"type": "DEPOSIT", "amount": 50}]));
        let h = harness(FakeMarket::default(), account, FakeLlm::replying("ok"));

        h.policy
            .respond(&turn("list my last transaction", Some("tok"), None))
            .await
            .unwrap();

        let mut reads = h.account.reads();
        reads.sort();
        assert_eq!(reads, vec!["portfolio", "profile", "transactions", "wallet"]);
        let prompt = &h.llm.prompts()[0];
        assert!(prompt.contains("Wallet transactions: "));
        assert!(prompt.contains("DEPOSIT"));
        assert!(!prompt.contains("Order history:"));
    }

    #[tokio::test]
    async fn generative_failure_is_an_error() {
        let h = harness(FakeMarket::default(), FakeAccount::default(), FakeLlm::failing());
        let result = h.policy.respond(&turn("tell me a joke", None, None)).await;
        assert!(matches!(result, Err(AppError::ExternalAPI(_))));
        assert_eq!(h.market.calls(), 0);
    }
}
