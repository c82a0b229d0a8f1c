//! End-to-end scenarios through the trading core

use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use trading_core::{InMemoryWallet, MarketEvent, MarketFilter, TradingConfig, TradingCore, Wallet};
use types::errors::{ErrorCategory, MarketError, OrderError, TradingError, WalletError};
use types::ids::{OrderId, OutcomeId, ReservationId, UserId};
use types::market::{Market, MarketSpec, MarketStatus, MarketType, OracleKind, Resolution};
use types::numeric::{Money, Price};
use types::order::{CancelReason, NewOrder, OrderStatus, Side, TimeInForce};
use types::settlement::{PayoutInstruction, SettlementKind};
use types::time::ManualClock;

const USD: &str = "USD";

struct Harness {
    core: TradingCore,
    wallet: Arc<InMemoryWallet>,
    clock: Arc<ManualClock>,
    market: Market,
    creator: UserId,
}

fn opens_at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-07-01T18:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn spec(creator: UserId, outcomes: &[&str]) -> MarketSpec {
    MarketSpec {
        title: "Who wins the final".to_string(),
        description: Some("Settled on the official result after extra time".to_string()),
        category: Some("football".to_string()),
        market_type: if outcomes.len() == 2 {
            MarketType::Binary
        } else {
            MarketType::MultiOutcome
        },
        creator,
        currency: USD.to_string(),
        outcomes: outcomes.iter().map(|s| s.to_string()).collect(),
        opens_at: opens_at(),
        closes_at: opens_at() + Duration::hours(2),
        creator_fee_rate: dec!(0.025),
        min_bet: Money::from_u64(1),
        max_bet: Money::from_u64(1000),
        resolution_source: "federation website".to_string(),
        oracle: OracleKind::Manual,
    }
}

fn harness_with(config: TradingConfig) -> Harness {
    let wallet = Arc::new(InMemoryWallet::new());
    let clock = Arc::new(ManualClock::new(opens_at() + Duration::minutes(1)));
    let core = TradingCore::new(config, wallet.clone(), clock.clone()).unwrap();
    let creator = UserId::new();
    let market = core.create_market(&spec(creator, &["Home", "Away"])).unwrap();
    Harness {
        core,
        wallet,
        clock,
        market,
        creator,
    }
}

fn harness() -> Harness {
    harness_with(TradingConfig::default())
}

impl Harness {
    fn user(&self) -> UserId {
        let user = UserId::new();
        self.wallet.deposit(user, USD, Money::from_u64(1000)).unwrap();
        user
    }

    fn outcome(&self, index: usize) -> OutcomeId {
        self.market.outcomes[index].outcome_id
    }

    fn limit(&self, user: UserId, outcome: usize, side: Side, price: &str, quantity: u64) -> Result<trading_core::Placement, TradingError> {
        self.core.place_order(NewOrder::limit(
            user,
            self.outcome(outcome),
            side,
            p(price),
            Money::from_u64(quantity),
        ))
    }

    fn market_order(&self, user: UserId, outcome: usize, side: Side, quantity: u64) -> Result<trading_core::Placement, TradingError> {
        self.core.place_order(NewOrder::market(
            user,
            self.outcome(outcome),
            side,
            Money::from_u64(quantity),
        ))
    }

    fn available(&self, user: UserId) -> Money {
        self.wallet.balance(user, USD).available
    }
}

fn p(price: &str) -> Price {
    price.parse().unwrap()
}

fn m(amount: &str) -> Money {
    amount.parse().unwrap()
}

#[test]
fn test_market_order_sweeps_equal_price_levels_in_arrival_order() {
    let h = harness();
    let (first, second, taker) = (h.user(), h.user(), h.user());
    let first_ask = h.limit(first, 0, Side::Lay, "0.40", 100).unwrap().order;
    let second_ask = h.limit(second, 0, Side::Lay, "0.40", 50).unwrap().order;

    let placement = h.market_order(taker, 0, Side::Back, 120).unwrap();
    assert!(placement.is_filled());
    let fills: Vec<(OrderId, Money)> = placement
        .trades
        .iter()
        .map(|t| (t.maker_order_id, t.quantity))
        .collect();
    assert_eq!(
        fills,
        vec![
            (first_ask.order_id, Money::from_u64(100)),
            (second_ask.order_id, Money::from_u64(20)),
        ]
    );

    let depth = h.core.get_order_book_depth(h.outcome(0), 5).unwrap();
    assert_eq!(depth.asks, vec![(p("0.40"), Money::from_u64(30))]);
    assert!(depth.bids.is_empty());

    // Taker reserved the full 120 for a market order, kept 0.40 × 120
    let taker_balance = h.wallet.balance(taker, USD);
    assert_eq!(taker_balance.locked, m("48"));
    assert_eq!(taker_balance.reserved, Money::zero());
    assert_eq!(taker_balance.available, m("952"));

    // Filled maker released nothing extra; partial maker still holds 0.60 × 30
    assert_eq!(h.wallet.balance(first, USD).locked, m("60"));
    assert_eq!(h.wallet.balance(first, USD).reserved, Money::zero());
    assert_eq!(h.wallet.balance(second, USD).locked, m("12"));
    assert_eq!(h.wallet.balance(second, USD).reserved, m("18"));

    let market = h.core.get_market(h.market.market_id).unwrap();
    assert_eq!(market.total_volume, Money::from_u64(120));
    assert_eq!(market.participant_count, 3);
    assert_eq!(market.outcomes[0].current_price, Some(p("0.40")));
    assert_eq!(market.outcomes[1].current_price, None);
}

#[test]
fn test_rejections_leave_no_side_effects() {
    let h = harness();
    let user = h.user();
    h.limit(user, 0, Side::Lay, "0.50", 10).unwrap();
    let before = h.wallet.balance(user, USD);

    let err = h.market_order(user, 0, Side::Back, 5).unwrap_err();
    assert!(matches!(err, TradingError::Order(OrderError::SelfMatchNotAllowed { .. })));
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(h.wallet.balance(user, USD), before);

    let err = h.market_order(user, 1, Side::Back, 5).unwrap_err();
    assert!(matches!(err, TradingError::Order(OrderError::InsufficientLiquidity { .. })));
    assert_eq!(err.category(), ErrorCategory::Resource);
    assert_eq!(h.wallet.balance(user, USD), before);

    let err = h.limit(user, 1, Side::Back, "0.50", 5000).unwrap_err();
    assert!(matches!(err, TradingError::Order(OrderError::StakeOutOfRange { .. })));

    let depth = h.core.get_order_book_depth(h.outcome(1), 5).unwrap();
    assert!(depth.bids.is_empty() && depth.asks.is_empty());
}

#[test]
fn test_insufficient_balance_never_reaches_the_book() {
    let h = harness();
    let poor = UserId::new();
    h.wallet.deposit(poor, USD, Money::from_u64(10)).unwrap();

    let err = h.limit(poor, 0, Side::Back, "0.50", 100).unwrap_err();
    assert!(matches!(err, TradingError::Wallet(WalletError::InsufficientBalance { .. })));
    assert_eq!(err.category(), ErrorCategory::Resource);
    assert!(!err.is_retryable());
    assert!(h.core.get_order_book_depth(h.outcome(0), 5).unwrap().bids.is_empty());
    assert_eq!(h.available(poor), Money::from_u64(10));
}

#[test]
fn test_ioc_without_liquidity_is_cancelled_not_rejected() {
    let h = harness();
    let user = h.user();
    let request = NewOrder::limit(user, h.outcome(0), Side::Back, p("0.30"), Money::from_u64(10))
        .with_time_in_force(TimeInForce::IOC);
    let placement = h.core.place_order(request).unwrap();

    assert_eq!(placement.order.status, OrderStatus::Cancelled(CancelReason::Unfilled));
    assert!(placement.trades.is_empty());
    assert_eq!(h.available(user), Money::from_u64(1000));
}

#[test]
fn test_fok_short_of_liquidity_is_rejected() {
    let h = harness();
    let (maker, taker) = (h.user(), h.user());
    h.limit(maker, 0, Side::Lay, "0.30", 5).unwrap();

    let request = NewOrder::limit(taker, h.outcome(0), Side::Back, p("0.30"), Money::from_u64(10))
        .with_time_in_force(TimeInForce::FOK);
    let err = h.core.place_order(request).unwrap_err();
    assert!(matches!(err, TradingError::Order(OrderError::InsufficientLiquidity { .. })));
    assert_eq!(h.available(taker), Money::from_u64(1000));
    let depth = h.core.get_order_book_depth(h.outcome(0), 5).unwrap();
    assert_eq!(depth.asks, vec![(p("0.30"), Money::from_u64(5))]);
}

#[test]
fn test_cancel_only_by_owner_and_only_once() {
    let h = harness();
    let (owner, other) = (h.user(), h.user());
    let order = h.limit(owner, 1, Side::Back, "0.25", 40).unwrap().order;
    assert_eq!(h.available(owner), m("990"));

    let err = h.core.cancel_order(order.order_id, other).unwrap_err();
    assert!(matches!(err, TradingError::Order(OrderError::NotOwner { .. })));

    let cancelled = h.core.cancel_order(order.order_id, owner).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled(CancelReason::UserRequested));
    assert_eq!(h.available(owner), Money::from_u64(1000));

    let err = h.core.cancel_order(order.order_id, owner).unwrap_err();
    assert!(matches!(err, TradingError::Order(OrderError::NotFound { .. })));
    assert_eq!(err.category(), ErrorCategory::Integrity);

    let archived = h.core.get_order(order.order_id).unwrap();
    assert_eq!(archived.status, cancelled.status);
}

#[test]
fn test_deadline_closes_market_and_releases_resting_orders() {
    let h = harness();
    let user = h.user();
    let resting = h.limit(user, 0, Side::Back, "0.60", 50).unwrap().order;
    assert_eq!(h.wallet.balance(user, USD).reserved, m("30"));

    h.clock.advance(Duration::hours(3));
    let err = h.limit(user, 1, Side::Back, "0.60", 10).unwrap_err();
    assert!(matches!(err, TradingError::Market(MarketError::Closed { .. })));
    assert_eq!(err.category(), ErrorCategory::Validation);

    let market = h.core.get_market(h.market.market_id).unwrap();
    assert_eq!(market.status, MarketStatus::Closed);
    assert!(market.outcomes.iter().all(|o| o.closing_sequence == Some(0)));

    let order = h.core.get_order(resting.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled(CancelReason::MarketClosed));
    assert_eq!(h.wallet.balance(user, USD).reserved, Money::zero());
    assert_eq!(h.available(user), Money::from_u64(1000));

    // Nothing left for the sweeper
    assert!(h.core.close_expired_markets().unwrap().is_empty());
}

#[test]
fn test_close_expired_markets_sweeps() {
    let h = harness();
    assert!(h.core.close_expired_markets().unwrap().is_empty());
    h.clock.advance(Duration::hours(2));
    assert_eq!(h.core.close_expired_markets().unwrap(), vec![h.market.market_id]);
}

#[test]
fn test_only_creator_or_admin_closes() {
    let h = harness();
    let stranger = h.user();
    let err = h.core.close_market(h.market.market_id, stranger).unwrap_err();
    assert!(matches!(err, TradingError::Market(MarketError::NotAuthorized { .. })));

    h.core.grant_admin(stranger);
    h.core.close_market(h.market.market_id, stranger).unwrap();

    let err = h.core.close_market(h.market.market_id, h.creator).unwrap_err();
    assert!(matches!(err, TradingError::Market(MarketError::InvalidTransition { .. })));
}

#[test]
fn test_resolved_market_pays_winners_less_creator_fee() {
    let h = harness();
    let mut events = h.core.subscribe(h.market.market_id).unwrap();
    let (alice, bob) = (h.user(), h.user());

    h.limit(bob, 0, Side::Lay, "0.50", 200).unwrap();
    let placement = h.market_order(alice, 0, Side::Back, 200).unwrap();
    assert_eq!(placement.trades.len(), 1);

    let position = h.core.get_position(alice, h.market.market_id).unwrap().unwrap();
    assert_eq!(position.total_locked, m("100"));

    h.core.close_market(h.market.market_id, h.creator).unwrap();
    h.core
        .request_resolution(
            h.market.market_id,
            Resolution::Winner {
                outcome_id: h.outcome(0),
            },
            Some(h.creator),
        )
        .unwrap();
    assert_eq!(h.core.finalize_resolution(h.market.market_id).unwrap(), MarketStatus::Resolved);

    let first = h.core.settle_market(h.market.market_id).unwrap();
    assert!(!first.replayed);
    let alice_record = first.records.iter().find(|r| r.user_id == alice).unwrap();
    assert_eq!(alice_record.kind, SettlementKind::Payout);
    assert_eq!(alice_record.gross_return, m("200"));
    assert_eq!(alice_record.fee, m("2.50"));
    assert_eq!(alice_record.payout, m("197.50"));
    assert_eq!(alice_record.net_profit, dec!(100));

    assert_eq!(h.available(alice), m("1097.50"));
    assert_eq!(h.available(bob), m("900"));
    assert_eq!(h.available(h.creator), m("2.50"));
    let total = h.wallet.total(USD).unwrap();
    assert_eq!(total.total().unwrap(), Money::from_u64(2000));
    assert_eq!(total.locked, Money::zero());

    // A second delivery changes nothing
    let second = h.core.settle_market(h.market.market_id).unwrap();
    assert!(second.replayed);
    assert_eq!(second.records, first.records);
    assert_eq!(h.available(alice), m("1097.50"));
    assert_eq!(h.core.settlement_records(h.market.market_id).len(), 2);

    let market = h.core.get_market(h.market.market_id).unwrap();
    assert_eq!(market.outcomes[0].is_winner, Some(true));
    assert_eq!(market.outcomes[1].is_winner, Some(false));

    let received: Vec<MarketEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    let transitions: Vec<(MarketStatus, MarketStatus)> = received
        .iter()
        .filter_map(|e| match e {
            MarketEvent::StatusChanged(s) => Some((s.from, s.to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (MarketStatus::Open, MarketStatus::Closed),
            (MarketStatus::Closed, MarketStatus::Resolving),
            (MarketStatus::Resolving, MarketStatus::Resolved),
        ]
    );
    assert_eq!(received.iter().filter(|e| matches!(e, MarketEvent::TradeExecuted(_))).count(), 1);
    assert_eq!(received.iter().filter(|e| matches!(e, MarketEvent::Settled(_))).count(), 1);
}

#[test]
fn test_void_after_three_trades_refunds_every_stake() {
    let h = harness();
    let users: Vec<UserId> = (0..3).map(|_| h.user()).collect();

    h.limit(users[0], 0, Side::Lay, "0.40", 100).unwrap();
    h.market_order(users[1], 0, Side::Back, 60).unwrap();
    h.market_order(users[2], 0, Side::Back, 20).unwrap();
    h.limit(users[2], 1, Side::Back, "0.70", 30).unwrap();
    h.market_order(users[1], 1, Side::Lay, 30).unwrap();

    let trades: usize = (0..2)
        .map(|i| h.core.get_trade_history(h.outcome(i), 0).unwrap().count())
        .sum();
    assert_eq!(trades, 3);

    h.core.close_market(h.market.market_id, h.creator).unwrap();
    h.core
        .request_resolution(
            h.market.market_id,
            Resolution::Void {
                reason: "match abandoned".to_string(),
            },
            None,
        )
        .unwrap();
    assert_eq!(h.core.finalize_resolution(h.market.market_id).unwrap(), MarketStatus::Void);

    let outcome = h.core.settle_market(h.market.market_id).unwrap();
    assert_eq!(outcome.records.len(), 3);
    assert!(outcome.creator_fee.is_none());
    for record in &outcome.records {
        assert_eq!(record.kind, SettlementKind::Refund);
        assert_eq!(record.fee, Money::zero());
        assert_eq!(record.payout, record.stake_consumed);
    }
    for user in &users {
        let balance = h.wallet.balance(*user, USD);
        assert_eq!(balance.available, Money::from_u64(1000));
        assert_eq!(balance.locked, Money::zero());
        assert_eq!(balance.reserved, Money::zero());
    }
}

#[test]
fn test_dispute_window_and_dispute() {
    let config = TradingConfig {
        dispute_window_secs: 3600,
        ..TradingConfig::default()
    };
    let h = harness_with(config);
    h.core.close_market(h.market.market_id, h.creator).unwrap();

    let err = h.core.settle_market(h.market.market_id).unwrap_err();
    assert!(matches!(err, TradingError::Settlement(_)));

    h.core
        .request_resolution(
            h.market.market_id,
            Resolution::Winner {
                outcome_id: h.outcome(1),
            },
            None,
        )
        .unwrap();
    let err = h.core.finalize_resolution(h.market.market_id).unwrap_err();
    assert!(matches!(err, TradingError::Market(MarketError::DisputeWindowOpen { .. })));

    h.core.dispute_resolution(h.market.market_id, "wrong score reported").unwrap();
    let market = h.core.get_market(h.market.market_id).unwrap();
    assert_eq!(market.status, MarketStatus::Void);

    // Terminal
    let err = h.core.finalize_resolution(h.market.market_id).unwrap_err();
    assert!(matches!(err, TradingError::Market(MarketError::InvalidTransition { .. })));
}

#[test]
fn test_resolution_with_foreign_outcome_rejected() {
    let h = harness();
    h.core.close_market(h.market.market_id, h.creator).unwrap();
    let err = h
        .core
        .request_resolution(
            h.market.market_id,
            Resolution::Winner {
                outcome_id: OutcomeId::new(),
            },
            None,
        )
        .unwrap_err();
    assert!(matches!(err, TradingError::Market(MarketError::OutcomeNotInMarket { .. })));
}

#[test]
fn test_trade_history_cursor_resumes() {
    let h = harness();
    let (maker, taker) = (h.user(), h.user());
    h.limit(maker, 0, Side::Lay, "0.55", 100).unwrap();
    for _ in 0..5 {
        h.market_order(taker, 0, Side::Back, 10).unwrap();
    }

    let mut cursor = h.core.get_trade_history(h.outcome(0), 0).unwrap();
    let first_two: Vec<u64> = cursor.by_ref().take(2).map(|t| t.sequence).collect();
    assert_eq!(first_two, vec![1, 2]);

    let rest: Vec<u64> = h
        .core
        .get_trade_history(h.outcome(0), cursor.position())
        .unwrap()
        .map(|t| t.sequence)
        .collect();
    assert_eq!(rest, vec![3, 4, 5]);
    assert_eq!(h.core.get_trade_history(h.outcome(1), 0).unwrap().count(), 0);
}

#[test]
fn test_listing_and_categories() {
    let h = harness();
    let other = h
        .core
        .create_market(&MarketSpec {
            title: "Top scorer".to_string(),
            category: Some("golden boot".to_string()),
            ..spec(h.creator, &["Striker A", "Striker B", "Striker C"])
        })
        .unwrap();
    let (maker, taker) = (h.user(), h.user());
    h.core
        .place_order(NewOrder::limit(maker, other.outcomes[2].outcome_id, Side::Lay, p("0.20"), Money::from_u64(10)))
        .unwrap();
    h.core
        .place_order(NewOrder::market(taker, other.outcomes[2].outcome_id, Side::Back, Money::from_u64(10)))
        .unwrap();

    let listed = h.core.list_markets(&MarketFilter::default()).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].market_id, other.market_id);
    assert_eq!(listed[0].total_volume, Money::from_u64(10));

    let categories = h.core.market_categories();
    assert_eq!(
        categories,
        vec![("football".to_string(), 1), ("golden boot".to_string(), 1)]
    );

    let err = h.core.get_market(types::ids::MarketId::new()).unwrap_err();
    assert!(matches!(err, TradingError::Market(MarketError::NotFound { .. })));
}

/// Fails the first payout it sees, then behaves like the wrapped wallet
struct FlakyWallet {
    inner: Arc<InMemoryWallet>,
    failed_once: AtomicBool,
}

impl Wallet for FlakyWallet {
    fn reserve(&self, user_id: UserId, currency: &str, amount: Money) -> Result<ReservationId, WalletError> {
        self.inner.reserve(user_id, currency, amount)
    }

    fn release(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError> {
        self.inner.release(reservation_id, amount)
    }

    fn lock_to_position(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError> {
        self.inner.lock_to_position(reservation_id, amount)
    }

    fn unlock_from_position(&self, reservation_id: ReservationId, amount: Money) -> Result<(), WalletError> {
        self.inner.unlock_from_position(reservation_id, amount)
    }

    fn payout(&self, instruction: &PayoutInstruction) -> Result<bool, WalletError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(WalletError::Unavailable {
                reason: "payment rail timed out".to_string(),
            });
        }
        self.inner.payout(instruction)
    }
}

#[test]
fn test_settled_event_survives_a_failed_payout() {
    let inner = Arc::new(InMemoryWallet::new());
    let wallet = Arc::new(FlakyWallet {
        inner: inner.clone(),
        failed_once: AtomicBool::new(false),
    });
    let clock = Arc::new(ManualClock::new(opens_at() + Duration::minutes(1)));
    let core = TradingCore::new(TradingConfig::default(), wallet, clock).unwrap();
    let creator = UserId::new();
    let market = core.create_market(&spec(creator, &["Home", "Away"])).unwrap();
    let mut events = core.subscribe(market.market_id).unwrap();

    let (alice, bob) = (UserId::new(), UserId::new());
    inner.deposit(alice, USD, Money::from_u64(1000)).unwrap();
    inner.deposit(bob, USD, Money::from_u64(1000)).unwrap();
    let home = market.outcomes[0].outcome_id;
    core.place_order(NewOrder::limit(bob, home, Side::Lay, p("0.50"), Money::from_u64(200)))
        .unwrap();
    core.place_order(NewOrder::market(alice, home, Side::Back, Money::from_u64(200)))
        .unwrap();

    core.close_market(market.market_id, creator).unwrap();
    core.request_resolution(market.market_id, Resolution::Winner { outcome_id: home }, Some(creator))
        .unwrap();
    core.finalize_resolution(market.market_id).unwrap();

    let err = core.settle_market(market.market_id).unwrap_err();
    assert!(matches!(err, TradingError::Wallet(WalletError::Unavailable { .. })));

    // The records were stored on the first attempt, so the retry is a replay
    let retried = core.settle_market(market.market_id).unwrap();
    assert!(retried.replayed);
    assert_eq!(inner.balance(alice, USD).available, m("1097.50"));
    core.settle_market(market.market_id).unwrap();

    let settled: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            MarketEvent::Settled(settled) => Some(settled),
            _ => None,
        })
        .collect();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].kind, SettlementKind::Payout);
    assert_eq!(settled[0].total_payout, m("197.50"));
    assert_eq!(settled[0].total_fees, m("2.50"));
}

#[test]
fn test_trending_markets_cover_the_last_day() {
    let h = harness();
    h.clock.advance(Duration::hours(23));
    let derby = h
        .core
        .create_market(&MarketSpec {
            title: "Derby winner".to_string(),
            closes_at: opens_at() + Duration::days(30),
            ..spec(h.creator, &["Reds", "Blues"])
        })
        .unwrap();
    let (maker, taker) = (h.user(), h.user());
    let reds = derby.outcomes[0].outcome_id;
    h.core
        .place_order(NewOrder::limit(maker, reds, Side::Lay, p("0.20"), Money::from_u64(10)))
        .unwrap();
    h.core
        .place_order(NewOrder::market(taker, reds, Side::Back, Money::from_u64(10)))
        .unwrap();

    let trending: Vec<_> = h
        .core
        .trending_markets(trading_core::DEFAULT_TRENDING_LIMIT)
        .unwrap()
        .into_iter()
        .map(|m| m.market_id)
        .collect();
    assert_eq!(trending, vec![derby.market_id, h.market.market_id]);
    assert_eq!(h.core.trending_markets(1).unwrap().len(), 1);

    // The final was listed a day and an hour ago
    h.clock.advance(Duration::hours(2));
    let trending = h.core.trending_markets(10).unwrap();
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0].market_id, derby.market_id);
    assert_eq!(trending[0].total_volume, Money::from_u64(10));
}
