//! Settlement conserves the pools and never pays twice

use chrono::{DateTime, Duration, Utc};
use position_ledger::PositionLedger;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement::{pool_from_trades, OutcomePool, SettlementProcessor};
use types::errors::SettlementError;
use types::ids::{OrderId, UserId};
use types::market::{Market, MarketSpec, MarketType, OracleKind, Resolution};
use types::numeric::{Money, Price};
use types::order::Side;
use types::settlement::{IdempotencyKey, SettlementKind};
use types::trade::Trade;

fn market(outcomes: usize) -> Market {
    let opens_at = DateTime::parse_from_rfc3339("2026-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let spec = MarketSpec {
        title: "Which team lifts the cup".to_string(),
        description: None,
        category: Some("sport".to_string()),
        market_type: if outcomes == 2 {
            MarketType::Binary
        } else {
            MarketType::MultiOutcome
        },
        creator: UserId::new(),
        currency: "USD".to_string(),
        outcomes: (0..outcomes).map(|i| format!("Team {}", i)).collect(),
        opens_at,
        closes_at: opens_at + Duration::days(1),
        creator_fee_rate: dec!(0.025),
        min_bet: Money::from_u64(1),
        max_bet: Money::from_u64(10_000),
        resolution_source: "cup final".to_string(),
        oracle: OracleKind::Manual,
    };
    Market::create(&spec, 0).unwrap()
}

/// Close the market, stamp closing sequences and finalize the resolution
fn resolve(market: &mut Market, trades: &[Trade], resolution: Resolution) {
    market.close(10).unwrap();
    for outcome in &mut market.outcomes {
        let last = trades
            .iter()
            .filter(|t| t.outcome_id == outcome.outcome_id)
            .map(|t| t.sequence)
            .max()
            .unwrap_or(0);
        outcome.closing_sequence = Some(last);
    }
    market.request_resolution(resolution, None, 0, 11).unwrap();
    market.finalize(12).unwrap();
}

fn pools(market: &Market, trades: &[Trade]) -> Vec<OutcomePool> {
    market
        .outcome_ids()
        .map(|id| pool_from_trades(market, id, trades).unwrap())
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn trade(
    market: &Market,
    outcome: usize,
    sequence: u64,
    maker: UserId,
    taker: UserId,
    taker_side: Side,
    price: &str,
    quantity: u64,
) -> Trade {
    Trade::new(
        sequence,
        market.market_id,
        market.outcomes[outcome].outcome_id,
        OrderId::new(),
        OrderId::new(),
        maker,
        taker,
        taker_side,
        price.parse::<Price>().unwrap(),
        Money::from_u64(quantity),
        sequence as i64,
    )
}

#[test]
fn test_void_refunds_every_stake() {
    let mut market = market(2);
    let users: Vec<UserId> = (0..3).map(|_| UserId::new()).collect();
    let trades = vec![
        trade(&market, 0, 1, users[0], users[1], Side::Back, "0.40", 100),
        trade(&market, 0, 2, users[2], users[0], Side::Lay, "0.55", 20),
        trade(&market, 1, 1, users[1], users[2], Side::Back, "0.25", 40),
    ];
    let ledger = PositionLedger::new();
    ledger.apply(&trades).unwrap();
    resolve(
        &mut market,
        &trades,
        Resolution::Void {
            reason: "cup final cancelled".to_string(),
        },
    );

    let processor = SettlementProcessor::new();
    let positions = ledger.positions_for_market(market.market_id);
    let outcome = processor
        .settle(&market, &positions, &pools(&market, &trades), 13)
        .unwrap();

    assert_eq!(outcome.records.len(), 3);
    assert!(outcome.creator_fee.is_none());
    for record in &outcome.records {
        assert_eq!(record.kind, SettlementKind::Refund);
        let locked = ledger
            .user_positions(record.user_id, market.market_id)
            .unwrap()
            .unwrap()
            .total_locked;
        assert_eq!(record.payout, locked);
    }
    // Every unit traded was collateralised exactly once across both sides
    assert_eq!(outcome.total_payout().unwrap(), Money::from_u64(160));
}

#[test]
fn test_settling_twice_returns_same_records() {
    let mut market = market(2);
    let (backer, layer) = (UserId::new(), UserId::new());
    let trades = vec![trade(&market, 0, 1, layer, backer, Side::Back, "0.50", 200)];
    let ledger = PositionLedger::new();
    ledger.apply(&trades).unwrap();
    let winner = market.outcomes[0].outcome_id;
    resolve(&mut market, &trades, Resolution::Winner { outcome_id: winner });

    let processor = SettlementProcessor::new();
    let positions = ledger.positions_for_market(market.market_id);
    let pools = pools(&market, &trades);

    let first = processor.settle(&market, &positions, &pools, 13).unwrap();
    assert!(!first.replayed);
    let second = processor.settle(&market, &positions, &pools, 99).unwrap();
    assert!(second.replayed);
    assert_eq!(first.records, second.records);
    assert_eq!(processor.len(), 2);

    let fee = first.creator_fee.unwrap();
    assert_eq!(fee.amount, Money::try_new(dec!(2.5)).unwrap());
    assert_eq!(fee.user_id, market.creator);
    assert_eq!(
        fee.idempotency_key,
        IdempotencyKey::CreatorFee {
            market_id: market.market_id
        }
    );
    assert_eq!(second.creator_fee.unwrap().idempotency_key, fee.idempotency_key);
}

#[test]
fn test_announcement_is_independent_of_replay() {
    let mut market = market(2);
    let (backer, layer) = (UserId::new(), UserId::new());
    let trades = vec![trade(&market, 0, 1, layer, backer, Side::Back, "0.50", 200)];
    let ledger = PositionLedger::new();
    ledger.apply(&trades).unwrap();
    let winner = market.outcomes[0].outcome_id;
    resolve(&mut market, &trades, Resolution::Winner { outcome_id: winner });

    let processor = SettlementProcessor::new();
    let positions = ledger.positions_for_market(market.market_id);
    let pools = pools(&market, &trades);

    // Records written, payouts interrupted before the announcement
    processor.settle(&market, &positions, &pools, 13).unwrap();
    assert!(!processor.is_announced(market.market_id));

    let retried = processor.settle(&market, &positions, &pools, 14).unwrap();
    assert!(retried.replayed);
    assert!(processor.mark_announced(market.market_id));
    assert!(processor.is_announced(market.market_id));
    assert!(!processor.mark_announced(market.market_id));
}

#[test]
fn test_resolved_market_with_open_status_rejected() {
    let market = market(3);
    let processor = SettlementProcessor::new();
    let err = processor.settle(&market, &[], &[], 0).unwrap_err();
    assert!(matches!(err, SettlementError::NotSettleable { .. }));
    assert!(processor.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_settlement_conserves_pools(
        fills in prop::collection::vec((0usize..3, 0usize..5, 0usize..5, 1i64..100, 1u64..300, any::<bool>()), 1..40),
        winner in 0usize..3,
        void in prop::bool::weighted(0.25),
    ) {
        let mut market = market(3);
        let users: Vec<UserId> = (0..5).map(|_| UserId::new()).collect();
        let mut next_sequence = [1u64; 3];

        let trades: Vec<Trade> = fills
            .iter()
            .filter(|(_, maker, taker, ..)| maker != taker)
            .map(|&(outcome, maker, taker, cents, quantity, back)| {
                let sequence = next_sequence[outcome];
                next_sequence[outcome] += 1;
                Trade::new(
                    sequence,
                    market.market_id,
                    market.outcomes[outcome].outcome_id,
                    OrderId::new(),
                    OrderId::new(),
                    users[maker],
                    users[taker],
                    if back { Side::Back } else { Side::Lay },
                    Price::try_new(Decimal::new(cents, 2)).unwrap(),
                    Money::from_u64(quantity),
                    sequence as i64,
                )
            })
            .collect();

        let ledger = PositionLedger::new();
        ledger.apply(&trades).unwrap();
        let resolution = if void {
            Resolution::Void { reason: "abandoned".to_string() }
        } else {
            Resolution::Winner { outcome_id: market.outcomes[winner].outcome_id }
        };
        resolve(&mut market, &trades, resolution);

        let positions = ledger.positions_for_market(market.market_id);
        let pools = pools(&market, &trades);
        let outcome = SettlementProcessor::new()
            .settle(&market, &positions, &pools, 13)
            .unwrap();

        let paid = outcome.total_payout().unwrap();
        let fees = outcome.total_fees().unwrap();
        let locked = Money::checked_sum(positions.iter().map(|p| p.locked)).unwrap();
        let pooled = Money::checked_sum(pools.iter().map(|p| p.pool)).unwrap();

        if void {
            prop_assert_eq!(paid, locked);
            prop_assert!(fees.is_zero());
        } else {
            prop_assert_eq!(paid.checked_add(fees).unwrap(), pooled);
        }
        // Both sides together collateralise each matched unit exactly once
        prop_assert_eq!(locked, pooled);

        for record in &outcome.records {
            prop_assert_eq!(record.payout.checked_add(record.fee).unwrap(), record.gross_return);
            if record.net_profit <= Decimal::ZERO {
                prop_assert!(record.fee.is_zero());
            }
        }
    }
}
