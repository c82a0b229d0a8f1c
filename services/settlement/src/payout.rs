//! Payout computation
//!
//! `on_market_resolved` is pure: given the market, its positions and the
//! per-outcome pools it returns one record per user. Any delivery mechanism
//! can drive it; the processor makes repeated delivery harmless.
//!
//! Resolved markets: a user's gross return is their pro-rata share of each
//! outcome's pool on the side that won it,
//!
//! ```text
//! gross = Σ winning  back_qty / total_back × pool
//!       + Σ losing   lay_qty  / total_lay  × pool
//! ```
//!
//! net profit is `gross - locked`, the creator fee is `rate × max(profit, 0)`
//! and the payout is `gross - fee`. Void markets refund the locked stake.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use types::errors::{MoneyError, SettlementError};
use types::ids::{OutcomeId, UserId};
use types::market::{Market, MarketStatus};
use types::numeric::Money;
use types::position::Position;
use types::settlement::{SettlementKind, SettlementRecord};
use types::trade::Trade;

/// Matched totals of one outcome, counted up to its closing sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomePool {
    pub outcome_id: OutcomeId,
    pub is_winner: bool,
    /// Total matched quantity; what the winning side shares
    pub pool: Money,
    pub total_back: Money,
    pub total_lay: Money,
    pub closing_sequence: u64,
}

/// Fold an outcome's trade log into its pool
///
/// Every trade past the closing sequence is an integrity failure.
pub fn pool_from_trades<'a, I>(
    market: &Market,
    outcome_id: OutcomeId,
    trades: I,
) -> Result<OutcomePool, SettlementError>
where
    I: IntoIterator<Item = &'a Trade>,
{
    let outcome = market.outcome(&outcome_id).ok_or_else(|| not_settleable(market))?;
    let closing_sequence = outcome.closing_sequence.ok_or_else(|| not_settleable(market))?;

    let mut pool = Money::zero();
    for trade in trades {
        if trade.outcome_id != outcome_id {
            continue;
        }
        if trade.sequence > closing_sequence {
            return Err(SettlementError::TradeAfterClose {
                outcome_id: outcome_id.to_string(),
                sequence: trade.sequence,
                cutoff: closing_sequence,
            });
        }
        pool = pool
            .checked_add(trade.quantity)
            .map_err(|source| arithmetic(market, source))?;
    }

    // Each trade adds its quantity to one back leg and one lay leg
    Ok(OutcomePool {
        outcome_id,
        is_winner: outcome.is_winner.unwrap_or(false),
        pool,
        total_back: pool,
        total_lay: pool,
        closing_sequence,
    })
}

#[derive(Debug, Default)]
struct UserTotals {
    gross: Money,
    locked: Money,
}

/// Compute every user's settlement record for a resolved or void market
pub fn on_market_resolved(
    market: &Market,
    positions: &[Position],
    pools: &[OutcomePool],
    settled_at: i64,
) -> Result<Vec<SettlementRecord>, SettlementError> {
    let kind = match market.status {
        MarketStatus::Resolved => SettlementKind::Payout,
        MarketStatus::Void => SettlementKind::Refund,
        _ => return Err(not_settleable(market)),
    };

    let mut totals: BTreeMap<UserId, UserTotals> = BTreeMap::new();
    for position in positions.iter().filter(|p| p.market_id == market.market_id) {
        let pool = pools
            .iter()
            .find(|pool| pool.outcome_id == position.outcome_id)
            .ok_or_else(|| not_settleable(market))?;
        if position.last_sequence > pool.closing_sequence {
            return Err(SettlementError::TradeAfterClose {
                outcome_id: position.outcome_id.to_string(),
                sequence: position.last_sequence,
                cutoff: pool.closing_sequence,
            });
        }

        let entry = totals.entry(position.user_id).or_default();
        entry.locked = entry
            .locked
            .checked_add(position.locked)
            .map_err(|source| arithmetic(market, source))?;

        if kind == SettlementKind::Payout {
            let share = winning_share(position, pool).map_err(|source| arithmetic(market, source))?;
            entry.gross = entry
                .gross
                .checked_add(share)
                .map_err(|source| arithmetic(market, source))?;
        }
    }

    totals
        .into_iter()
        .map(|(user_id, totals)| match kind {
            SettlementKind::Refund => Ok(SettlementRecord {
                market_id: market.market_id,
                user_id,
                kind,
                gross_return: totals.locked,
                payout: totals.locked,
                fee: Money::zero(),
                stake_consumed: totals.locked,
                net_profit: Decimal::ZERO,
                settled_at,
            }),
            SettlementKind::Payout => payout_record(market, user_id, totals, settled_at)
                .map_err(|source| arithmetic(market, source)),
        })
        .collect()
}

/// Pro-rata share of the pool for the leg that won this outcome
fn winning_share(position: &Position, pool: &OutcomePool) -> Result<Money, MoneyError> {
    let (quantity, total) = if pool.is_winner {
        (position.back.quantity, pool.total_back)
    } else {
        (position.lay.quantity, pool.total_lay)
    };
    if quantity.is_zero() {
        return Ok(Money::zero());
    }
    pool.pool.mul_div(quantity, total)
}

fn payout_record(
    market: &Market,
    user_id: UserId,
    totals: UserTotals,
    settled_at: i64,
) -> Result<SettlementRecord, MoneyError> {
    let net_profit = totals.gross.as_decimal() - totals.locked.as_decimal();
    let fee = if net_profit > Decimal::ZERO {
        Money::try_new(net_profit)?.mul_rate(market.creator_fee_rate)?
    } else {
        Money::zero()
    };
    let payout = totals.gross.checked_sub(fee)?;

    Ok(SettlementRecord {
        market_id: market.market_id,
        user_id,
        kind: SettlementKind::Payout,
        gross_return: totals.gross,
        payout,
        fee,
        stake_consumed: totals.locked,
        net_profit,
        settled_at,
    })
}

fn not_settleable(market: &Market) -> SettlementError {
    SettlementError::NotSettleable {
        market_id: market.market_id.to_string(),
        status: market.status.to_string(),
    }
}

fn arithmetic(market: &Market, source: MoneyError) -> SettlementError {
    SettlementError::Arithmetic {
        market_id: market.market_id.to_string(),
        source,
    }
}
