//! Position ledger
//!
//! Folds trades into per-(user, outcome) positions in two steps: `prepare`
//! computes the updated positions from a read snapshot with checked
//! arithmetic, `commit` writes them. Callers hold the outcome's lock across
//! both steps, and keys include the outcome, so concurrent commits from
//! different outcomes never touch the same entry.

use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use types::ids::{MarketId, OutcomeId, UserId};
use types::order::Side;
use types::position::{MarketPosition, Position, PositionKey, PositionStatus};
use types::trade::Trade;

use crate::error::LedgerError;

/// Positions staged by `prepare`, not yet visible to readers
#[derive(Debug, Clone, PartialEq)]
pub struct StagedPositions {
    positions: Vec<Position>,
    trades: usize,
}

impl StagedPositions {
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Single writer of positions
#[derive(Debug, Default)]
pub struct PositionLedger {
    positions: RwLock<BTreeMap<PositionKey, Position>>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the positions `trades` produce without publishing them
    ///
    /// Trades must be in sequence order per outcome. A trade at or below a
    /// position's last applied sequence is rejected as a replay.
    pub fn prepare(&self, trades: &[Trade]) -> Result<StagedPositions, LedgerError> {
        let current = self.positions.read();
        let mut staged: BTreeMap<PositionKey, Position> = BTreeMap::new();

        for trade in trades {
            for (side, user_id) in [(Side::Back, trade.backer()), (Side::Lay, trade.layer())] {
                let key = PositionKey {
                    market_id: trade.market_id,
                    user_id,
                    outcome_id: trade.outcome_id,
                };
                let position = match staged.entry(key) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => entry.insert(
                        current
                            .get(&key)
                            .cloned()
                            .unwrap_or_else(|| Position::new(key, trade.executed_at)),
                    ),
                };

                if position.status == PositionStatus::Settled {
                    return Err(LedgerError::AlreadySettled {
                        market_id: key.market_id,
                        user_id: key.user_id,
                    });
                }
                if trade.sequence <= position.last_sequence {
                    return Err(LedgerError::OutOfOrder {
                        outcome_id: trade.outcome_id,
                        sequence: trade.sequence,
                        last_applied: position.last_sequence,
                    });
                }

                let collateral = trade.collateral_for(side)?;
                position.apply_fill(
                    side,
                    trade.price,
                    trade.quantity,
                    collateral,
                    trade.sequence,
                    trade.executed_at,
                )?;
            }
        }

        Ok(StagedPositions {
            positions: staged.into_values().collect(),
            trades: trades.len(),
        })
    }

    /// Publish staged positions
    pub fn commit(&self, staged: StagedPositions) {
        if staged.is_empty() {
            return;
        }
        let mut positions = self.positions.write();
        debug!(
            positions = staged.positions.len(),
            trades = staged.trades,
            "Committing positions"
        );
        for position in staged.positions {
            positions.insert(position.key(), position);
        }
    }

    /// `prepare` then `commit`
    pub fn apply(&self, trades: &[Trade]) -> Result<(), LedgerError> {
        let staged = self.prepare(trades)?;
        self.commit(staged);
        Ok(())
    }

    pub fn position(&self, key: &PositionKey) -> Option<Position> {
        self.positions.read().get(key).cloned()
    }

    /// Every position in a market, ordered by user then outcome
    pub fn positions_for_market(&self, market_id: MarketId) -> Vec<Position> {
        let (start, end) = market_range(market_id);
        self.positions
            .read()
            .range(start..=end)
            .map(|(_, position)| position.clone())
            .collect()
    }

    /// A user's positions across the outcomes of one market
    pub fn user_positions(
        &self,
        user_id: UserId,
        market_id: MarketId,
    ) -> Result<Option<MarketPosition>, LedgerError> {
        let start = PositionKey {
            market_id,
            user_id,
            outcome_id: OutcomeId::from_uuid(Uuid::nil()),
        };
        let end = PositionKey {
            outcome_id: OutcomeId::from_uuid(Uuid::from_u128(u128::MAX)),
            ..start
        };
        let positions: Vec<Position> = self
            .positions
            .read()
            .range(start..=end)
            .map(|(_, position)| position.clone())
            .collect();
        if positions.is_empty() {
            return Ok(None);
        }
        Ok(Some(MarketPosition::from_positions(user_id, market_id, positions)?))
    }

    /// Rebuild a ledger from the trade log
    ///
    /// Trades are applied per outcome in sequence order, whatever order they
    /// arrive in.
    pub fn replay<'a, I>(trades: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = &'a Trade>,
    {
        let mut ordered: Vec<&Trade> = trades.into_iter().collect();
        ordered.sort_by_key(|trade| (trade.market_id, trade.outcome_id, trade.sequence));

        let ledger = Self::new();
        for trade in ordered {
            ledger.apply(std::slice::from_ref(trade))?;
        }
        Ok(ledger)
    }

    /// Every position, in key order
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions.read().values().cloned().collect()
    }

    /// Zero every position in a market once its settlement is recorded
    pub fn settle_market(&self, market_id: MarketId, timestamp: i64) -> usize {
        let (start, end) = market_range(market_id);
        let mut positions = self.positions.write();
        let mut settled = 0;
        for (_, position) in positions.range_mut(start..=end) {
            if position.status == PositionStatus::Open {
                position.settle(timestamp);
                settled += 1;
            }
        }
        info!(market_id = %market_id, positions = settled, "Positions settled");
        settled
    }

    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }
}

fn market_range(market_id: MarketId) -> (PositionKey, PositionKey) {
    let start = PositionKey {
        market_id,
        user_id: UserId::from_uuid(Uuid::nil()),
        outcome_id: OutcomeId::from_uuid(Uuid::nil()),
    };
    let end = PositionKey {
        market_id,
        user_id: UserId::from_uuid(Uuid::from_u128(u128::MAX)),
        outcome_id: OutcomeId::from_uuid(Uuid::from_u128(u128::MAX)),
    };
    (start, end)
}
