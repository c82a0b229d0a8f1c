//! Shared per-market state
//!
//! Lock order is always outcome shards (in outcome order) before the market
//! record. Placing an order touches one shard; only the close barrier and
//! resolution take all of them.

use dashmap::DashSet;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use matching_engine::MatchingEngine;
use types::errors::TradingError;
use types::ids::{OutcomeId, UserId};
use types::market::Market;

use crate::trade_log::TradeLog;

/// One outcome: its engine behind an exclusive lock and its trade log
#[derive(Debug)]
pub struct OutcomeShard {
    pub outcome_id: OutcomeId,
    engine: Mutex<MatchingEngine>,
    pub trades: Arc<TradeLog>,
}

impl OutcomeShard {
    pub fn new(engine: MatchingEngine) -> Self {
        Self {
            outcome_id: engine.outcome_id(),
            engine: Mutex::new(engine),
            trades: Arc::new(TradeLog::new()),
        }
    }

    /// Acquire the engine, retrying timed-out attempts `retries` times
    pub fn lock(&self, timeout: Duration, retries: u32) -> Result<MutexGuard<'_, MatchingEngine>, TradingError> {
        let attempts = retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.try_lock(timeout) {
                Ok(guard) => return Ok(guard),
                Err(err) => {
                    warn!(outcome_id = %self.outcome_id, attempt, error = %err, "Outcome lock timed out");
                }
            }
        }
        Err(TradingError::Busy {
            outcome_id: self.outcome_id.to_string(),
            attempts,
        })
    }

    fn try_lock(&self, timeout: Duration) -> Result<MutexGuard<'_, MatchingEngine>, TradingError> {
        self.engine
            .try_lock_for(timeout)
            .ok_or_else(|| TradingError::LockTimeout {
                outcome_id: self.outcome_id.to_string(),
            })
    }
}

#[derive(Debug)]
pub struct MarketState {
    pub market: RwLock<Market>,
    /// Same order as `market.outcomes`
    pub shards: Vec<OutcomeShard>,
    pub participants: DashSet<UserId>,
}

impl MarketState {
    pub fn new(market: Market, shards: Vec<OutcomeShard>) -> Self {
        Self {
            market: RwLock::new(market),
            shards,
            participants: DashSet::new(),
        }
    }

    pub fn shard(&self, outcome_id: &OutcomeId) -> Option<&OutcomeShard> {
        self.shards.iter().find(|s| &s.outcome_id == outcome_id)
    }

    /// Every shard guard, in outcome order
    pub fn lock_all(
        &self,
        timeout: Duration,
        retries: u32,
    ) -> Result<Vec<MutexGuard<'_, MatchingEngine>>, TradingError> {
        self.shards.iter().map(|s| s.lock(timeout, retries)).collect()
    }
}
