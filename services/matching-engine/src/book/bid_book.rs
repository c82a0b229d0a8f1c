//! Back-side (bid) order book
//!
//! Maintains back orders sorted by price descending (best bid first).
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::{Money, Price};

use super::price_level::{LevelEntry, PriceLevel};

/// Back (bid) side order book
///
/// The highest price is the best bid. At each price level, orders are
/// maintained in FIFO order.
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, price: Price, entry: LevelEntry) {
        self.levels.entry(price).or_default().insert(entry);
    }

    /// Remove an order; returns its remaining quantity if it was resting
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<Money> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove(order_id)?;
        // Remove empty price levels to keep book clean
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(removed)
    }

    /// Take `fill` from the front order at `price`
    pub(crate) fn fill(&mut self, price: Price, order_id: &OrderId, fill: Money) -> Option<Money> {
        let level = self.levels.get_mut(&price)?;
        let remaining = level.fill_front(order_id, fill)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(remaining)
    }

    /// Get the best bid (highest price) with its aggregate quantity
    pub fn best_bid(&self) -> Option<(Price, Money)> {
        // BTreeMap iter is ascending, so the best bid is the last key
        self.levels
            .iter()
            .next_back()
            .map(|(price, level)| (*price, level.total_quantity()))
    }

    pub fn best_bid_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    /// Levels in matching priority (highest price first)
    pub fn levels(&self) -> impl Iterator<Item = (Price, &PriceLevel)> + '_ {
        self.levels.iter().rev().map(|(price, level)| (*price, level))
    }

    /// Lazy (price, aggregate quantity) over the top `depth` levels
    pub fn depth(&self, depth: usize) -> impl Iterator<Item = (Price, Money)> + '_ {
        self.levels()
            .take(depth)
            .map(|(price, level)| (price, level.total_quantity()))
    }

    pub fn depth_snapshot(&self, depth: usize) -> Vec<(Price, Money)> {
        self.depth(depth).collect()
    }

    pub fn total_quantity(&self) -> Money {
        Money::checked_sum(self.levels.values().map(PriceLevel::total_quantity))
            .unwrap_or(Money::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}
