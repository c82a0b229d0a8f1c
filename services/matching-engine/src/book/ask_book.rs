//! Lay-side (ask) order book
//!
//! Maintains lay orders sorted by price ascending (best ask first).

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::{Money, Price};

use super::price_level::{LevelEntry, PriceLevel};

/// Lay (ask) side order book
#[derive(Debug, Clone, Default)]
pub struct AskBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, price: Price, entry: LevelEntry) {
        self.levels.entry(price).or_default().insert(entry);
    }

    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<Money> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(removed)
    }

    pub(crate) fn fill(&mut self, price: Price, order_id: &OrderId, fill: Money) -> Option<Money> {
        let level = self.levels.get_mut(&price)?;
        let remaining = level.fill_front(order_id, fill)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(remaining)
    }

    /// Get the best ask (lowest price) with its aggregate quantity
    pub fn best_ask(&self) -> Option<(Price, Money)> {
        self.levels
            .iter()
            .next()
            .map(|(price, level)| (*price, level.total_quantity()))
    }

    pub fn best_ask_price(&self) -> Option<Price> {
        self.levels.keys().next().copied()
    }

    /// Levels in matching priority (lowest price first)
    pub fn levels(&self) -> impl Iterator<Item = (Price, &PriceLevel)> + '_ {
        self.levels.iter().map(|(price, level)| (*price, level))
    }

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
