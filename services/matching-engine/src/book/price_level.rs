//! Price level implementation with FIFO queue
//!
//! A price level contains all resting orders at one price. Orders are kept
//! in arrival-sequence order, which is the time half of price-time priority.

use std::collections::VecDeque;
use types::ids::{OrderId, UserId};
use types::numeric::Money;

/// A price level containing orders at a specific price
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// Queue of orders at this price level (FIFO order)
    orders: VecDeque<LevelEntry>,
    /// Total remaining quantity at this level
    total_quantity: Money,
}

/// Entry in the price level queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelEntry {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub sequence: u64,
    pub remaining_quantity: Money,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total_quantity: Money::zero(),
        }
    }

    /// Append an order behind everything already resting here
    pub fn insert(&mut self, entry: LevelEntry) {
        self.total_quantity = self
            .total_quantity
            .checked_add(entry.remaining_quantity)
            .unwrap_or(self.total_quantity);
        self.orders.push_back(entry);
    }

    /// Remove an order from the queue by OrderId
    ///
    /// Returns the remaining quantity of the removed order, or None if not found
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Money> {
        let position = self.orders.iter().position(|entry| &entry.order_id == order_id)?;
        let entry = self.orders.remove(position)?;
        self.total_quantity = self.total_quantity.saturating_sub(entry.remaining_quantity);
        Some(entry.remaining_quantity)
    }

    pub fn peek_front(&self) -> Option<&LevelEntry> {
        self.orders.front()
    }

    /// Orders in time priority, without consuming them
    pub fn iter(&self) -> impl Iterator<Item = &LevelEntry> + '_ {
        self.orders.iter()
    }

    /// Take `fill` from the front order, dropping it once exhausted
    ///
    /// Returns the front order's new remaining quantity, or None when the
    /// front is not `order_id` or holds less than `fill`.
    pub fn fill_front(&mut self, order_id: &OrderId, fill: Money) -> Option<Money> {
        let entry = self.orders.front_mut()?;
        if &entry.order_id != order_id || entry.remaining_quantity < fill {
            return None;
        }
        let remaining = entry.remaining_quantity.saturating_sub(fill);
        if remaining.is_zero() {
            self.orders.pop_front();
        } else {
            entry.remaining_quantity = remaining;
        }
        self.total_quantity = self.total_quantity.saturating_sub(fill);
        Some(remaining)
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn total_quantity(&self) -> Money {
        self.total_quantity
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}
