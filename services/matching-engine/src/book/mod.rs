//! Order book infrastructure module
//!
//! Contains price levels, the bid and ask ladders, and `OrderBook`, which
//! owns the live orders of a single outcome.

pub mod price_level;
pub mod bid_book;
pub mod ask_book;

pub use price_level::{LevelEntry, PriceLevel};
pub use bid_book::BidBook;
pub use ask_book::AskBook;

use rust_decimal::Decimal;
use std::collections::HashMap;
use types::errors::OrderError;
use types::ids::{OrderId, OutcomeId};
use types::numeric::{Money, Price, QUANTITY_SCALE};
use types::order::{CancelReason, Order, OrderClass, Side};

/// Market-level limits every order in the book must respect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookLimits {
    pub min_bet: Money,
    pub max_bet: Money,
    pub price_tick: Decimal,
    pub quantity_step: Decimal,
}

/// Live orders of one outcome, laddered by side
#[derive(Debug, Clone)]
pub struct OrderBook {
    outcome_id: OutcomeId,
    limits: BookLimits,
    bids: BidBook,
    asks: AskBook,
    orders: HashMap<OrderId, Order>,
}

impl OrderBook {
    pub fn new(outcome_id: OutcomeId, limits: BookLimits) -> Self {
        Self {
            outcome_id,
            limits,
            bids: BidBook::new(),
            asks: AskBook::new(),
            orders: HashMap::new(),
        }
    }

    pub fn outcome_id(&self) -> OutcomeId {
        self.outcome_id
    }

    pub fn limits(&self) -> &BookLimits {
        &self.limits
    }

    /// Price, quantity and bet-size checks shared by matching and resting
    pub fn validate(&self, order: &Order) -> Result<(), OrderError> {
        let order_id = order.order_id.to_string();
        let invalid_quantity = |reason: String| OrderError::InvalidQuantity {
            order_id: order_id.clone(),
            reason,
        };

        if order.quantity.is_zero() {
            return Err(invalid_quantity("quantity must be positive".to_string()));
        }
        if order.quantity.fractional_digits() > QUANTITY_SCALE
            || !is_multiple_of(order.quantity.as_decimal(), self.limits.quantity_step)
        {
            return Err(invalid_quantity(format!(
                "{} is not a multiple of {}",
                order.quantity, self.limits.quantity_step
            )));
        }
        if order.quantity < self.limits.min_bet || order.quantity > self.limits.max_bet {
            return Err(OrderError::StakeOutOfRange {
                stake: order.quantity.to_string(),
                min: self.limits.min_bet.to_string(),
                max: self.limits.max_bet.to_string(),
            });
        }

        match (order.class, order.price) {
            (OrderClass::Limit, None) => Err(OrderError::InvalidPrice {
                order_id,
                reason: "limit order without a price".to_string(),
            }),
            (OrderClass::Limit, Some(price)) if !price.is_aligned_to(self.limits.price_tick) => {
                Err(OrderError::InvalidPrice {
                    order_id,
                    reason: format!("{} is not aligned to tick {}", price, self.limits.price_tick),
                })
            }
            (OrderClass::Market, Some(_)) => Err(OrderError::InvalidPrice {
                order_id,
                reason: "market orders take the book's prices".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Rest an order at its limit price behind everything already there
    pub fn insert(&mut self, order: Order) -> Result<(), OrderError> {
        let price = self.check_insertable(&order)?;
        let entry = LevelEntry {
            order_id: order.order_id,
            user_id: order.user_id,
            sequence: order.sequence,
            remaining_quantity: order.remaining_quantity,
        };
        match order.side {
            Side::Back => self.bids.insert(price, entry),
            Side::Lay => self.asks.insert(price, entry),
        }
        self.orders.insert(order.order_id, order);
        Ok(())
    }

    /// Everything `insert` checks, without touching the book
    pub fn check_insertable(&self, order: &Order) -> Result<Price, OrderError> {
        self.validate(order)?;
        let price = match (order.class, order.price) {
            (OrderClass::Limit, Some(price)) => price,
            _ => {
                return Err(OrderError::InvalidPrice {
                    order_id: order.order_id.to_string(),
                    reason: "only limit orders rest in the book".to_string(),
                })
            }
        };
        if order.status.is_terminal() || order.remaining_quantity.is_zero() {
            return Err(OrderError::AlreadyTerminal {
                status: order.status.to_string(),
            });
        }
        Ok(price)
    }

    /// Remove a live order and mark it cancelled
    pub fn cancel(
        &mut self,
        order_id: &OrderId,
        reason: CancelReason,
        timestamp: i64,
    ) -> Result<Order, OrderError> {
        let not_found = || OrderError::NotFound {
            order_id: order_id.to_string(),
        };
        let order = self.orders.get(order_id).ok_or_else(not_found)?;
        let price = order.price.ok_or_else(not_found)?;
        let removed = match order.side {
            Side::Back => self.bids.remove(order_id, price),
            Side::Lay => self.asks.remove(order_id, price),
        };
        removed.ok_or_else(not_found)?;

        let mut order = self.orders.remove(order_id).ok_or_else(not_found)?;
        order.cancel(reason, timestamp)?;
        Ok(order)
    }

    /// Cancel everything resting, in arrival order
    pub fn cancel_all(&mut self, reason: CancelReason, timestamp: i64) -> Vec<Order> {
        let mut ids: Vec<(u64, OrderId)> = self
            .orders
            .values()
            .map(|order| (order.sequence, order.order_id))
            .collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|(_, order_id)| self.cancel(&order_id, reason, timestamp).ok())
            .collect()
    }

    /// Whether `fill` would succeed for this order and quantity
    pub(crate) fn check_fill(&self, order_id: &OrderId, quantity: Money) -> Result<(), OrderError> {
        let order = self.orders.get(order_id).ok_or_else(|| OrderError::NotFound {
            order_id: order_id.to_string(),
        })?;
        if quantity > order.remaining_quantity {
            return Err(OrderError::Overfill {
                order_id: order_id.to_string(),
                fill: quantity.to_string(),
                remaining: order.remaining_quantity.to_string(),
            });
        }
        Ok(())
    }

    /// Apply a planned fill to a resting order
    ///
    /// Returns the updated order and whether it left the book.
    pub(crate) fn fill(
        &mut self,
        order_id: &OrderId,
        quantity: Money,
        collateral: Money,
        timestamp: i64,
    ) -> Result<(Order, bool), OrderError> {
        let not_found = || OrderError::NotFound {
            order_id: order_id.to_string(),
        };
        let order = self.orders.get(order_id).ok_or_else(not_found)?;
        let price = order.price.ok_or_else(not_found)?;

        let mut updated = order.clone();
        updated.add_fill(quantity, collateral, timestamp)?;

        let remaining = match updated.side {
            Side::Back => self.bids.fill(price, order_id, quantity),
            Side::Lay => self.asks.fill(price, order_id, quantity),
        };
        let remaining = remaining.ok_or_else(|| OrderError::Overfill {
            order_id: order_id.to_string(),
            fill: quantity.to_string(),
            remaining: updated.remaining_quantity.to_string(),
        })?;

        if remaining.is_zero() {
            self.orders.remove(order_id);
            Ok((updated, true))
        } else {
            self.orders.insert(*order_id, updated.clone());
            Ok((updated, false))
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn bids(&self) -> &BidBook {
        &self.bids
    }

    pub fn asks(&self) -> &AskBook {
        &self.asks
    }

    pub fn best_bid(&self) -> Option<(Price, Money)> {
        self.bids.best_bid()
    }

    pub fn best_ask(&self) -> Option<(Price, Money)> {
        self.asks.best_ask()
    }

    /// Lazy (price, aggregate quantity) for one side, best first
    pub fn depth(&self, side: Side, levels: usize) -> Box<dyn Iterator<Item = (Price, Money)> + '_> {
        match side {
            Side::Back => Box::new(self.bids.depth(levels)),
            Side::Lay => Box::new(self.asks.depth(levels)),
        }
    }

    /// Live orders, unordered
    pub fn resting_orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.orders.values()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

fn is_multiple_of(value: Decimal, step: Decimal) -> bool {
    step > Decimal::ZERO && (value % step).is_zero()
}
