//! Match planning
//!
//! `MatchExecutor::plan` walks the opposite side of the book without touching
//! it and produces every fill, trade and collateral amount the order would
//! generate. Nothing is applied until the engine commits the plan, so any
//! rejection (self-match, missing liquidity, wallet failure upstream) leaves
//! the book exactly as it was.

use types::errors::OrderError;
use types::ids::{MarketId, OrderId, ReservationId, UserId};
use types::numeric::{Money, Price};
use types::order::{collateral, Order, OrderClass, Side, TimeInForce};
use types::trade::Trade;

use crate::book::{OrderBook, PriceLevel};
use crate::matching::crossing;

/// Trade sequencer and planner for one outcome
#[derive(Debug, Clone)]
pub struct MatchExecutor {
    next_sequence: u64,
}

/// One match against a resting order
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFill {
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub maker_reservation: Option<ReservationId>,
    pub price: Price,
    pub quantity: Money,
    pub taker_collateral: Money,
    pub maker_collateral: Money,
    pub trade: Trade,
}

/// What happens to the taker once its fills are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Filled,
    /// GTC remainder rests at the limit price
    Rest,
    /// Market or IOC remainder is cancelled as unfilled
    CancelRemainder,
}

/// Fully computed, not yet applied, result of matching one order
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPlan {
    /// Taker with every planned fill applied
    pub taker: Order,
    pub fills: Vec<PlannedFill>,
    pub disposition: Disposition,
    /// Executor sequence the plan's trades were numbered from
    pub(crate) base_sequence: u64,
    /// Book version the plan was computed against
    pub(crate) book_version: u64,
}

impl MatchPlan {
    pub fn trades(&self) -> impl Iterator<Item = &Trade> + '_ {
        self.fills.iter().map(|fill| &fill.trade)
    }

    /// Collateral the taker moves into its position across all fills
    pub fn taker_collateral(&self) -> Money {
        self.taker.locked
    }

    pub fn filled_quantity(&self) -> Money {
        self.taker.filled_quantity
    }

    /// Whether executing the plan changes any state beyond the taker itself
    pub fn has_fills(&self) -> bool {
        !self.fills.is_empty()
    }

    /// Record the wallet reservation backing the taker
    pub fn attach_reservation(&mut self, reservation_id: ReservationId, amount: Money) {
        self.taker.reservation_id = Some(reservation_id);
        self.taker.reserved = amount;
    }
}

impl MatchExecutor {
    /// Create an executor whose next trade gets `starting_sequence`
    pub fn new(starting_sequence: u64) -> Self {
        Self {
            next_sequence: starting_sequence,
        }
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Sequence of the most recent trade, 0 before the first
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence.saturating_sub(1)
    }

    pub(crate) fn advance(&mut self, trades: usize) {
        self.next_sequence += trades as u64;
    }

    /// Walk the opposite side in price-time priority and plan every fill
    pub fn plan(
        &self,
        book: &OrderBook,
        taker: &Order,
        market_id: MarketId,
        book_version: u64,
        timestamp: i64,
    ) -> Result<MatchPlan, OrderError> {
        let mut planned = taker.clone();
        let mut fills = Vec::new();
        let mut remaining = taker.remaining_quantity;
        let mut sequence = self.next_sequence;

        let levels: Box<dyn Iterator<Item = (Price, &PriceLevel)>> = match taker.side {
            Side::Back => Box::new(book.asks().levels()),
            Side::Lay => Box::new(book.bids().levels()),
        };

        'levels: for (price, level) in levels {
            if let (OrderClass::Limit, Some(limit)) = (taker.class, taker.price) {
                if !crossing::incoming_can_match(taker.side, limit, price) {
                    break;
                }
            }

            for entry in level.iter() {
                if remaining.is_zero() {
                    break 'levels;
                }
                if entry.user_id == taker.user_id {
                    return Err(OrderError::SelfMatchNotAllowed {
                        order_id: taker.order_id.to_string(),
                        outcome_id: taker.outcome_id.to_string(),
                    });
                }

                let quantity = remaining.min(entry.remaining_quantity);
                let taker_collateral = collateral(taker.side, price, quantity).map_err(|_| {
                    OrderError::InvalidQuantity {
                        order_id: taker.order_id.to_string(),
                        reason: format!("collateral for {} at {} overflows", quantity, price),
                    }
                })?;
                let maker_collateral = quantity.saturating_sub(taker_collateral);
                planned.add_fill(quantity, taker_collateral, timestamp)?;
                remaining = planned.remaining_quantity;

                let maker_reservation = book.get(&entry.order_id).and_then(|o| o.reservation_id);
                let trade = Trade::new(
                    sequence,
                    market_id,
                    taker.outcome_id,
                    entry.order_id,
                    taker.order_id,
                    entry.user_id,
                    taker.user_id,
                    taker.side,
                    price,
                    quantity,
                    timestamp,
                );
                sequence += 1;

                fills.push(PlannedFill {
                    maker_order_id: entry.order_id,
                    maker_user_id: entry.user_id,
                    maker_reservation,
                    price,
                    quantity,
                    taker_collateral,
                    maker_collateral,
                    trade,
                });
            }
        }

        let disposition = if remaining.is_zero() {
            Disposition::Filled
        } else {
            match (taker.class, taker.time_in_force) {
                (OrderClass::Market, _) if fills.is_empty() => {
                    return Err(insufficient_liquidity(taker, book));
                }
                (OrderClass::Limit, TimeInForce::FOK) => {
                    return Err(OrderError::InsufficientLiquidity {
                        outcome_id: taker.outcome_id.to_string(),
                        requested: taker.quantity.to_string(),
                        available: planned.filled_quantity.to_string(),
                    });
                }
                (OrderClass::Limit, TimeInForce::GTC) => Disposition::Rest,
                _ => Disposition::CancelRemainder,
            }
        };

        Ok(MatchPlan {
            taker: planned,
            fills,
            disposition,
            base_sequence: self.next_sequence,
            book_version,
        })
    }
}

fn insufficient_liquidity(taker: &Order, book: &OrderBook) -> OrderError {
    let available = match taker.side {
        Side::Back => book.asks().total_quantity(),
        Side::Lay => book.bids().total_quantity(),
    };
    OrderError::InsufficientLiquidity {
        outcome_id: taker.outcome_id.to_string(),
        requested: taker.quantity.to_string(),
        available: available.to_string(),
    }
}
