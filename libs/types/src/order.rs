//! Order lifecycle types
//!
//! An order backs (buys) or lays (sells) one outcome. Collateral is reserved
//! in the wallet when the order is accepted and moved into the position as
//! the order fills; whatever is left is released when the order reaches a
//! terminal state.

use crate::errors::{MoneyError, OrderError};
use crate::ids::{MarketId, OrderId, OutcomeId, ReservationId, UserId};
use crate::numeric::{Money, Price};
use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Back the outcome (bid); wins if the outcome occurs
    Back,
    /// Lay the outcome (ask); wins if the outcome does not occur
    Lay,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Back => Side::Lay,
            Side::Lay => Side::Back,
        }
    }
}

/// Market orders take whatever the book offers; limit orders carry a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderClass {
    Market,
    Limit,
}

/// Time-in-force policy for limit orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeInForce {
    /// Good-Till-Cancel: remainder rests until filled or cancelled
    #[default]
    GTC,
    /// Immediate-Or-Cancel: match immediately, cancel remainder
    IOC,
    /// Fill-Or-Kill: full match or reject entirely
    FOK,
}

/// Why an order left the book without filling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    UserRequested,
    /// Market/IOC remainder that found no liquidity
    Unfilled,
    MarketClosed,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum OrderStatus {
    #[serde(rename = "OPEN")]
    Open,

    #[serde(rename = "PARTIALLY_FILLED")]
    PartiallyFilled,

    /// Terminal
    #[serde(rename = "FILLED")]
    Filled,

    /// Terminal
    #[serde(rename = "CANCELLED")]
    Cancelled(CancelReason),
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled(_))
    }

    /// Get the state ID for wire protocol
    pub fn state_id(&self) -> u8 {
        match self {
            OrderStatus::Open => 0,
            OrderStatus::PartiallyFilled => 1,
            OrderStatus::Filled => 2,
            OrderStatus::Cancelled(_) => 3,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::PartiallyFilled => write!(f, "partially-filled"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled(reason) => write!(f, "cancelled ({:?})", reason),
        }
    }
}

/// Collateral a side commits for `quantity` at `price`
///
/// Back commits `price × quantity`, lay commits `(1 - price) × quantity`; the
/// two always sum to `quantity`, which is the pool the winner collects.
pub fn collateral(side: Side, price: Price, quantity: Money) -> Result<Money, MoneyError> {
    match side {
        Side::Back => quantity.mul_rate(price.as_decimal()),
        Side::Lay => quantity.mul_rate(price.complement().as_decimal()),
    }
}

/// Incoming order request, before validation and sequencing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub outcome_id: OutcomeId,
    pub side: Side,
    pub class: OrderClass,
    pub price: Option<Price>,
    pub quantity: Money,
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

impl NewOrder {
    pub fn limit(user_id: UserId, outcome_id: OutcomeId, side: Side, price: Price, quantity: Money) -> Self {
        Self {
            user_id,
            outcome_id,
            side,
            class: OrderClass::Limit,
            price: Some(price),
            quantity,
            time_in_force: TimeInForce::GTC,
        }
    }

    pub fn market(user_id: UserId, outcome_id: OutcomeId, side: Side, quantity: Money) -> Self {
        Self {
            user_id,
            outcome_id,
            side,
            class: OrderClass::Market,
            price: None,
            quantity,
            time_in_force: TimeInForce::IOC,
        }
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Upper bound on the collateral this order can consume
    ///
    /// Limit orders fill at the maker's price, which is never worse than the
    /// limit, so the limit bounds it. Market orders are bounded by the full
    /// quantity since every price is below one.
    pub fn max_collateral(&self) -> Result<Money, MoneyError> {
        match (self.class, self.price) {
            (OrderClass::Limit, Some(price)) => collateral(self.side, price, self.quantity),
            _ => Ok(self.quantity),
        }
    }
}

/// Complete order structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub side: Side,
    pub class: OrderClass,
    pub time_in_force: TimeInForce,
    pub price: Option<Price>,
    pub quantity: Money,
    pub filled_quantity: Money,
    pub remaining_quantity: Money,
    /// Collateral reserved in the wallet for this order
    pub reserved: Money,
    /// Collateral already moved into positions by fills
    pub locked: Money,
    pub reservation_id: Option<ReservationId>,
    /// Arrival sequence within the outcome; the time half of price-time priority
    pub sequence: u64,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
    pub version: u64,
}

impl Order {
    /// Create a new open order from a validated request
    pub fn new(request: &NewOrder, market_id: MarketId, sequence: u64, timestamp: i64) -> Self {
        Self {
            order_id: OrderId::new(),
            user_id: request.user_id,
            market_id,
            outcome_id: request.outcome_id,
            side: request.side,
            class: request.class,
            time_in_force: request.time_in_force,
            price: request.price,
            quantity: request.quantity,
            filled_quantity: Money::zero(),
            remaining_quantity: request.quantity,
            reserved: Money::zero(),
            locked: Money::zero(),
            reservation_id: None,
            sequence,
            status: OrderStatus::Open,
            created_at: timestamp,
            updated_at: timestamp,
            version: 0,
        }
    }

    /// Check quantity invariant: filled + remaining = total
    pub fn check_invariant(&self) -> bool {
        self.filled_quantity.as_decimal() + self.remaining_quantity.as_decimal()
            == self.quantity.as_decimal()
            && self.locked <= self.reserved
    }

    pub fn is_filled(&self) -> bool {
        self.filled_quantity == self.quantity
    }

    pub fn has_fills(&self) -> bool {
        !self.filled_quantity.is_zero()
    }

    /// Reserved collateral not (yet) moved into a position
    pub fn unused_reservation(&self) -> Money {
        self.reserved.saturating_sub(self.locked)
    }

    /// Record a fill and the collateral it locked
    pub fn add_fill(
        &mut self,
        fill_quantity: Money,
        fill_collateral: Money,
        timestamp: i64,
    ) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                status: self.status.to_string(),
            });
        }
        let overfill = || OrderError::Overfill {
            order_id: self.order_id.to_string(),
            fill: fill_quantity.to_string(),
            remaining: self.remaining_quantity.to_string(),
        };
        let remaining = self
            .remaining_quantity
            .checked_sub(fill_quantity)
            .map_err(|_| overfill())?;
        let filled = self
            .filled_quantity
            .checked_add(fill_quantity)
            .map_err(|_| overfill())?;
        let locked = self
            .locked
            .checked_add(fill_collateral)
            .map_err(|_| overfill())?;

        self.remaining_quantity = remaining;
        self.filled_quantity = filled;
        self.locked = locked;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = timestamp;
        self.version += 1;
        Ok(())
    }

    /// Cancel the order; terminal orders cannot be cancelled
    pub fn cancel(&mut self, reason: CancelReason, timestamp: i64) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::AlreadyTerminal {
                status: self.status.to_string(),
            });
        }
        self.status = OrderStatus::Cancelled(reason);
        self.updated_at = timestamp;
        self.version += 1;
        Ok(())
    }
}
