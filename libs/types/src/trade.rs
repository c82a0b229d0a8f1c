//! Trade records
//!
//! A trade is the immutable result of one match between a resting (maker)
//! order and an incoming (taker) order. It always executes at the maker's
//! price and carries a per-outcome sequence number that orders replay and
//! bounds settlement.

use crate::errors::MoneyError;
use crate::ids::{MarketId, OrderId, OutcomeId, TradeId, UserId};
use crate::numeric::{Money, Price};
use crate::order::{collateral, Side};
use serde::{Deserialize, Serialize};

/// Complete trade structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    /// Monotonic within the outcome
    pub sequence: u64,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,

    // Order references
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,

    // User references
    pub maker_user_id: UserId,
    pub taker_user_id: UserId,

    // Trade details (from taker perspective)
    pub taker_side: Side,
    pub price: Price,
    pub quantity: Money,

    pub executed_at: i64, // Unix nanos
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        market_id: MarketId,
        outcome_id: OutcomeId,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_user_id: UserId,
        taker_user_id: UserId,
        taker_side: Side,
        price: Price,
        quantity: Money,
        executed_at: i64,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            sequence,
            market_id,
            outcome_id,
            maker_order_id,
            taker_order_id,
            maker_user_id,
            taker_user_id,
            taker_side,
            price,
            quantity,
            executed_at,
        }
    }

    pub fn maker_side(&self) -> Side {
        self.taker_side.opposite()
    }

    /// The user holding the back leg of this trade
    pub fn backer(&self) -> UserId {
        match self.taker_side {
            Side::Back => self.taker_user_id,
            Side::Lay => self.maker_user_id,
        }
    }

    /// The user holding the lay leg of this trade
    pub fn layer(&self) -> UserId {
        match self.taker_side {
            Side::Back => self.maker_user_id,
            Side::Lay => self.taker_user_id,
        }
    }

    /// Collateral the given side committed to this trade
    pub fn collateral_for(&self, side: Side) -> Result<Money, MoneyError> {
        collateral(side, self.price, self.quantity)
    }

    /// Validate no self-trade
    pub fn validate_no_self_trade(&self) -> bool {
        self.maker_user_id != self.taker_user_id
    }
}
