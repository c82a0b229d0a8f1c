//! Event structures for the matching engine
//!
//! Emitted by `MatchingEngine::commit`, `cancel_order` and `close`, in the
//! order the state changes happened.

use serde::{Deserialize, Serialize};
use types::ids::{MarketId, OrderId, OutcomeId, TradeId, UserId};
use types::numeric::{Money, Price};
use types::order::{CancelReason, Order, OrderClass, OrderStatus, Side};
use types::trade::Trade;

/// Order accepted by the engine (resting, filled or cancelled remainder)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub side: Side,
    pub class: OrderClass,
    pub price: Option<Price>,
    pub quantity: Money,
    pub status: OrderStatus,
    pub sequence: u64,
}

impl From<&Order> for OrderPlacedEvent {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id,
            user_id: order.user_id,
            market_id: order.market_id,
            outcome_id: order.outcome_id,
            side: order.side,
            class: order.class,
            price: order.price,
            quantity: order.quantity,
            status: order.status,
            sequence: order.sequence,
        }
    }
}

/// Trade executed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExecutedEvent {
    pub trade_id: TradeId,
    pub sequence: u64,
    pub market_id: MarketId,
    pub outcome_id: OutcomeId,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub taker_user_id: UserId,
    pub price: Price,
    pub quantity: Money,
    pub taker_side: Side,
    pub executed_at: i64,
}

impl From<&Trade> for TradeExecutedEvent {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.trade_id,
            sequence: trade.sequence,
            market_id: trade.market_id,
            outcome_id: trade.outcome_id,
            maker_order_id: trade.maker_order_id,
            taker_order_id: trade.taker_order_id,
            maker_user_id: trade.maker_user_id,
            taker_user_id: trade.taker_user_id,
            price: trade.price,
            quantity: trade.quantity,
            taker_side: trade.taker_side,
            executed_at: trade.executed_at,
        }
    }
}

/// Order cancelled event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub outcome_id: OutcomeId,
    pub cancelled_by: CancelSource,
    pub reason: CancelReason,
    pub filled_quantity: Money,
    pub unfilled_quantity: Money,
}

impl OrderCancelledEvent {
    /// Build from an order already in the cancelled state
    pub fn from_order(order: &Order) -> Option<Self> {
        match order.status {
            OrderStatus::Cancelled(reason) => Some(Self {
                order_id: order.order_id,
                user_id: order.user_id,
                outcome_id: order.outcome_id,
                cancelled_by: CancelSource::from(reason),
                reason,
                filled_quantity: order.filled_quantity,
                unfilled_quantity: order.remaining_quantity,
            }),
            _ => None,
        }
    }
}

/// Who cancelled the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CancelSource {
    User,
    System,
}

impl From<CancelReason> for CancelSource {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::UserRequested => CancelSource::User,
            CancelReason::Unfilled | CancelReason::MarketClosed => CancelSource::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    OrderPlaced(OrderPlacedEvent),
    TradeExecuted(TradeExecutedEvent),
    OrderCancelled(OrderCancelledEvent),
}
