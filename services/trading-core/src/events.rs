//! Market event stream
//!
//! Subscribers receive, per market, the engine events of every outcome plus
//! lifecycle transitions and the settlement summary. Events of one outcome
//! arrive in commit order; across outcomes there is no ordering guarantee.
//!
//! Each market has one bounded broadcast channel. A subscriber that falls
//! more than `capacity` events behind loses the oldest ones and is told how
//! many it missed (`TryRecvError::Lagged`).

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use matching_engine::events::{EngineEvent, OrderCancelledEvent, OrderPlacedEvent, TradeExecutedEvent};
use types::ids::MarketId;
use types::market::MarketStatus;
use types::numeric::Money;
use types::settlement::SettlementKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangedEvent {
    pub market_id: MarketId,
    pub from: MarketStatus,
    pub to: MarketStatus,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSettledEvent {
    pub market_id: MarketId,
    pub kind: SettlementKind,
    pub records: usize,
    pub total_payout: Money,
    pub total_fees: Money,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MarketEvent {
    OrderPlaced(OrderPlacedEvent),
    TradeExecuted(TradeExecutedEvent),
    OrderCancelled(OrderCancelledEvent),
    StatusChanged(StatusChangedEvent),
    Settled(MarketSettledEvent),
}

impl From<EngineEvent> for MarketEvent {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::OrderPlaced(e) => MarketEvent::OrderPlaced(e),
            EngineEvent::TradeExecuted(e) => MarketEvent::TradeExecuted(e),
            EngineEvent::OrderCancelled(e) => MarketEvent::OrderCancelled(e),
        }
    }
}

/// Per-market broadcast of market events
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    channels: DashMap<MarketId, broadcast::Sender<MarketEvent>>,
}

impl EventBus {
    /// `capacity` is the number of events kept for the slowest subscriber
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: DashMap::new(),
        }
    }

    pub fn subscribe(&self, market_id: MarketId) -> broadcast::Receiver<MarketEvent> {
        self.channels
            .entry(market_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver to current subscribers; with none, events are discarded
    pub fn publish<I>(&self, market_id: MarketId, events: I)
    where
        I: IntoIterator<Item = MarketEvent>,
    {
        let Some(tx) = self.channels.get(&market_id) else {
            return;
        };
        for event in events {
            if tx.send(event).is_err() {
                break;
            }
        }
    }

    pub fn subscriber_count(&self, market_id: MarketId) -> usize {
        self.channels
            .get(&market_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}
