//! Matching engine core
//!
//! One `MatchingEngine` per outcome. It owns the outcome's book, its order
//! archive, both sequence counters and the outcome's price and volume. The
//! trading core serializes access to it with a per-outcome lock; nothing in
//! here is internally synchronized.

use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use types::errors::{MarketError, MoneyError, OrderError, TradingError};
use types::ids::{MarketId, OrderId, OutcomeId, UserId};
use types::market::Outcome;
use types::numeric::{Money, Price};
use types::order::{CancelReason, NewOrder, Order, Side};
use types::trade::Trade;

use crate::book::{BookLimits, OrderBook};
use crate::events::{EngineEvent, OrderCancelledEvent, OrderPlacedEvent, TradeExecutedEvent};
use crate::matching::{Disposition, MatchExecutor, MatchPlan};

/// Per-outcome matching engine
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    market_id: MarketId,
    outcome: Outcome,
    book: OrderBook,
    executor: MatchExecutor,
    /// Arrival sequence for the next accepted order
    next_order_sequence: u64,
    /// Bumped on every book mutation; plans from older versions are refused
    version: u64,
    accepting: bool,
    archive: HashMap<OrderId, Order>,
}

/// Result of committing a plan
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// The taker in its final state for this call
    pub order: Order,
    pub trades: Vec<Trade>,
    /// Makers touched by the plan, after their fills
    pub makers: Vec<Order>,
    pub events: Vec<EngineEvent>,
}

impl Execution {
    /// Makers that left the book fully filled
    pub fn filled_makers(&self) -> impl Iterator<Item = &Order> + '_ {
        self.makers.iter().filter(|order| order.is_filled())
    }
}

/// Result of submitting an order without a wallet in the loop
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResult {
    /// Order was added to book (no match)
    Resting(Order),
    /// Order was partially filled and its remainder rests
    PartiallyFilled { trades: Vec<Trade>, remaining: Order },
    /// Order was completely filled
    Filled { trades: Vec<Trade>, order: Order },
    /// Remainder cancelled as unfilled (market and IOC orders)
    Cancelled { trades: Vec<Trade>, order: Order },
}

/// Outcome of the close barrier on one outcome
#[derive(Debug, Clone, PartialEq)]
pub struct CloseSummary {
    /// Last trade sequence at close; 0 when nothing traded
    pub closing_sequence: u64,
    pub cancelled: Vec<Order>,
    pub events: Vec<EngineEvent>,
}

/// Engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("Outcome {outcome_id} is not accepting orders")]
    NotAccepting { market_id: MarketId, outcome_id: OutcomeId },

    #[error("Outcome {outcome_id} not in market {market_id}")]
    WrongOutcome { market_id: MarketId, outcome_id: OutcomeId },

    #[error("Plan for outcome {outcome_id} is stale")]
    StalePlan { outcome_id: OutcomeId },
}

impl From<EngineError> for TradingError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Order(err) => TradingError::Order(err),
            EngineError::Money(err) => TradingError::Money(err),
            EngineError::NotAccepting { market_id, .. } => TradingError::Market(MarketError::Closed {
                market_id: market_id.to_string(),
            }),
            EngineError::WrongOutcome {
                market_id,
                outcome_id,
            } => TradingError::Market(MarketError::OutcomeNotInMarket {
                market_id: market_id.to_string(),
                outcome_id: outcome_id.to_string(),
            }),
            EngineError::StalePlan { outcome_id } => TradingError::Fatal {
                message: format!("stale match plan on outcome {}", outcome_id),
            },
        }
    }
}

impl MatchingEngine {
    /// Create an engine for `outcome`; order and trade sequences start at 1
    pub fn new(outcome: Outcome, limits: BookLimits) -> Self {
        Self {
            market_id: outcome.market_id,
            book: OrderBook::new(outcome.outcome_id, limits),
            outcome,
            executor: MatchExecutor::new(1),
            next_order_sequence: 1,
            version: 0,
            accepting: true,
            archive: HashMap::new(),
        }
    }

    pub fn market_id(&self) -> MarketId {
        self.market_id
    }

    pub fn outcome_id(&self) -> OutcomeId {
        self.outcome.outcome_id
    }

    /// Current price and volume, owned here and updated only by `commit`
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn closing_sequence(&self) -> Option<u64> {
        self.outcome.closing_sequence
    }

    pub fn last_trade_sequence(&self) -> u64 {
        self.executor.last_sequence()
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Validate a request and plan its matches against the current book
    pub fn plan(&self, request: &NewOrder, timestamp: i64) -> Result<MatchPlan, EngineError> {
        if !self.accepting {
            return Err(EngineError::NotAccepting {
                market_id: self.market_id,
                outcome_id: self.outcome.outcome_id,
            });
        }
        if request.outcome_id != self.outcome.outcome_id {
            return Err(EngineError::WrongOutcome {
                market_id: self.market_id,
                outcome_id: request.outcome_id,
            });
        }
        let order = Order::new(request, self.market_id, self.next_order_sequence, timestamp);
        self.book.validate(&order)?;
        let plan = self
            .executor
            .plan(&self.book, &order, self.market_id, self.version, timestamp)?;
        debug!(
            order_id = %order.order_id,
            outcome_id = %order.outcome_id,
            fills = plan.fills.len(),
            disposition = ?plan.disposition,
            "Planned order"
        );
        Ok(plan)
    }

    /// Apply a plan: maker fills, trades, outcome price, taker disposition
    pub fn commit(&mut self, plan: MatchPlan, timestamp: i64) -> Result<Execution, EngineError> {
        if plan.book_version != self.version || plan.base_sequence != self.executor.next_sequence() {
            return Err(EngineError::StalePlan {
                outcome_id: self.outcome.outcome_id,
            });
        }

        let MatchPlan {
            taker: mut order,
            fills,
            disposition,
            ..
        } = plan;

        // Every fallible step runs before the first mutation
        for fill in &fills {
            self.book.check_fill(&fill.maker_order_id, fill.quantity)?;
        }
        let mut outcome = self.outcome.clone();
        for fill in &fills {
            outcome.record_trade(fill.price, fill.quantity)?;
        }
        let placed = OrderPlacedEvent::from(&order);
        match disposition {
            Disposition::Rest => {
                self.book.check_insertable(&order)?;
            }
            Disposition::CancelRemainder => order.cancel(CancelReason::Unfilled, timestamp)?,
            Disposition::Filled => {}
        }

        let mut events = Vec::with_capacity(fills.len() + 2);
        events.push(EngineEvent::OrderPlaced(placed));

        let mut trades = Vec::with_capacity(fills.len());
        let mut makers = Vec::with_capacity(fills.len());
        for fill in fills {
            let (maker, left_book) =
                self.book
                    .fill(&fill.maker_order_id, fill.quantity, fill.maker_collateral, timestamp)?;
            if left_book {
                self.archive.insert(maker.order_id, maker.clone());
            }
            makers.push(maker);
            events.push(EngineEvent::TradeExecuted(TradeExecutedEvent::from(&fill.trade)));
            trades.push(fill.trade);
        }
        self.outcome = outcome;
        self.executor.advance(trades.len());
        self.next_order_sequence += 1;

        match disposition {
            Disposition::Rest => self.book.insert(order.clone())?,
            Disposition::CancelRemainder => {
                if let Some(event) = OrderCancelledEvent::from_order(&order) {
                    events.push(EngineEvent::OrderCancelled(event));
                }
                self.archive.insert(order.order_id, order.clone());
            }
            Disposition::Filled => {
                self.archive.insert(order.order_id, order.clone());
            }
        }
        self.version += 1;

        debug!(
            order_id = %order.order_id,
            trades = trades.len(),
            status = %order.status,
            last_price = ?self.outcome.current_price,
            "Committed order"
        );
        Ok(Execution {
            order,
            trades,
            makers,
            events,
        })
    }

    /// Plan and commit in one step, without collateral
    pub fn submit_order(&mut self, request: &NewOrder, timestamp: i64) -> Result<SubmitResult, EngineError> {
        let mut plan = self.plan(request, timestamp)?;
        plan.taker.reserved = request.max_collateral()?;
        let disposition = plan.disposition;
        let execution = self.commit(plan, timestamp)?;
        let Execution { order, trades, .. } = execution;

        Ok(match disposition {
            Disposition::Filled => SubmitResult::Filled { trades, order },
            Disposition::CancelRemainder => SubmitResult::Cancelled { trades, order },
            Disposition::Rest if trades.is_empty() => SubmitResult::Resting(order),
            Disposition::Rest => SubmitResult::PartiallyFilled {
                trades,
                remaining: order,
            },
        })
    }

    /// Cancel a resting order on behalf of its owner
    pub fn cancel_order(
        &mut self,
        order_id: &OrderId,
        requested_by: UserId,
        timestamp: i64,
    ) -> Result<(Order, EngineEvent), EngineError> {
        let order = self.book.get(order_id).ok_or_else(|| OrderError::NotFound {
            order_id: order_id.to_string(),
        })?;
        if order.user_id != requested_by {
            return Err(OrderError::NotOwner {
                order_id: order_id.to_string(),
            }
            .into());
        }

        let order = self.book.cancel(order_id, CancelReason::UserRequested, timestamp)?;
        self.archive.insert(order.order_id, order.clone());
        self.version += 1;

        let event = OrderCancelledEvent::from_order(&order).ok_or_else(|| OrderError::NotFound {
            order_id: order_id.to_string(),
        })?;
        Ok((order, EngineEvent::OrderCancelled(event)))
    }

    /// Stop accepting orders, record the closing sequence and cancel the book
    pub fn close(&mut self, timestamp: i64) -> CloseSummary {
        self.accepting = false;
        let closing_sequence = self.executor.last_sequence();
        self.outcome.closing_sequence = Some(closing_sequence);

        let cancelled = self.book.cancel_all(CancelReason::MarketClosed, timestamp);
        let events = cancelled
            .iter()
            .filter_map(OrderCancelledEvent::from_order)
            .map(EngineEvent::OrderCancelled)
            .collect();
        for order in &cancelled {
            self.archive.insert(order.order_id, order.clone());
        }
        self.version += 1;

        CloseSummary {
            closing_sequence,
            cancelled,
            events,
        }
    }

    /// Mark the outcome won or lost once the market resolves
    pub fn set_winner(&mut self, is_winner: bool) {
        self.outcome.is_winner = Some(is_winner);
    }

    /// Live or archived order
    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.book.get(order_id).or_else(|| self.archive.get(order_id))
    }

    pub fn best_bid(&self) -> Option<(Price, Money)> {
        self.book.best_bid()
    }

    pub fn best_ask(&self) -> Option<(Price, Money)> {
        self.book.best_ask()
    }

    /// (price, aggregate quantity) per side, best first
    pub fn depth_snapshot(&self, levels: usize) -> OrderBookSnapshot {
        OrderBookSnapshot {
            outcome_id: self.outcome.outcome_id,
            bids: self.book.depth(Side::Back, levels).collect(),
            asks: self.book.depth(Side::Lay, levels).collect(),
        }
    }
}

/// Order book depth for one outcome
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookSnapshot {
    pub outcome_id: OutcomeId,
    pub bids: Vec<(Price, Money)>,
    pub asks: Vec<(Price, Money)>,
}

impl OrderBookSnapshot {
    /// Restartable iteration over one side
    pub fn side(&self, side: Side) -> impl Iterator<Item = (Price, Money)> + '_ {
        let levels = match side {
            Side::Back => &self.bids,
            Side::Lay => &self.asks,
        };
        levels.iter().copied()
    }
}
