//! Trading core facade
//!
//! Order placement runs entirely under the outcome's lock:
//!
//! 1. plan the match against the book (read-only)
//! 2. reserve the order's worst-case collateral in the wallet
//! 3. stage the position updates for the planned trades
//! 4. lock each fill's collateral from taker and maker reservations
//! 5. commit the plan to the engine, then the staged positions
//! 6. release whatever a finished order no longer needs
//!
//! Anything failing before step 5 is undone (unlocks, then release), so a
//! rejected order leaves book, ledger and balances exactly as they were.

use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use matching_engine::{BookLimits, Execution, MatchPlan, MatchingEngine, OrderBookSnapshot};
use position_ledger::PositionLedger;
use settlement::{pool_from_trades, OutcomePool, SettlementOutcome, SettlementProcessor};
use types::errors::{MarketError, OrderError, SettlementError, TradingError};
use types::ids::{MarketId, OrderId, OutcomeId, ReservationId, UserId};
use types::market::{Market, MarketSpec, MarketStatus, Resolution};
use types::numeric::Money;
use types::order::{NewOrder, Order};
use types::position::MarketPosition;
use types::settlement::{SettlementKind, SettlementRecord};
use types::time::{Clock, SystemClock};
use types::trade::Trade;

use crate::config::{ConfigError, TradingConfig};
use crate::events::{EventBus, MarketEvent, MarketSettledEvent};
use crate::lifecycle;
use crate::query::{category_counts, trending, MarketFilter};
use crate::state::{MarketState, OutcomeShard};
use crate::trade_log::TradeCursor;
use crate::wallet::Wallet;

/// An accepted order and the trades it produced as taker
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub order: Order,
    pub trades: Vec<Trade>,
}

impl Placement {
    pub fn is_filled(&self) -> bool {
        self.order.is_filled()
    }
}

pub struct TradingCore {
    config: TradingConfig,
    clock: Arc<dyn Clock>,
    wallet: Arc<dyn Wallet>,
    markets: DashMap<MarketId, Arc<MarketState>>,
    outcomes: DashMap<OutcomeId, MarketId>,
    orders: DashMap<OrderId, (MarketId, OutcomeId)>,
    admins: DashSet<UserId>,
    ledger: PositionLedger,
    settlement: SettlementProcessor,
    events: EventBus,
}

impl TradingCore {
    pub fn new(config: TradingConfig, wallet: Arc<dyn Wallet>, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let admins = config.admins.iter().copied().collect();
        Ok(Self {
            clock,
            wallet,
            markets: DashMap::new(),
            outcomes: DashMap::new(),
            orders: DashMap::new(),
            admins,
            ledger: PositionLedger::new(),
            settlement: SettlementProcessor::new(),
            events: EventBus::new(config.event_capacity),
            config,
        })
    }

    pub fn with_system_clock(config: TradingConfig, wallet: Arc<dyn Wallet>) -> Result<Self, ConfigError> {
        Self::new(config, wallet, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn grant_admin(&self, user_id: UserId) {
        self.admins.insert(user_id);
    }

    // ---------------------------------------------------------------------
    // Markets
    // ---------------------------------------------------------------------

    pub fn create_market(&self, spec: &MarketSpec) -> Result<Market, TradingError> {
        let now = self.clock.now_nanos();
        let market = Market::create(spec, now)?;
        let limits = BookLimits {
            min_bet: market.min_bet,
            max_bet: market.max_bet,
            price_tick: self.config.price_tick,
            quantity_step: self.config.quantity_step,
        };
        let shards = market
            .outcomes
            .iter()
            .map(|outcome| OutcomeShard::new(MatchingEngine::new(outcome.clone(), limits)))
            .collect();

        for outcome in &market.outcomes {
            self.outcomes.insert(outcome.outcome_id, market.market_id);
        }
        self.markets
            .insert(market.market_id, Arc::new(MarketState::new(market.clone(), shards)));

        info!(
            market_id = %market.market_id,
            title = %market.title,
            market_type = ?market.market_type,
            outcomes = market.outcomes.len(),
            creator = %market.creator,
            "Market created"
        );
        Ok(market)
    }

    /// Market with live outcome prices, volume and participant count
    pub fn get_market(&self, market_id: MarketId) -> Result<Market, TradingError> {
        let state = self.market_state(market_id)?;
        self.market_view(&state)
    }

    pub fn list_markets(&self, filter: &MarketFilter) -> Result<Vec<Market>, TradingError> {
        Ok(filter.apply(self.all_markets()?))
    }

    /// Open markets created in the last 24 hours, highest volume first
    ///
    /// [`crate::DEFAULT_TRENDING_LIMIT`] is the usual page size.
    pub fn trending_markets(&self, limit: usize) -> Result<Vec<Market>, TradingError> {
        let now = self.clock.now_nanos();
        Ok(trending(self.all_markets()?, now, limit))
    }

    /// Open markets per category
    pub fn market_categories(&self) -> Vec<(String, usize)> {
        let markets: Vec<Market> = self
            .states()
            .iter()
            .map(|state| state.market.read().clone())
            .collect();
        category_counts(&markets)
    }

    /// Close a market on request of its creator or an admin
    pub fn close_market(&self, market_id: MarketId, requested_by: UserId) -> Result<(), TradingError> {
        let state = self.market_state(market_id)?;
        let creator = state.market.read().creator;
        if requested_by != creator && !self.admins.contains(&requested_by) {
            return Err(MarketError::NotAuthorized {
                market_id: market_id.to_string(),
                action: "close".to_string(),
            }
            .into());
        }
        self.close_state(&state, self.clock.now_nanos())
    }

    /// Close every open market past its closing time
    pub fn close_expired_markets(&self) -> Result<Vec<MarketId>, TradingError> {
        let now = self.clock.now_nanos();
        let mut closed = Vec::new();
        for state in self.states() {
            let (market_id, expired) = {
                let market = state.market.read();
                (market.market_id, market.is_past_deadline(now))
            };
            if expired && self.close_if_open(&state, now)? {
                closed.push(market_id);
            }
        }
        Ok(closed)
    }

    pub fn request_resolution(
        &self,
        market_id: MarketId,
        resolution: Resolution,
        requested_by: Option<UserId>,
    ) -> Result<(), TradingError> {
        let now = self.clock.now_nanos();
        let state = self.market_state(market_id)?;
        if state.market.read().is_past_deadline(now) {
            self.close_if_open(&state, now)?;
        }
        let event = lifecycle::request_resolution(
            &state,
            resolution,
            requested_by,
            self.config.dispute_window_nanos(),
            now,
        )?;
        self.events.publish(market_id, [event]);
        Ok(())
    }

    pub fn finalize_resolution(&self, market_id: MarketId) -> Result<MarketStatus, TradingError> {
        let state = self.market_state(market_id)?;
        let event = lifecycle::finalize(&state, &self.config, self.clock.now_nanos())?;
        self.events.publish(market_id, [event]);
        let status = state.market.read().status;
        Ok(status)
    }

    pub fn dispute_resolution(&self, market_id: MarketId, reason: &str) -> Result<(), TradingError> {
        let state = self.market_state(market_id)?;
        let event = lifecycle::dispute(&state, reason, self.clock.now_nanos())?;
        self.events.publish(market_id, [event]);
        Ok(())
    }

    /// Settle a resolved or void market and pay out through the wallet
    ///
    /// Safe to call repeatedly: records are created once and payouts carry
    /// idempotency keys, so a retry after a wallet failure completes the
    /// remaining payouts without paying anyone twice.
    pub fn settle_market(&self, market_id: MarketId) -> Result<SettlementOutcome, TradingError> {
        let now = self.clock.now_nanos();
        let state = self.market_state(market_id)?;
        let market = state.market.read().clone();

        let pools = market
            .outcomes
            .iter()
            .map(|outcome| {
                let shard = state.shard(&outcome.outcome_id).ok_or_else(|| SettlementError::NotSettleable {
                    market_id: market_id.to_string(),
                    status: market.status.to_string(),
                })?;
                shard
                    .trades
                    .with_trades_up_to(u64::MAX, |trades| pool_from_trades(&market, outcome.outcome_id, trades))
            })
            .collect::<Result<Vec<OutcomePool>, SettlementError>>()?;

        let positions = self.ledger.positions_for_market(market_id);
        let outcome = self.settlement.settle(&market, &positions, &pools, now)?;

        for instruction in outcome.instructions.iter().chain(outcome.creator_fee.iter()) {
            self.wallet.payout(instruction).map_err(|err| {
                error!(
                    %market_id,
                    user_id = %instruction.user_id,
                    key = %instruction.idempotency_key,
                    error = %err,
                    "Payout failed"
                );
                err
            })?;
        }
        self.ledger.settle_market(market_id, now);

        let kind = match market.status {
            MarketStatus::Void => SettlementKind::Refund,
            _ => SettlementKind::Payout,
        };
        let event = MarketSettledEvent {
            market_id,
            kind,
            records: outcome.records.len(),
            total_payout: outcome.total_payout()?,
            total_fees: outcome.total_fees()?,
            timestamp: now,
        };
        // Announced on the first call whose payouts all went through
        if self.settlement.mark_announced(market_id) {
            info!(
                %market_id,
                kind = ?kind,
                records = event.records,
                total_payout = %event.total_payout,
                total_fees = %event.total_fees,
                "Payouts issued"
            );
            self.events.publish(market_id, [MarketEvent::Settled(event)]);
        }
        Ok(outcome)
    }

    pub fn settlement_records(&self, market_id: MarketId) -> Vec<SettlementRecord> {
        self.settlement.records_for_market(market_id)
    }

    /// Stream of the market's events from now on, bounded by `event_capacity`
    pub fn subscribe(&self, market_id: MarketId) -> Result<broadcast::Receiver<MarketEvent>, TradingError> {
        self.market_state(market_id)?;
        Ok(self.events.subscribe(market_id))
    }

    // ---------------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------------

    pub fn place_order(&self, request: NewOrder) -> Result<Placement, TradingError> {
        let now = self.clock.now_nanos();
        let (state, index) = self.locate_outcome(&request.outcome_id)?;
        let (market_id, currency) = self.ensure_trading_open(&state, now)?;
        let shard = &state.shards[index];

        let mut engine = shard.lock(self.config.lock_timeout(), self.config.lock_retries)?;
        let mut plan = engine
            .plan(&request, now)
            .map_err(|err| rejected(&request, err.into()))?;

        let amount = request.max_collateral()?;
        let reservation_id = self
            .wallet
            .reserve(request.user_id, &currency, amount)
            .map_err(|err| rejected(&request, err.into()))?;
        plan.attach_reservation(reservation_id, amount);

        let execution = match self.execute(&mut engine, plan, reservation_id, now) {
            Ok(execution) => execution,
            Err(err) => {
                self.release(reservation_id, amount);
                return Err(err);
            }
        };
        let Execution {
            order,
            trades,
            makers,
            events,
        } = execution;

        shard.trades.append(&trades);
        self.orders.insert(order.order_id, (market_id, shard.outcome_id));
        state.participants.insert(order.user_id);
        if order.status.is_terminal() {
            self.release_unused(&order);
        }
        for maker in makers.iter().filter(|m| m.status.is_terminal()) {
            self.release_unused(maker);
        }
        self.events.publish(market_id, events.into_iter().map(MarketEvent::from));
        drop(engine);

        debug!(
            order_id = %order.order_id,
            user_id = %order.user_id,
            outcome_id = %order.outcome_id,
            side = ?order.side,
            status = %order.status,
            trades = trades.len(),
            "Order placed"
        );
        Ok(Placement { order, trades })
    }

    /// Cancel a resting order; only its owner may
    pub fn cancel_order(&self, order_id: OrderId, requested_by: UserId) -> Result<Order, TradingError> {
        let now = self.clock.now_nanos();
        let (state, index) = self.locate_order(&order_id)?;
        let shard = &state.shards[index];

        let mut engine = shard.lock(self.config.lock_timeout(), self.config.lock_retries)?;
        let (order, event) = engine.cancel_order(&order_id, requested_by, now)?;
        self.release_unused(&order);
        self.events.publish(order.market_id, [MarketEvent::from(event)]);
        drop(engine);

        debug!(%order_id, user_id = %requested_by, "Order cancelled");
        Ok(order)
    }

    pub fn get_order(&self, order_id: OrderId) -> Result<Order, TradingError> {
        let (state, index) = self.locate_order(&order_id)?;
        let engine = state.shards[index].lock(self.config.lock_timeout(), self.config.lock_retries)?;
        engine.order(&order_id).cloned().ok_or_else(|| {
            OrderError::NotFound {
                order_id: order_id.to_string(),
            }
            .into()
        })
    }

    pub fn get_order_book_depth(&self, outcome_id: OutcomeId, levels: usize) -> Result<OrderBookSnapshot, TradingError> {
        let (state, index) = self.locate_outcome(&outcome_id)?;
        let engine = state.shards[index].lock(self.config.lock_timeout(), self.config.lock_retries)?;
        Ok(engine.depth_snapshot(levels))
    }

    pub fn get_position(&self, user_id: UserId, market_id: MarketId) -> Result<Option<MarketPosition>, TradingError> {
        Ok(self.ledger.user_positions(user_id, market_id)?)
    }

    /// Trades of an outcome with sequence greater than `since_sequence`
    pub fn get_trade_history(&self, outcome_id: OutcomeId, since_sequence: u64) -> Result<TradeCursor, TradingError> {
        let (state, index) = self.locate_outcome(&outcome_id)?;
        Ok(TradeCursor::new(state.shards[index].trades.clone(), since_sequence))
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// Steps 3 to 5 of placement; undoes its own wallet locks on failure
    fn execute(
        &self,
        engine: &mut MatchingEngine,
        plan: MatchPlan,
        reservation_id: ReservationId,
        now: i64,
    ) -> Result<Execution, TradingError> {
        let trades: Vec<Trade> = plan.trades().cloned().collect();
        let staged = self.ledger.prepare(&trades)?;

        let mut locked: Vec<(ReservationId, Money)> = Vec::with_capacity(plan.fills.len() * 2);
        for fill in &plan.fills {
            let legs = [
                (Some(reservation_id), fill.taker_collateral),
                (fill.maker_reservation, fill.maker_collateral),
            ];
            for (reservation, amount) in legs {
                let Some(reservation) = reservation else {
                    continue;
                };
                if amount.is_zero() {
                    continue;
                }
                if let Err(err) = self.wallet.lock_to_position(reservation, amount) {
                    error!(
                        order_id = %plan.taker.order_id,
                        %reservation,
                        %amount,
                        error = %err,
                        "Locking fill collateral failed, rolling back"
                    );
                    self.unlock(&locked);
                    return Err(err.into());
                }
                locked.push((reservation, amount));
            }
        }

        match engine.commit(plan, now) {
            Ok(execution) => {
                self.ledger.commit(staged);
                Ok(execution)
            }
            Err(err) => {
                error!(error = %err, "Commit failed after locking collateral, rolling back");
                self.unlock(&locked);
                Err(err.into())
            }
        }
    }

    fn unlock(&self, locked: &[(ReservationId, Money)]) {
        for (reservation, amount) in locked.iter().rev() {
            if let Err(err) = self.wallet.unlock_from_position(*reservation, *amount) {
                error!(%reservation, %amount, error = %err, "Compensating unlock failed");
            }
        }
    }

    fn release(&self, reservation: ReservationId, amount: Money) {
        if let Err(err) = self.wallet.release(reservation, amount) {
            error!(%reservation, %amount, error = %err, "Releasing reservation failed");
        }
    }

    /// Hand back what a terminal order never used and retire its reservation
    fn release_unused(&self, order: &Order) {
        if let Some(reservation) = order.reservation_id {
            self.release(reservation, order.unused_reservation());
        }
    }

    /// Market id and currency, closing the market first if its time is up
    fn ensure_trading_open(&self, state: &MarketState, now: i64) -> Result<(MarketId, String), TradingError> {
        let (market_id, currency, past_deadline, open) = {
            let market = state.market.read();
            (
                market.market_id,
                market.currency.clone(),
                market.is_past_deadline(now),
                market.is_trading_open(now),
            )
        };
        if past_deadline {
            self.close_if_open(state, now)?;
        }
        if past_deadline || !open {
            return Err(MarketError::Closed {
                market_id: market_id.to_string(),
            }
            .into());
        }
        Ok((market_id, currency))
    }

    fn close_state(&self, state: &MarketState, now: i64) -> Result<(), TradingError> {
        let report = lifecycle::close(state, &self.config, now)?;
        for order in &report.cancelled {
            self.release_unused(order);
        }
        let market_id = state.market.read().market_id;
        self.events.publish(market_id, report.events);
        Ok(())
    }

    /// Close unless another caller got there first
    fn close_if_open(&self, state: &MarketState, now: i64) -> Result<bool, TradingError> {
        match self.close_state(state, now) {
            Ok(()) => Ok(true),
            Err(TradingError::Market(MarketError::InvalidTransition { .. })) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn market_view(&self, state: &MarketState) -> Result<Market, TradingError> {
        let mut outcomes = Vec::with_capacity(state.shards.len());
        for shard in &state.shards {
            let engine = shard.lock(self.config.lock_timeout(), self.config.lock_retries)?;
            outcomes.push(engine.outcome().clone());
        }
        let mut market = state.market.read().clone();
        market.total_volume = Money::checked_sum(outcomes.iter().map(|o| o.total_volume))?;
        market.participant_count = u32::try_from(state.participants.len()).unwrap_or(u32::MAX);
        market.outcomes = outcomes;
        Ok(market)
    }

    fn all_markets(&self) -> Result<Vec<Market>, TradingError> {
        self.states().iter().map(|state| self.market_view(state)).collect()
    }

    /// Snapshot of the registry, so no map guard is held across locks
    fn states(&self) -> Vec<Arc<MarketState>> {
        self.markets.iter().map(|entry| entry.value().clone()).collect()
    }

    fn market_state(&self, market_id: MarketId) -> Result<Arc<MarketState>, TradingError> {
        self.markets
            .get(&market_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                MarketError::NotFound {
                    market_id: market_id.to_string(),
                }
                .into()
            })
    }

    fn locate_outcome(&self, outcome_id: &OutcomeId) -> Result<(Arc<MarketState>, usize), TradingError> {
        let not_found = || -> TradingError {
            MarketError::OutcomeNotFound {
                outcome_id: outcome_id.to_string(),
            }
            .into()
        };
        let market_id = self.outcomes.get(outcome_id).map(|e| *e.value()).ok_or_else(not_found)?;
        let state = self.market_state(market_id)?;
        let index = state
            .shards
            .iter()
            .position(|s| &s.outcome_id == outcome_id)
            .ok_or_else(not_found)?;
        Ok((state, index))
    }

    fn locate_order(&self, order_id: &OrderId) -> Result<(Arc<MarketState>, usize), TradingError> {
        let (_, outcome_id) = self.orders.get(order_id).map(|e| *e.value()).ok_or_else(|| {
            TradingError::from(OrderError::NotFound {
                order_id: order_id.to_string(),
            })
        })?;
        self.locate_outcome(&outcome_id)
    }
}

fn rejected(request: &NewOrder, err: TradingError) -> TradingError {
    warn!(
        user_id = %request.user_id,
        outcome_id = %request.outcome_id,
        side = ?request.side,
        quantity = %request.quantity,
        error = %err,
        "Order rejected"
    );
    err
}
