//! Market lifecycle transitions that span every outcome
//!
//! Closing is a barrier: it holds every outcome lock of the market, so a
//! match already in progress finishes first and nothing can commit after the
//! closing sequence is recorded.

use tracing::info;

use types::errors::TradingError;
use types::ids::UserId;
use types::market::{MarketStatus, Resolution};
use types::order::Order;

use crate::config::TradingConfig;
use crate::events::{MarketEvent, StatusChangedEvent};
use crate::state::MarketState;

#[derive(Debug, Clone, PartialEq)]
pub struct CloseReport {
    /// Resting orders cancelled by the close; their reservations are still held
    pub cancelled: Vec<Order>,
    pub events: Vec<MarketEvent>,
}

/// `open → closed` across every outcome
pub fn close(state: &MarketState, config: &TradingConfig, timestamp: i64) -> Result<CloseReport, TradingError> {
    let mut engines = state.lock_all(config.lock_timeout(), config.lock_retries)?;
    let mut market = state.market.write();
    let from = market.status;
    market.close(timestamp)?;

    let mut cancelled = Vec::new();
    let mut events = Vec::new();
    for engine in engines.iter_mut() {
        let summary = engine.close(timestamp);
        if let Some(outcome) = market
            .outcomes
            .iter_mut()
            .find(|o| o.outcome_id == engine.outcome_id())
        {
            outcome.closing_sequence = Some(summary.closing_sequence);
        }
        events.extend(summary.events.into_iter().map(MarketEvent::from));
        cancelled.extend(summary.cancelled);
    }
    events.push(status_changed(market.market_id, from, market.status, timestamp));

    info!(
        market_id = %market.market_id,
        cancelled = cancelled.len(),
        closing_sequences = ?market.outcomes.iter().map(|o| o.closing_sequence.unwrap_or(0)).collect::<Vec<_>>(),
        "Market closed"
    );
    Ok(CloseReport { cancelled, events })
}

/// `closed → resolving`, opening the dispute window
pub fn request_resolution(
    state: &MarketState,
    resolution: Resolution,
    requested_by: Option<UserId>,
    dispute_window_nanos: i64,
    timestamp: i64,
) -> Result<MarketEvent, TradingError> {
    let mut market = state.market.write();
    let from = market.status;
    market.request_resolution(resolution.clone(), requested_by, dispute_window_nanos, timestamp)?;

    info!(
        market_id = %market.market_id,
        resolution = ?resolution,
        dispute_until = ?market.resolution.as_ref().map(|r| r.dispute_until),
        "Resolution requested"
    );
    Ok(status_changed(market.market_id, from, market.status, timestamp))
}

/// `resolving → resolved | void`; winner flags reach the engines too
pub fn finalize(state: &MarketState, config: &TradingConfig, timestamp: i64) -> Result<MarketEvent, TradingError> {
    let mut engines = state.lock_all(config.lock_timeout(), config.lock_retries)?;
    let mut market = state.market.write();
    let from = market.status;
    let status = market.finalize(timestamp)?;

    if status == MarketStatus::Resolved {
        for engine in engines.iter_mut() {
            let is_winner = market
                .outcome(&engine.outcome_id())
                .and_then(|o| o.is_winner)
                .unwrap_or(false);
            engine.set_winner(is_winner);
        }
    }

    info!(
        market_id = %market.market_id,
        status = %status,
        winner = ?market.winning_outcome(),
        "Market finalized"
    );
    Ok(status_changed(market.market_id, from, status, timestamp))
}

/// `resolving → void` after a successful dispute
pub fn dispute(state: &MarketState, reason: &str, timestamp: i64) -> Result<MarketEvent, TradingError> {
    let mut market = state.market.write();
    let from = market.status;
    market.dispute(reason, timestamp)?;

    info!(market_id = %market.market_id, reason, "Resolution disputed, market void");
    Ok(status_changed(market.market_id, from, market.status, timestamp))
}

fn status_changed(
    market_id: types::ids::MarketId,
    from: MarketStatus,
    to: MarketStatus,
    timestamp: i64,
) -> MarketEvent {
    MarketEvent::StatusChanged(StatusChangedEvent {
        market_id,
        from,
        to,
        timestamp,
    })
}
