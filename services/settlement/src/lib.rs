//! Settlement Service
//!
//! Turns a resolved (or voided) market plus its final positions into
//! per-user settlement records and payout instructions. Computation lives in
//! [`payout`] and has no side effects; [`processor`] stores the records
//! under `(market, user)` so repeated settlement is a no-op.

pub mod payout;
pub mod processor;

pub use payout::{on_market_resolved, pool_from_trades, OutcomePool};
pub use processor::{SettlementOutcome, SettlementProcessor};
