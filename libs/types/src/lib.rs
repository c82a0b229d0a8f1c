//! Types library for the prediction-market trading core
//!
//! This library provides the core type definitions shared by the matching
//! engine, position ledger, settlement processor and trading core facade.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, TradeId, UserId, MarketId, OutcomeId, ReservationId)
//! - `numeric`: Fixed-point decimal types (Money, Price)
//! - `order`: Order lifecycle types
//! - `trade`: Trade execution types
//! - `market`: Markets, outcomes and the lifecycle state machine
//! - `position`: Position tracking types
//! - `settlement`: Settlement records and payout instructions
//! - `time`: Nanosecond timestamps and clocks
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod order;
pub mod trade;
pub mod market;
pub mod position;
pub mod settlement;
pub mod time;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::trade::*;
    pub use crate::market::*;
    pub use crate::position::*;
    pub use crate::settlement::*;
    pub use crate::time::*;
    pub use crate::errors::*;
}
