//! Matching Engine Service
//!
//! Per-outcome order book and price-time priority matching for the
//! prediction-market trading core.
//!
//! **Key Invariants:**
//! - Price-time priority strictly enforced (arrival sequence breaks ties)
//! - Every trade executes at the maker's price
//! - No self-matches; an order that would cross its owner is rejected whole
//! - Matching is planned read-only and committed only when nothing can fail
//! - Conservation of quantity: Σ trade quantity == Σ filled quantity per side

pub mod book;
pub mod matching;
pub mod engine;
pub mod events;

pub use book::{BookLimits, OrderBook};
pub use engine::{CloseSummary, EngineError, Execution, MatchingEngine, OrderBookSnapshot, SubmitResult};
pub use matching::{Disposition, MatchPlan, PlannedFill};
