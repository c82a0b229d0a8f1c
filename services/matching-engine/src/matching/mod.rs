//! Matching logic module
//!
//! Implements price-time priority matching as a read-only plan

pub mod crossing;
pub mod executor;

pub use crossing::can_match;
pub use executor::{Disposition, MatchExecutor, MatchPlan, PlannedFill};
