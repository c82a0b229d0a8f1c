//! Position Ledger Service
//!
//! Single writer of positions. Every position is a fold of the trades that
//! reference it, so the ledger can always be rebuilt from the trade log with
//! `PositionLedger::replay` and compared against the live copy.

pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::{PositionLedger, StagedPositions};
