//! Ledger errors

use thiserror::Error;
use types::errors::{MoneyError, TradingError};
use types::ids::{MarketId, OutcomeId, UserId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Position arithmetic failed: {0}")]
    Money(#[from] MoneyError),

    #[error("Trade {sequence} on outcome {outcome_id} already applied (last {last_applied})")]
    OutOfOrder {
        outcome_id: OutcomeId,
        sequence: u64,
        last_applied: u64,
    },

    #[error("Positions of user {user_id} in market {market_id} are settled")]
    AlreadySettled { market_id: MarketId, user_id: UserId },
}

impl From<LedgerError> for TradingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Money(err) => TradingError::Money(err),
            other => TradingError::Fatal {
                message: other.to_string(),
            },
        }
    }
}
