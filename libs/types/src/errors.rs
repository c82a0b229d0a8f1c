//! Error types for the trading core
//!
//! Comprehensive error taxonomy using thiserror. Every leaf error carries
//! enough context (order, outcome, market ids) for a caller to decide between
//! retrying and aborting; `TradingError::category` makes that decision
//! explicit.

use thiserror::Error;

/// Top-level trading error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Lock timeout on outcome {outcome_id}")]
    LockTimeout { outcome_id: String },

    #[error("Outcome {outcome_id} busy after {attempts} attempts")]
    Busy { outcome_id: String, attempts: u32 },

    #[error("Fatal: {message}")]
    Fatal { message: String },
}

/// Coarse error classes the API boundary reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rejected synchronously, never partially applied
    Validation,
    /// Contention; safe to retry
    Concurrency,
    /// Balance or liquidity shortfall; aborted without side effects
    Resource,
    /// Idempotent replays and lost races; callers treat as no-ops
    Integrity,
    /// Irrecoverable; the operation was rejected as a whole
    Fatal,
}

impl TradingError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TradingError::Money(MoneyError::InvalidPrice { .. })
            | TradingError::Money(MoneyError::Parse { .. })
            | TradingError::Money(MoneyError::Precision { .. })
            | TradingError::Money(MoneyError::Negative { .. }) => ErrorCategory::Validation,
            TradingError::Money(_) => ErrorCategory::Fatal,
            TradingError::Order(err) => err.category(),
            TradingError::Market(_) => ErrorCategory::Validation,
            TradingError::Settlement(SettlementError::Duplicate { .. }) => ErrorCategory::Integrity,
            TradingError::Settlement(SettlementError::NotSettleable { .. }) => {
                ErrorCategory::Validation
            }
            TradingError::Settlement(_) => ErrorCategory::Fatal,
            TradingError::Wallet(WalletError::InsufficientBalance { .. }) => {
                ErrorCategory::Resource
            }
            TradingError::Wallet(_) => ErrorCategory::Fatal,
            TradingError::LockTimeout { .. } | TradingError::Busy { .. } => {
                ErrorCategory::Concurrency
            }
            TradingError::Fatal { .. } => ErrorCategory::Fatal,
        }
    }

    /// Only contention errors are worth retrying unchanged
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Concurrency
    }
}

/// Fixed-point arithmetic errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Negative result: {lhs} - {rhs}")]
    NegativeResult { lhs: String, rhs: String },

    #[error("Negative amount: {value}")]
    Negative { value: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid amount: {input}")]
    Parse { input: String },

    #[error("Amount {value} has more than {max_scale} fractional digits")]
    Precision { value: String, max_scale: u32 },

    #[error("Invalid price: {value}")]
    InvalidPrice { value: String },
}

/// Order-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Invalid price for order {order_id}: {reason}")]
    InvalidPrice { order_id: String, reason: String },

    #[error("Invalid quantity for order {order_id}: {reason}")]
    InvalidQuantity { order_id: String, reason: String },

    #[error("Stake {stake} outside [{min}, {max}]")]
    StakeOutOfRange { stake: String, min: String, max: String },

    #[error("Order not found: {order_id}")]
    NotFound { order_id: String },

    #[error("Order {order_id} does not belong to the requesting user")]
    NotOwner { order_id: String },

    #[error("Order already in terminal state: {status}")]
    AlreadyTerminal { status: String },

    #[error("Fill of {fill} exceeds remaining {remaining} on order {order_id}")]
    Overfill {
        order_id: String,
        fill: String,
        remaining: String,
    },

    #[error("Self-match prevented: order {order_id} would cross own resting order on outcome {outcome_id}")]
    SelfMatchNotAllowed { order_id: String, outcome_id: String },

    #[error("Insufficient liquidity on outcome {outcome_id}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        outcome_id: String,
        requested: String,
        available: String,
    },
}

impl OrderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrderError::InvalidPrice { .. }
            | OrderError::InvalidQuantity { .. }
            | OrderError::StakeOutOfRange { .. }
            | OrderError::NotOwner { .. }
            | OrderError::SelfMatchNotAllowed { .. } => ErrorCategory::Validation,
            OrderError::InsufficientLiquidity { .. } => ErrorCategory::Resource,
            OrderError::NotFound { .. } | OrderError::AlreadyTerminal { .. } => {
                ErrorCategory::Integrity
            }
            OrderError::Overfill { .. } => ErrorCategory::Fatal,
        }
    }
}

/// Market and lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Market not found: {market_id}")]
    NotFound { market_id: String },

    #[error("Outcome not found: {outcome_id}")]
    OutcomeNotFound { outcome_id: String },

    #[error("Outcome {outcome_id} does not belong to market {market_id}")]
    OutcomeNotInMarket { market_id: String, outcome_id: String },

    #[error("Market {market_id} is closed for trading")]
    Closed { market_id: String },

    #[error("Invalid transition for market {market_id} from {from} to {to}")]
    InvalidTransition {
        market_id: String,
        from: String,
        to: String,
    },

    #[error("Invalid market specification: {reason}")]
    InvalidSpec { reason: String },

    #[error("Dispute window for market {market_id} open until {until}")]
    DisputeWindowOpen { market_id: String, until: i64 },

    #[error("Only the creator or an admin may {action} market {market_id}")]
    NotAuthorized { market_id: String, action: String },
}

/// Settlement errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Duplicate settlement for market {market_id}, user {user_id}")]
    Duplicate { market_id: String, user_id: String },

    #[error("Market {market_id} cannot be settled in status {status}")]
    NotSettleable { market_id: String, status: String },

    #[error("Trade {sequence} on outcome {outcome_id} is past the closing sequence {cutoff}")]
    TradeAfterClose {
        outcome_id: String,
        sequence: u64,
        cutoff: u64,
    },

    #[error("Payout arithmetic failed for market {market_id}: {source}")]
    Arithmetic {
        market_id: String,
        #[source]
        source: MoneyError,
    },
}

/// Errors reported by the wallet collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Insufficient balance for {user_id} in {currency}: required {required}, available {available}")]
    InsufficientBalance {
        user_id: String,
        currency: String,
        required: String,
        available: String,
    },

    #[error("Reservation not found: {reservation_id}")]
    ReservationNotFound { reservation_id: String },

    #[error("Reservation {reservation_id} holds {held}, cannot take {requested}")]
    InsufficientReservation {
        reservation_id: String,
        requested: String,
        held: String,
    },

    #[error("Wallet unavailable: {reason}")]
    Unavailable { reason: String },
}
