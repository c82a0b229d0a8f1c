//! Trading Core
//!
//! Entry point of the prediction-market trading core. `TradingCore` owns the
//! market registry, one matching engine per outcome, the position ledger and
//! the settlement store, and drives the wallet collaborator.
//!
//! ```text
//!  place_order ──► outcome lock ──► plan ──► wallet reserve/lock
//!                                     │
//!                                     ▼
//!                        engine commit ──► position ledger ──► trade log
//!
//!  close ──► all outcome locks (barrier) ──► closing sequences
//!  resolve ──► finalize ──► settle ──► wallet payouts
//! ```
//!
//! ```
//! use std::sync::Arc;
//! use trading_core::{InMemoryWallet, TradingConfig, TradingCore};
//!
//! let wallet = Arc::new(InMemoryWallet::new());
//! let core = TradingCore::with_system_clock(TradingConfig::default(), wallet)?;
//! assert!(core.market_categories().is_empty());
//! # Ok::<(), trading_core::ConfigError>(())
//! ```

pub mod config;
pub mod service;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod query;
pub mod state;
pub mod trade_log;
pub mod wallet;

pub use service::{Placement, TradingCore};
pub use config::{ConfigError, TradingConfig};
pub use events::{MarketEvent, MarketSettledEvent, StatusChangedEvent};
pub use logging::LoggingConfig;
pub use query::{MarketFilter, MarketSort, DEFAULT_TRENDING_LIMIT};
pub use trade_log::TradeCursor;
pub use wallet::{Balance, InMemoryWallet, Wallet};
