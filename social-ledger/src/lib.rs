//! # Social Ledger
//! Read-only client toolkit for the `steem` and `golos` social ledgers.
//!
//! * [`history`]: lazy, filterable and restartable walks over an account's operation log.
//! * [`convert`]: token, power, reward share and pegged currency conversions against a
//!   cached snapshot of ledger rates.
//! * [`ticker`] & [`markets`]: volume weighted composite prices from several exchanges,
//!   tolerant to individual exchange failures.
//! * [`account`] & [`post`]: convenience views built on the above.
//!
//! Everything talks to the ledger through the [`LedgerClient`] trait, implemented over
//! JSON-RPC by [`HttpLedgerClient`] and in-process by [`InMemoryLedger`].

/// Ledger account facade.
pub mod account;

/// Ledger amount strings.
pub mod asset;

/// Time-to-live caches.
pub mod cache;

/// Supported ledger networks.
pub mod chain;

/// [`LedgerClient`] trait, its implementations and the RPC response model.
pub mod client;

/// Configuration structs and defaults.
pub mod config;

/// Reward and currency conversions.
pub mod convert;

/// All errors generated in `social-ledger`.
pub mod error;

/// Account history walker.
pub mod history;

/// Implied prices of a ledger's token and pegged currency.
pub mod markets;

/// Post and comment facade.
pub mod post;

/// Composite exchange prices.
pub mod ticker;

pub use account::Account;
pub use asset::Asset;
pub use chain::Chain;
pub use client::{LedgerClient, http::HttpLedgerClient, memory::InMemoryLedger};
pub use config::{LedgerConfig, TickerConfig};
pub use convert::{ConversionRates, Converter};
pub use error::LedgerError;
pub use history::{HistoryWalker, Operation, OperationFilter, OperationStream};
pub use markets::Markets;
pub use post::Post;
pub use ticker::{CurrencyPair, ExchangeId, PriceQuote, PriceSource, Ticker, spread, spread_decimal};

