use crate::ticker::{CurrencyPair, ExchangeId};
use thiserror::Error;

/// All errors generated in `social-ledger`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("unsupported ledger network: {0}")]
    UnsupportedChain(String),

    #[error("unsupported exchange: {0}")]
    UnsupportedExchange(String),

    #[error("currency pair {0:?} has an incorrect format, use base/quote e.g. btc/usd")]
    InvalidPair(String),

    #[error("invalid node url {url}: {reason}")]
    InvalidNode { url: String, reason: String },

    #[error("invalid configuration value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("no ledger nodes configured")]
    NodesEmpty,

    #[error("RPC {method} failed: {message}")]
    Rpc { method: String, message: String },

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("malformed ledger response: {0}")]
    Malformed(String),

    #[error("invalid asset amount: {0:?}")]
    InvalidAsset(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("price source {exchange} failed: {message}")]
    Source {
        exchange: ExchangeId,
        message: String,
    },

    #[error("could not fetch any {0} price")]
    NoPrice(CurrencyPair),

    #[error("volume weighted price undefined: total volume is zero")]
    ZeroVolume,

    #[error("division by zero: {0} is zero")]
    ZeroDivisor(&'static str),

    #[error("reward shares result is negative: {0}")]
    NegativeRshares(f64),

    #[error("numeric result is not finite: {0}")]
    NonFinite(&'static str),

    #[error("feed price history is empty")]
    FeedHistoryEmpty,
}

impl LedgerError {
    /// Determine if an error is a configuration error, raised before any network call.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_config(&self) -> bool {
        match self {
            LedgerError::UnsupportedChain(_)
            | LedgerError::UnsupportedExchange(_)
            | LedgerError::InvalidPair(_)
            | LedgerError::InvalidNode { .. }
            | LedgerError::InvalidConfig { .. }
            | LedgerError::NodesEmpty => true,
            _ => false,
        }
    }

    /// Determine if an error originates from a failed lookup against the ledger or a
    /// price source (as opposed to configuration or arithmetic).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            LedgerError::Rpc { .. }
                | LedgerError::Http(_)
                | LedgerError::Malformed(_)
                | LedgerError::InvalidAsset(_)
                | LedgerError::AccountNotFound(_)
                | LedgerError::Source { .. }
                | LedgerError::NoPrice(_)
                | LedgerError::FeedHistoryEmpty
        )
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_is_config() {
        struct TestCase {
            input: LedgerError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: is config w/ LedgerError::UnsupportedChain
                input: LedgerError::UnsupportedChain("bitshares".to_string()),
                expected: true,
            },
            TestCase {
                // TC1: is config w/ LedgerError::InvalidPair
                input: LedgerError::InvalidPair("btcusd".to_string()),
                expected: true,
            },
            TestCase {
                // TC2: is not config w/ LedgerError::Rpc
                input: LedgerError::Rpc {
                    method: "get_account_history".to_string(),
                    message: "timeout".to_string(),
                },
                expected: false,
            },
            TestCase {
                // TC3: is not config w/ LedgerError::ZeroVolume
                input: LedgerError::ZeroVolume,
                expected: false,
            },
            TestCase {
                // TC4: is config w/ LedgerError::NodesEmpty
                input: LedgerError::NodesEmpty,
                expected: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_config();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_ledger_error_is_lookup() {
        let pair: CurrencyPair = "steem/btc".parse().unwrap();

        assert!(LedgerError::NoPrice(pair).is_lookup());
        assert!(LedgerError::Http("connection refused".to_string()).is_lookup());
        assert!(!LedgerError::NegativeRshares(-1.0).is_lookup());
        assert!(!LedgerError::UnsupportedExchange("mtgox".to_string()).is_lookup());
    }
}
