//! Client configuration.
//!
//! Every config has sensible defaults, `with_*` builder setters and a `from_env` constructor
//! that applies environment overrides on top of the defaults:
//!
//! | Variable                    | Meaning                                   |
//! |-----------------------------|-------------------------------------------|
//! | `LEDGER_CHAIN`              | `steem` or `golos`                        |
//! | `LEDGER_NODES`              | comma separated RPC node urls             |
//! | `LEDGER_REQUEST_TIMEOUT_MS` | per RPC request timeout                   |
//! | `TICKER_TIMEOUT_MS`         | per price source request timeout          |
//! | `TICKER_CACHE_TTL_SECS`     | composite price cache time-to-live        |

use crate::{chain::Chain, error::LedgerError};
use std::{str::FromStr, time::Duration};
use url::Url;

/// Batch size used when paginating account history.
pub const HISTORY_BATCH_SIZE: u64 = 1000;

/// Time-to-live of the [`ConversionRates`](crate::convert::ConversionRates) snapshot.
pub const DEFAULT_RATES_TTL: Duration = Duration::from_secs(5 * 60);

/// Per price source request timeout.
pub const DEFAULT_TICKER_TIMEOUT: Duration = Duration::from_secs(2);

/// Composite price cache time-to-live.
pub const DEFAULT_PRICE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Ledger connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Ledger network
    pub chain: Chain,
    /// RPC nodes, tried in order
    pub nodes: Vec<Url>,
    /// Timeout of a single RPC request
    pub request_timeout: Duration,
    /// Time-to-live of the conversion rate snapshot
    pub rates_ttl: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::for_chain(Chain::default())
    }
}

impl LedgerConfig {
    /// Default configuration for a [`Chain`]: local node first, then its public nodes.
    pub fn for_chain(chain: Chain) -> Self {
        Self {
            chain,
            nodes: chain
                .default_nodes()
                .iter()
                .filter_map(|node| Url::parse(node).ok())
                .collect(),
            request_timeout: Duration::from_secs(10),
            rates_ttl: DEFAULT_RATES_TTL,
        }
    }

    /// Defaults overridden by `LEDGER_*` environment variables.
    pub fn from_env() -> Result<Self, LedgerError> {
        let chain = match std::env::var("LEDGER_CHAIN") {
            Ok(chain) => chain.parse()?,
            Err(_) => Chain::default(),
        };

        let mut config = Self::for_chain(chain);

        if let Ok(nodes) = std::env::var("LEDGER_NODES") {
            let nodes = nodes.split(',').map(str::trim).filter(|node| !node.is_empty());
            config = config.with_nodes(nodes)?;
        }

        if let Some(millis) = env_parse::<u64>("LEDGER_REQUEST_TIMEOUT_MS")? {
            config = config.with_request_timeout(Duration::from_millis(millis));
        }

        Ok(config)
    }

    /// Replace the node list. Fails fast on an empty list or an invalid url.
    pub fn with_nodes<I, S>(mut self, nodes: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let nodes = nodes
            .into_iter()
            .map(|node| parse_node(node.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        if nodes.is_empty() {
            return Err(LedgerError::NodesEmpty);
        }

        self.nodes = nodes;
        Ok(self)
    }

    /// Set RPC request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set conversion rate snapshot time-to-live
    pub fn with_rates_ttl(mut self, ttl: Duration) -> Self {
        self.rates_ttl = ttl;
        self
    }
}

/// Price aggregation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerConfig {
    /// Timeout of each individual price source request
    pub request_timeout: Duration,
    /// Composite price cache time-to-live
    pub cache_ttl: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_TICKER_TIMEOUT,
            cache_ttl: DEFAULT_PRICE_CACHE_TTL,
        }
    }
}

impl TickerConfig {
    /// Defaults overridden by `TICKER_*` environment variables.
    pub fn from_env() -> Result<Self, LedgerError> {
        let mut config = Self::default();

        if let Some(millis) = env_parse::<u64>("TICKER_TIMEOUT_MS")? {
            config = config.with_request_timeout(Duration::from_millis(millis));
        }
        if let Some(secs) = env_parse::<u64>("TICKER_CACHE_TTL_SECS")? {
            config = config.with_cache_ttl(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set per source request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set composite price cache time-to-live
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

fn parse_node(node: &str) -> Result<Url, LedgerError> {
    let url = Url::parse(node).map_err(|error| LedgerError::InvalidNode {
        url: node.to_string(),
        reason: error.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(LedgerError::InvalidNode {
            url: node.to_string(),
            reason: format!("unsupported scheme {scheme}, expected http or https"),
        }),
    }
}

/// Parse environment variable `key`, `None` when unset.
pub fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, LedgerError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| LedgerError::InvalidConfig { key, value }),
        Err(_) => Ok(None),
    }
}
