use crate::{error::LedgerError, ticker::CurrencyPair};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported social ledger networks.
///
/// Both networks share the same RPC surface and accounting rules, they differ only in
/// asset symbols, front-end urls and public nodes.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Default,
    Display,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    #[display("steem")]
    Steem,
    #[display("golos")]
    Golos,
}

/// Local node every [`Chain`] tries before falling back to its public nodes.
pub const LOCAL_NODE: &str = "http://127.0.0.1:8090";

impl Chain {
    /// Liquid token symbol, eg/ "STEEM".
    pub fn token_symbol(&self) -> &'static str {
        match self {
            Chain::Steem => "STEEM",
            Chain::Golos => "GOLOS",
        }
    }

    /// Token-backed pegged currency symbol, eg/ "SBD".
    pub fn currency_symbol(&self) -> &'static str {
        match self {
            Chain::Steem => "SBD",
            Chain::Golos => "GBG",
        }
    }

    /// Vesting share symbol, eg/ "VESTS".
    pub fn vests_symbol(&self) -> &'static str {
        match self {
            Chain::Steem => "VESTS",
            Chain::Golos => "GESTS",
        }
    }

    /// Web front-end used to build post urls.
    pub fn url_prefix(&self) -> &'static str {
        match self {
            Chain::Steem => "https://steemit.com",
            Chain::Golos => "https://golos.io",
        }
    }

    /// Public RPC nodes, in order of preference.
    pub fn public_nodes(&self) -> &'static [&'static str] {
        match self {
            Chain::Steem => &["https://api.steemit.com", "https://api.justyy.com"],
            Chain::Golos => &["https://api.golos.id"],
        }
    }

    /// Local node followed by the public nodes.
    pub fn default_nodes(&self) -> Vec<String> {
        std::iter::once(LOCAL_NODE)
            .chain(self.public_nodes().iter().copied())
            .map(str::to_string)
            .collect()
    }

    /// Market pair quoting the liquid token in btc.
    pub fn token_btc_pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.token_symbol(), "btc")
    }

    /// Market pair quoting the pegged currency in btc.
    pub fn currency_btc_pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.currency_symbol(), "btc")
    }
}

impl FromStr for Chain {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "steem" => Ok(Chain::Steem),
            "golos" => Ok(Chain::Golos),
            other => Err(LedgerError::UnsupportedChain(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_from_str() {
        assert_eq!("STEEM".parse::<Chain>().unwrap(), Chain::Steem);
        assert_eq!(" golos ".parse::<Chain>().unwrap(), Chain::Golos);
        assert_eq!(
            "bitshares".parse::<Chain>(),
            Err(LedgerError::UnsupportedChain("bitshares".to_string()))
        );
    }

    #[test]
    fn test_default_nodes_prefer_local() {
        let nodes = Chain::Golos.default_nodes();
        assert_eq!(nodes[0], LOCAL_NODE);
        assert_eq!(&nodes[1..], &["https://api.golos.id".to_string()]);
    }

    #[test]
    fn test_market_pairs() {
        assert_eq!(Chain::Steem.token_btc_pair().to_string(), "steem/btc");
        assert_eq!(Chain::Golos.currency_btc_pair().to_string(), "gbg/btc");
    }
}
