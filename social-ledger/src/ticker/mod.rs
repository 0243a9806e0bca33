//! Multi-source market price aggregation.
//!
//! A [`Ticker`] fans a [`CurrencyPair`] out to every configured [`PriceSource`] concurrently,
//! each request bounded by its own timeout, and combines whatever quotes come back into one
//! volume weighted average price. Individual source failures are logged and tolerated.

use crate::{config::DEFAULT_TICKER_TIMEOUT, error::LedgerError};
use async_trait::async_trait;
use derive_more::{Constructor, Display};
use futures::future::join_all;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Exchange identifiers, symbol mapping and the REST [`PriceSource`] implementation.
pub mod exchange;

pub use exchange::{ExchangeId, HttpTickerSource};

/// Market pair, eg/ `btc/usd`. Both sides are lowercase.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
#[display("{base}/{quote}")]
pub struct CurrencyPair {
    pub base: SmolStr,
    pub quote: SmolStr,
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: SmolStr::new(base.to_lowercase()),
            quote: SmolStr::new(quote.to_lowercase()),
        }
    }

    /// Pair written with `separator` between base and quote, eg/ "btc_usd".
    pub fn symbol(&self, separator: &str) -> String {
        format!("{}{separator}{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidPair(s.to_string());

        let (base, quote) = s.trim().split_once('/').ok_or_else(invalid)?;
        let valid_side = |side: &str| !side.is_empty() && side.chars().all(char::is_alphanumeric);
        if !valid_side(base) || !valid_side(quote) {
            return Err(invalid());
        }

        Ok(Self::new(base, quote))
    }
}

/// Last price and traded volume of a pair on one exchange.
#[derive(Copy, Clone, PartialEq, Debug, Constructor, Deserialize, Serialize)]
pub struct PriceQuote {
    pub exchange: ExchangeId,
    pub price: f64,
    pub volume: f64,
}

impl PriceQuote {
    /// Price and volume are both finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.price, self.volume]
            .into_iter()
            .all(|value| value.is_finite() && value >= 0.0)
    }
}

/// Market data source quoting currency pairs.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn exchange(&self) -> ExchangeId;

    async fn quote(&self, pair: &CurrencyPair) -> Result<PriceQuote, LedgerError>;
}

/// Aggregates quotes of several [`PriceSource`]s into a composite price.
#[derive(Clone)]
pub struct Ticker {
    sources: Vec<Arc<dyn PriceSource>>,
    timeout: Duration,
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field(
                "sources",
                &self.sources.iter().map(|source| source.exchange()).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Ticker {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self {
            sources,
            timeout: DEFAULT_TICKER_TIMEOUT,
        }
    }

    /// Per source timeout applied to every quote request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// [`HttpTickerSource`] for every supported exchange.
    pub fn with_default_sources(config: &crate::config::TickerConfig) -> Result<Self, LedgerError> {
        let sources = HttpTickerSource::all(config)?
            .into_iter()
            .map(|source| Arc::new(source) as Arc<dyn PriceSource>)
            .collect();

        Ok(Self::new(sources).with_timeout(config.request_timeout))
    }

    pub fn sources(&self) -> impl Iterator<Item = ExchangeId> + '_ {
        self.sources.iter().map(|source| source.exchange())
    }

    /// Quotes of every source that answered in time with a valid quote.
    pub async fn quotes(&self, pair: &CurrencyPair) -> Vec<PriceQuote> {
        let requests = self.sources.iter().map(|source| async move {
            let exchange = source.exchange();
            match tokio::time::timeout(self.timeout, source.quote(pair)).await {
                Ok(Ok(quote)) if quote.is_valid() => Some(quote),
                Ok(Ok(quote)) => {
                    warn!(%exchange, %pair, ?quote, "discarding invalid price quote");
                    None
                }
                Ok(Err(error)) => {
                    warn!(%exchange, %pair, %error, "price source failed");
                    None
                }
                Err(_) => {
                    warn!(%exchange, %pair, timeout = ?self.timeout, "price source timed out");
                    None
                }
            }
        });

        join_all(requests).await.into_iter().flatten().collect()
    }

    /// Volume weighted average price of `pair` across all sources.
    ///
    /// Fails with [`LedgerError::NoPrice`] when no source produced a quote and with
    /// [`LedgerError::ZeroVolume`] when the surviving quotes carry no volume.
    pub async fn composite_price(&self, pair: &CurrencyPair) -> Result<f64, LedgerError> {
        let quotes = self.quotes(pair).await;
        if quotes.is_empty() {
            return Err(LedgerError::NoPrice(pair.clone()));
        }

        let price = calculate_vwap(&quotes).ok_or(LedgerError::ZeroVolume)?;
        debug!(%pair, price, sources = quotes.len(), "computed composite price");

        Ok(price)
    }
}

/// Σ(price × volume) / Σ(volume), `None` for no quotes or zero total volume.
pub fn calculate_vwap(quotes: &[PriceQuote]) -> Option<f64> {
    if quotes.is_empty() {
        return None;
    }

    let mut sum_pv = 0.0;
    let mut sum_v = 0.0;

    for quote in quotes {
        sum_pv += quote.price * quote.volume;
        sum_v += quote.volume;
    }

    if sum_v > 0.0 {
        Some(sum_pv / sum_v)
    } else {
        None
    }
}

/// Percentage spread of a `published` price against the `current` market price:
/// `(1 - published / current) * 100`.
pub fn spread_decimal(published: Decimal, current: Decimal) -> Result<Decimal, LedgerError> {
    if current.is_zero() {
        return Err(LedgerError::ZeroDivisor("current price"));
    }

    let ratio = published
        .checked_div(current)
        .ok_or(LedgerError::NonFinite("spread"))?;

    Ok((Decimal::ONE - ratio) * Decimal::ONE_HUNDRED)
}

/// [`spread_decimal`] of two float prices, rounded to 4 decimal places.
pub fn spread(published: f64, current: f64) -> Result<f64, LedgerError> {
    let to_decimal = |value: f64, name: &'static str| {
        Decimal::from_f64(value).ok_or(LedgerError::NonFinite(name))
    };

    spread_decimal(
        to_decimal(published, "published price")?,
        to_decimal(current, "current price")?,
    )?
    .round_dp(4)
    .to_f64()
    .ok_or(LedgerError::NonFinite("spread"))
}
