//! Implied token and currency prices built on the [`Ticker`].

use crate::{
    cache::TtlMap,
    client::LedgerClient,
    config::{DEFAULT_PRICE_CACHE_TTL, TickerConfig},
    error::LedgerError,
    ticker::{CurrencyPair, Ticker},
};
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Witness feed entries averaged by [`Markets::avg_witness_price`] by default.
pub const DEFAULT_WITNESS_PRICE_WINDOW: usize = 10;

/// Market prices of a ledger's token and pegged currency.
///
/// Composite prices are cached per pair, every pair expiring independently.
#[derive(Debug)]
pub struct Markets<Client: ?Sized> {
    ticker: Ticker,
    client: Arc<Client>,
    prices: TtlMap<CurrencyPair, f64>,
}

impl<Client> Markets<Client>
where
    Client: LedgerClient + ?Sized,
{
    pub fn new(ticker: Ticker, client: Arc<Client>) -> Self {
        Self::with_cache_ttl(ticker, client, DEFAULT_PRICE_CACHE_TTL)
    }

    pub fn with_cache_ttl(ticker: Ticker, client: Arc<Client>, ttl: Duration) -> Self {
        Self {
            ticker,
            client,
            prices: TtlMap::new(ttl),
        }
    }

    /// [`Markets`] over every supported exchange, configured by `config`.
    pub fn from_config(config: &TickerConfig, client: Arc<Client>) -> Result<Self, LedgerError> {
        Ok(Self::with_cache_ttl(
            Ticker::with_default_sources(config)?,
            client,
            config.cache_ttl,
        ))
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Composite price of `pair`, served from cache while fresh.
    pub async fn price(&self, pair: &CurrencyPair) -> Result<f64, LedgerError> {
        if let Some(price) = self.prices.get(pair) {
            debug!(%pair, price, "composite price cache hit");
            return Ok(price);
        }

        let price = self.ticker.composite_price(pair).await?;
        self.prices.insert(pair.clone(), price);
        Ok(price)
    }

    pub async fn btc_usd(&self) -> Result<f64, LedgerError> {
        self.price(&CurrencyPair::new("btc", "usd")).await
    }

    pub async fn token_btc(&self) -> Result<f64, LedgerError> {
        self.price(&self.client.chain().token_btc_pair()).await
    }

    pub async fn currency_btc(&self) -> Result<f64, LedgerError> {
        self.price(&self.client.chain().currency_btc_pair()).await
    }

    /// Token price in pegged currency implied by both BTC markets.
    pub async fn token_currency_implied(&self) -> Result<f64, LedgerError> {
        let (token_btc, currency_btc) = futures::try_join!(self.token_btc(), self.currency_btc())?;
        if currency_btc == 0.0 {
            return Err(LedgerError::ZeroDivisor("currency/btc price"));
        }
        Ok(token_btc / currency_btc)
    }

    pub async fn token_usd_implied(&self) -> Result<f64, LedgerError> {
        let (token_btc, btc_usd) = futures::try_join!(self.token_btc(), self.btc_usd())?;
        Ok(token_btc * btc_usd)
    }

    pub async fn currency_usd_implied(&self) -> Result<f64, LedgerError> {
        let (currency_btc, btc_usd) = futures::try_join!(self.currency_btc(), self.btc_usd())?;
        Ok(currency_btc * btc_usd)
    }

    /// Mean base amount of the last `take` witness feed prices.
    pub async fn avg_witness_price(&self, take: usize) -> Result<f64, LedgerError> {
        let feed_history = self.client.get_feed_history().await?;
        let history = &feed_history.price_history;

        let recent = &history[history.len().saturating_sub(take)..];
        if recent.is_empty() {
            return Err(LedgerError::FeedHistoryEmpty);
        }

        Ok(recent.iter().map(|price| price.base.amount).sum::<f64>() / recent.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset::Asset,
        chain::Chain,
        client::{
            memory::InMemoryLedger,
            model::{FeedHistory, Price},
        },
    };

    fn feed_price(base: f64) -> Price {
        Price {
            base: Asset::new(base, "GBG"),
            quote: Asset::new(1.0, "GOLOS"),
        }
    }

    #[tokio::test]
    async fn test_avg_witness_price() {
        let ledger = Arc::new(InMemoryLedger::new(Chain::Golos));
        let markets = Markets::new(Ticker::new(vec![]), Arc::clone(&ledger));

        ledger.set_feed_history(FeedHistory {
            current_median_history: feed_price(1.0),
            price_history: vec![],
        });
        assert_eq!(
            markets.avg_witness_price(DEFAULT_WITNESS_PRICE_WINDOW).await,
            Err(LedgerError::FeedHistoryEmpty)
        );

        ledger.set_feed_history(FeedHistory {
            current_median_history: feed_price(1.0),
            price_history: [9.0, 1.0, 2.0, 3.0].into_iter().map(feed_price).collect(),
        });
        assert_eq!(markets.avg_witness_price(3).await.unwrap(), 2.0);
        assert_eq!(markets.avg_witness_price(10).await.unwrap(), 3.75);
    }

    #[tokio::test]
    async fn test_price_without_sources() {
        let ledger = Arc::new(InMemoryLedger::new(Chain::Steem));
        let markets = Markets::new(Ticker::new(vec![]), ledger);

        assert_eq!(
            markets.token_btc().await,
            Err(LedgerError::NoPrice(CurrencyPair::new("steem", "btc")))
        );
    }
}
