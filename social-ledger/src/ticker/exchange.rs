use super::{CurrencyPair, PriceQuote, PriceSource};
use crate::{config::TickerConfig, error::LedgerError};
use async_trait::async_trait;
use derive_more::Display;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// Public ticker endpoint of [`ExchangeId::BtcE`], `%s` being the exchange symbol.
pub const TICKER_URL_BTC_E: &str = "https://btc-e.com/api/2/%s/ticker";

/// Public ticker endpoint of [`ExchangeId::Bitfinex`].
pub const TICKER_URL_BITFINEX: &str = "https://api.bitfinex.com/v1/pubticker/%s";

/// Public ticker endpoint of [`ExchangeId::Bitstamp`].
pub const TICKER_URL_BITSTAMP: &str = "https://www.bitstamp.net/api/v2/ticker/%s";

/// Public ticker endpoint of [`ExchangeId::Coinbase`].
pub const TICKER_URL_COINBASE: &str = "https://api.exchange.coinbase.com/products/%s/ticker";

/// Public ticker endpoint of [`ExchangeId::Okcoin`].
pub const TICKER_URL_OKCOIN: &str = "https://www.okcoin.com/api/v1/ticker.do?symbol=%s";

/// Exchanges a [`HttpTickerSource`] knows how to query.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
pub enum ExchangeId {
    #[display("btc-e")]
    #[serde(rename = "btc-e")]
    BtcE,
    #[display("bitfinex")]
    #[serde(rename = "bitfinex")]
    Bitfinex,
    #[display("bitstamp")]
    #[serde(rename = "bitstamp")]
    Bitstamp,
    #[display("coinbase")]
    #[serde(rename = "coinbase")]
    Coinbase,
    #[display("okcoin")]
    #[serde(rename = "okcoin")]
    Okcoin,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 5] = [
        ExchangeId::BtcE,
        ExchangeId::Bitfinex,
        ExchangeId::Bitstamp,
        ExchangeId::Coinbase,
        ExchangeId::Okcoin,
    ];

    /// Separator between base and quote in the exchange's market symbol.
    pub fn symbol_separator(&self) -> &'static str {
        match self {
            ExchangeId::BtcE | ExchangeId::Okcoin => "_",
            ExchangeId::Coinbase => "-",
            ExchangeId::Bitfinex | ExchangeId::Bitstamp => "",
        }
    }

    /// Exchange market symbol of `pair`, eg/ "btc_usd" for btc-e.
    pub fn symbol(&self, pair: &CurrencyPair) -> String {
        pair.symbol(self.symbol_separator())
    }

    pub fn ticker_url_template(&self) -> &'static str {
        match self {
            ExchangeId::BtcE => TICKER_URL_BTC_E,
            ExchangeId::Bitfinex => TICKER_URL_BITFINEX,
            ExchangeId::Bitstamp => TICKER_URL_BITSTAMP,
            ExchangeId::Coinbase => TICKER_URL_COINBASE,
            ExchangeId::Okcoin => TICKER_URL_OKCOIN,
        }
    }

    /// Location of the price and volume in the exchange's ticker response.
    pub fn fields(&self) -> TickerFields {
        match self {
            ExchangeId::BtcE => TickerFields::nested("avg", "vol_cur"),
            ExchangeId::Bitfinex => TickerFields::top_level("last_price", "volume"),
            ExchangeId::Bitstamp => TickerFields::top_level("last", "volume"),
            ExchangeId::Coinbase => TickerFields::top_level("price", "volume"),
            ExchangeId::Okcoin => TickerFields::nested("last", "vol"),
        }
    }
}

impl FromStr for ExchangeId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExchangeId::ALL
            .into_iter()
            .find(|exchange| exchange.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LedgerError::UnsupportedExchange(s.to_string()))
    }
}

/// Where a ticker response keeps its price and volume.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TickerFields {
    /// Object the fields are nested under, if any.
    pub container: Option<&'static str>,
    pub price: &'static str,
    pub volume: &'static str,
}

impl TickerFields {
    const fn top_level(price: &'static str, volume: &'static str) -> Self {
        Self {
            container: None,
            price,
            volume,
        }
    }

    const fn nested(price: &'static str, volume: &'static str) -> Self {
        Self {
            container: Some("ticker"),
            price,
            volume,
        }
    }

    /// Extract a [`PriceQuote`] from a ticker response. Exchanges send numbers both as JSON
    /// numbers and as strings.
    pub fn parse(&self, exchange: ExchangeId, response: &Value) -> Result<PriceQuote, LedgerError> {
        let ticker = match self.container {
            Some(container) => response.get(container).ok_or_else(|| LedgerError::Source {
                exchange,
                message: format!("response has no {container:?} object"),
            })?,
            None => response,
        };

        let field = |name: &str| -> Result<f64, LedgerError> {
            let value = ticker.get(name).ok_or_else(|| LedgerError::Source {
                exchange,
                message: format!("response has no {name:?} field"),
            })?;

            let number = match value {
                Value::Number(number) => number.as_f64(),
                Value::String(string) => string.trim().parse().ok(),
                _ => None,
            };

            number.ok_or_else(|| LedgerError::Source {
                exchange,
                message: format!("field {name:?} is not numeric: {value}"),
            })
        };

        Ok(PriceQuote::new(exchange, field(self.price)?, field(self.volume)?))
    }
}

/// [`PriceSource`] polling an exchange's public REST ticker.
#[derive(Debug, Clone)]
pub struct HttpTickerSource {
    exchange: ExchangeId,
    url_template: String,
    http: Client,
}

impl HttpTickerSource {
    pub fn new(exchange: ExchangeId, http: Client) -> Self {
        Self {
            exchange,
            url_template: exchange.ticker_url_template().to_string(),
            http,
        }
    }

    /// Query a different endpoint, eg/ a mirror. `%s` is replaced by the exchange symbol.
    pub fn with_url_template(mut self, url_template: impl Into<String>) -> Self {
        self.url_template = url_template.into();
        self
    }

    /// One source per supported exchange, sharing a client built from `config`.
    pub fn all(config: &TickerConfig) -> Result<Vec<Self>, LedgerError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(ExchangeId::ALL
            .into_iter()
            .map(|exchange| Self::new(exchange, http.clone()))
            .collect())
    }

    pub fn url(&self, pair: &CurrencyPair) -> String {
        self.url_template.replace("%s", &self.exchange.symbol(pair))
    }
}

#[async_trait]
impl PriceSource for HttpTickerSource {
    fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    async fn quote(&self, pair: &CurrencyPair) -> Result<PriceQuote, LedgerError> {
        let url = self.url(pair);
        let source_error = |message: String| LedgerError::Source {
            exchange: self.exchange,
            message,
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|error| source_error(format!("request failed: {error}")))?
            .error_for_status()
            .map_err(|error| source_error(format!("HTTP error: {error}")))?
            .json::<Value>()
            .await
            .map_err(|error| source_error(format!("JSON parse failed: {error}")))?;

        let quote = self.exchange.fields().parse(self.exchange, &response)?;
        debug!(
            exchange = %self.exchange,
            %pair,
            price = quote.price,
            volume = quote.volume,
            "fetched ticker"
        );

        Ok(quote)
    }
}
