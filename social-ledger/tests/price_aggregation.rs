use async_trait::async_trait;
use serde_json::json;
use social_ledger::{
    Asset, CurrencyPair, ExchangeId, InMemoryLedger, LedgerError, Markets, PriceQuote,
    PriceSource, Ticker,
    chain::Chain,
    client::model::{FeedHistory, Price},
    spread,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Scripted [`PriceSource`] behaviour.
#[derive(Debug, Clone)]
enum Behaviour {
    Quote { price: f64, volume: f64 },
    Fail,
    Hang,
}

#[derive(Debug)]
struct StubSource {
    exchange: ExchangeId,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl StubSource {
    fn new(exchange: ExchangeId, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            exchange,
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    fn quoting(exchange: ExchangeId, price: f64, volume: f64) -> Arc<Self> {
        Self::new(exchange, Behaviour::Quote { price, volume })
    }
}

#[async_trait]
impl PriceSource for StubSource {
    fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    async fn quote(&self, _: &CurrencyPair) -> Result<PriceQuote, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Quote { price, volume } => Ok(PriceQuote::new(self.exchange, price, volume)),
            Behaviour::Fail => Err(LedgerError::Source {
                exchange: self.exchange,
                message: "503 Service Unavailable".to_string(),
            }),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LedgerError::Source {
                    exchange: self.exchange,
                    message: "unreachable".to_string(),
                })
            }
        }
    }
}

fn stub_ticker(sources: Vec<Arc<StubSource>>) -> Ticker {
    Ticker::new(
        sources
            .into_iter()
            .map(|source| source as Arc<dyn PriceSource>)
            .collect(),
    )
}

fn btc_usd() -> CurrencyPair {
    "btc/usd".parse().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_composite_price_tolerates_partial_failure() {
    let ticker = stub_ticker(vec![
        StubSource::new(ExchangeId::BtcE, Behaviour::Fail),
        StubSource::quoting(ExchangeId::Bitfinex, 600.0, 10.0),
        StubSource::new(ExchangeId::Bitstamp, Behaviour::Hang),
        StubSource::quoting(ExchangeId::Coinbase, 612.0, 30.0),
        StubSource::quoting(ExchangeId::Okcoin, -1.0, 5.0),
    ]);

    // (600 * 10 + 612 * 30) / 40
    let price = ticker.composite_price(&btc_usd()).await.unwrap();
    assert_eq!(price, 609.0);
}

#[tokio::test(start_paused = true)]
async fn test_composite_price_total_failure() {
    let ticker = stub_ticker(vec![
        StubSource::new(ExchangeId::BtcE, Behaviour::Fail),
        StubSource::new(ExchangeId::Bitstamp, Behaviour::Hang),
        StubSource::quoting(ExchangeId::Okcoin, f64::NAN, 5.0),
    ]);

    assert_eq!(
        ticker.composite_price(&btc_usd()).await,
        Err(LedgerError::NoPrice(btc_usd()))
    );
    assert_eq!(
        stub_ticker(vec![]).composite_price(&btc_usd()).await,
        Err(LedgerError::NoPrice(btc_usd()))
    );
}

#[tokio::test]
async fn test_composite_price_zero_volume() {
    let ticker = stub_ticker(vec![
        StubSource::quoting(ExchangeId::Bitfinex, 600.0, 0.0),
        StubSource::quoting(ExchangeId::Coinbase, 612.0, 0.0),
    ]);

    assert_eq!(
        ticker.composite_price(&btc_usd()).await,
        Err(LedgerError::ZeroVolume)
    );
}

#[tokio::test(start_paused = true)]
async fn test_composite_price_timeout_is_per_source() {
    let ticker = stub_ticker(vec![
        StubSource::new(ExchangeId::Bitstamp, Behaviour::Hang),
        StubSource::quoting(ExchangeId::Coinbase, 612.0, 30.0),
    ])
    .with_timeout(Duration::from_millis(500));

    let started = tokio::time::Instant::now();
    assert_eq!(ticker.composite_price(&btc_usd()).await.unwrap(), 612.0);
    assert_eq!(started.elapsed(), Duration::from_millis(500));
}

#[test]
fn test_spread_positive_when_market_above_published() {
    // (1 - published / current) * 100, so the sign follows the market move
    // market above published price: positive
    assert!((spread(1.0, 1.1).unwrap() - 9.0909).abs() < 1e-9);
    // market below published price: negative
    assert!((spread(1.1, 1.0).unwrap() + 10.0).abs() < 1e-9);
    assert_eq!(
        spread(1.0, 0.0),
        Err(LedgerError::ZeroDivisor("current price"))
    );
}

fn feed_price(base: f64) -> Price {
    Price {
        base: Asset::new(base, "GBG"),
        quote: Asset::new(1.0, "GOLOS"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_markets_implied_prices_and_cache() {
    let source = StubSource::quoting(ExchangeId::Bitfinex, 0.5, 1.0);
    let ledger = Arc::new(InMemoryLedger::new(Chain::Golos));
    ledger.set_feed_history(FeedHistory {
        current_median_history: feed_price(1.0),
        price_history: [1.0, 2.0, 3.0].into_iter().map(feed_price).collect(),
    });

    let markets = Markets::with_cache_ttl(
        stub_ticker(vec![Arc::clone(&source)]),
        Arc::clone(&ledger),
        Duration::from_secs(60),
    );

    // every pair quotes 0.5 on the stub exchange
    assert_eq!(markets.token_currency_implied().await.unwrap(), 1.0);
    assert_eq!(markets.token_usd_implied().await.unwrap(), 0.25);
    assert_eq!(markets.currency_usd_implied().await.unwrap(), 0.25);
    // golos/btc, gbg/btc and btc/usd fetched once each
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    tokio::time::advance(Duration::from_secs(30)).await;
    markets.token_btc().await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    tokio::time::advance(Duration::from_secs(30)).await;
    markets.token_btc().await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 4);

    assert_eq!(markets.avg_witness_price(2).await.unwrap(), 2.5);
}

#[tokio::test]
async fn test_ticker_quote_payload_shapes() {
    // responses of every supported exchange, as served by their public tickers
    let responses = [
        (ExchangeId::BtcE, json!({"ticker": {"avg": 600.0, "vol_cur": 1.0}})),
        (ExchangeId::Bitfinex, json!({"last_price": "600.0", "volume": "1.0"})),
        (ExchangeId::Bitstamp, json!({"last": "600.0", "volume": "1.0"})),
        (ExchangeId::Coinbase, json!({"price": "600.0", "volume": "1.0"})),
        (ExchangeId::Okcoin, json!({"ticker": {"last": "600.0", "vol": "1.0"}})),
    ];

    for (exchange, response) in responses {
        let quote = exchange.fields().parse(exchange, &response).unwrap();
        assert_eq!(quote, PriceQuote::new(exchange, 600.0, 1.0), "{exchange}");
    }
}
