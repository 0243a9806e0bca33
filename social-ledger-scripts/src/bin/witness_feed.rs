//! Dry-run witness price feed monitor.
//!
//! Compares the price a witness last published with the price implied by the exchanges and
//! reports when the feed has drifted past the minimum spread. Nothing is ever signed or
//! broadcast.
//!
//! Environment overrides (on top of the `LEDGER_*` / `TICKER_*` client configuration):
//!
//! | Variable                   | Default |
//! |----------------------------|---------|
//! | `FEED_INTERVAL_SECS`       | 60      |
//! | `FEED_MINIMUM_SPREAD_PCT`  | 1.0     |
//! | `FEED_CURRENCY_USD_PEG`    | true    |

use social_ledger::{
    HttpLedgerClient, LedgerClient, LedgerConfig, LedgerError, Markets, TickerConfig,
    config::env_parse, spread,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

const DEFAULT_WITNESS: &str = "kiwi";

#[derive(Debug, Clone, Copy)]
struct FeedSettings {
    interval: Duration,
    minimum_spread_pct: f64,
    /// Quote the feed against the market value of the pegged currency instead of 1.000.
    currency_usd_peg: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            minimum_spread_pct: 1.0,
            currency_usd_peg: true,
        }
    }
}

impl FeedSettings {
    fn from_env() -> Result<Self, LedgerError> {
        let defaults = Self::default();
        Ok(Self {
            interval: env_parse("FEED_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            minimum_spread_pct: env_parse("FEED_MINIMUM_SPREAD_PCT")?
                .unwrap_or(defaults.minimum_spread_pct),
            currency_usd_peg: env_parse("FEED_CURRENCY_USD_PEG")?
                .unwrap_or(defaults.currency_usd_peg),
        })
    }
}

/// Outcome of one feed check.
#[derive(Debug, Clone, Copy)]
struct FeedCheck {
    published: f64,
    implied: f64,
    quote: f64,
    spread_pct: f64,
}

async fn check_feed<Client>(
    client: &Client,
    markets: &Markets<Client>,
    witness: &str,
    settings: &FeedSettings,
) -> Result<FeedCheck, LedgerError>
where
    Client: LedgerClient + ?Sized,
{
    let published = client.get_witness_by_account(witness).await?.published_price();
    let implied = markets.token_usd_implied().await?;

    let quote = if settings.currency_usd_peg {
        let currency_usd = markets.currency_usd_implied().await?;
        if currency_usd == 0.0 {
            return Err(LedgerError::ZeroDivisor("currency/usd price"));
        }
        // rounded the way the feed would be published
        ((1.0 / currency_usd) * 1000.0).round() / 1000.0
    } else {
        1.0
    };
    if quote == 0.0 {
        return Err(LedgerError::ZeroDivisor("feed quote"));
    }

    Ok(FeedCheck {
        published,
        implied,
        quote,
        spread_pct: spread(published, implied / quote)?.abs(),
    })
}

#[tokio::main]
async fn main() {
    init_logging();

    let witness = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_WITNESS.to_string());

    if let Err(error) = run(&witness).await {
        error!(%witness, %error, "witness feed monitor failed");
        std::process::exit(1);
    }
}

async fn run(witness: &str) -> Result<(), LedgerError> {
    let settings = FeedSettings::from_env()?;
    let ledger_config = LedgerConfig::from_env()?;
    let ticker_config = TickerConfig::from_env()?;

    let chain = ledger_config.chain;
    let client = Arc::new(HttpLedgerClient::new(ledger_config)?);
    let markets = Markets::from_config(&ticker_config, Arc::clone(&client))?;

    info!(%chain, witness, ?settings, "starting dry-run witness feed monitor");

    let mut interval = tokio::time::interval(settings.interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down witness feed monitor");
                return Ok(());
            }
        }

        match check_feed(client.as_ref(), &markets, witness, &settings).await {
            Ok(check) => {
                info!(
                    published = %format!("{:.3}", check.published),
                    implied = %format!("{:.3}", check.implied),
                    quote = %format!("{:.3}", check.quote),
                    spread_pct = %format!("{:.3}", check.spread_pct),
                    "{} feed check",
                    chain.token_symbol()
                );

                if check.spread_pct > settings.minimum_spread_pct {
                    warn!(
                        spread_pct = check.spread_pct,
                        minimum_spread_pct = settings.minimum_spread_pct,
                        "published price diverged, feed update due (dry run, not broadcast)"
                    );
                }
            }
            Err(error) => warn!(%error, "feed check failed, retrying next round"),
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
