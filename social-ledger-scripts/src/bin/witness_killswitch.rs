//! Dry-run missed block monitor for a witness.
//!
//! Reads the witness's missed block counter at start and polls it. Once more blocks than
//! the allowance have been missed it reports that the witness would be disabled and exits.
//! Nothing is ever signed or broadcast.
//!
//! | Variable                      | Default |
//! |-------------------------------|---------|
//! | `KILLSWITCH_INTERVAL_SECS`    | 60      |
//! | `KILLSWITCH_MISSED_ALLOWANCE` | 10      |

use social_ledger::{HttpLedgerClient, LedgerClient, LedgerConfig, LedgerError, config::env_parse};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

const DEFAULT_WITNESS: &str = "kiwi";

#[derive(Debug, Clone, Copy, PartialEq)]
struct KillswitchSettings {
    interval: Duration,
    missed_allowance: u64,
}

impl Default for KillswitchSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            missed_allowance: 10,
        }
    }
}

impl KillswitchSettings {
    fn from_env() -> Result<Self, LedgerError> {
        let defaults = Self::default();
        Ok(Self {
            interval: env_parse("KILLSWITCH_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            missed_allowance: env_parse("KILLSWITCH_MISSED_ALLOWANCE")?
                .unwrap_or(defaults.missed_allowance),
        })
    }

    fn tripped(&self, missed_since_start: u64) -> bool {
        missed_since_start > self.missed_allowance
    }
}

#[tokio::main]
async fn main() {
    init_logging();

    let witness = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_WITNESS.to_string());

    if let Err(error) = run(&witness).await {
        error!(%witness, %error, "witness killswitch failed");
        std::process::exit(1);
    }
}

async fn run(witness: &str) -> Result<(), LedgerError> {
    let settings = KillswitchSettings::from_env()?;
    let config = LedgerConfig::from_env()?;
    let chain = config.chain;
    let client = Arc::new(HttpLedgerClient::new(config)?);

    let baseline = client.get_witness_by_account(witness).await?.total_missed;
    info!(%chain, witness, baseline, ?settings, "starting dry-run witness killswitch");

    let mut interval = tokio::time::interval(settings.interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down witness killswitch");
                return Ok(());
            }
        }

        let missed = match client.get_witness_by_account(witness).await {
            Ok(current) => current.missed_since(baseline),
            Err(error) => {
                warn!(%error, "missed block check failed, retrying next round");
                continue;
            }
        };

        if settings.tripped(missed) {
            warn!(
                witness,
                missed,
                allowance = settings.missed_allowance,
                "witness would be disabled (dry run, not broadcast)"
            );
            return Ok(());
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
