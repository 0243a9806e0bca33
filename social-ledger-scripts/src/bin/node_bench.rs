//! Times repeated property lookups against the nodes of every supported chain.
//!
//! `NODE_BENCH_REPEATS` overrides the number of rounds per chain (default 10).

use itertools::{Itertools, MinMaxResult};
use social_ledger::{
    Account, HttpLedgerClient, LedgerClient, LedgerConfig, LedgerError, chain::Chain,
    config::env_parse,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

const DEFAULT_ACCOUNT: &str = "cryptomental";
const DEFAULT_REPEATS: usize = 10;

#[tokio::main]
async fn main() {
    init_logging();

    let account_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());

    let repeats = match env_parse("NODE_BENCH_REPEATS") {
        Ok(repeats) => repeats.unwrap_or(DEFAULT_REPEATS),
        Err(error) => {
            error!(%error, "invalid benchmark configuration");
            std::process::exit(1);
        }
    };

    for chain in [Chain::Steem, Chain::Golos] {
        if let Err(error) = bench(chain, &account_name, repeats).await {
            warn!(%chain, %error, "benchmark aborted");
        }
    }
}

async fn bench(chain: Chain, account_name: &str, repeats: usize) -> Result<(), LedgerError> {
    let config = LedgerConfig::for_chain(chain);
    info!(%chain, nodes = %config.nodes.iter().join(", "), repeats, "benchmarking");

    let mut reconnect = Vec::with_capacity(repeats);
    let mut account_access = Vec::with_capacity(repeats);

    for _ in 0..repeats {
        // fresh client every round so connection setup is part of the timing
        let started = Instant::now();
        let client = Arc::new(HttpLedgerClient::new(config.clone())?);
        client.get_dynamic_global_properties().await?;
        reconnect.push(started.elapsed());

        let started = Instant::now();
        Account::new(account_name, Arc::clone(&client)).props().await?;
        account_access.push(started.elapsed());
    }

    report(chain, "reconnect", &reconnect);
    report(chain, "account-access", &account_access);
    Ok(())
}

fn report(chain: Chain, label: &str, samples: &[Duration]) {
    let (min, max) = match samples.iter().minmax() {
        MinMaxResult::NoElements => return,
        MinMaxResult::OneElement(sample) => (sample, sample),
        MinMaxResult::MinMax(min, max) => (min, max),
    };
    let mean = samples.iter().sum::<Duration>() / samples.len() as u32;

    info!(%chain, label, ?mean, ?min, ?max, "timings");
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
