use futures::TryStreamExt;
use itertools::Itertools;
use social_ledger::{
    Account, HttpLedgerClient, LedgerConfig, LedgerError, asset::parse_amount,
};
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_ACCOUNT: &str = "cryptomental";

/// Most recent operations scanned for burned transfers.
const TRANSFER_LOOKBACK: u64 = 10_000;

#[tokio::main]
async fn main() {
    init_logging();

    let account_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());

    if let Err(error) = report(&account_name).await {
        error!(account = %account_name, %error, "account report failed");
        std::process::exit(1);
    }
}

async fn report(account_name: &str) -> Result<(), LedgerError> {
    let config = LedgerConfig::from_env()?;
    info!(chain = %config.chain, nodes = %config.nodes.iter().join(", "), "connecting");

    let client = Arc::new(HttpLedgerClient::new(config)?);
    let account = Account::new(account_name, client);

    info!(
        account = account_name,
        power = account.power().await?,
        reputation = account.reputation().await?,
        voting_power = account.voting_power().await?,
        "account summary"
    );

    let balances = account.balances().await?;
    info!(
        balances = %balances.iter().map(|(symbol, amount)| format!("{amount} {symbol}")).join(", "),
        "balances"
    );

    let titles = account
        .blog()
        .await?
        .iter()
        .filter(|post| !post.is_comment())
        .take(3)
        .map(|post| post.content().title.as_str())
        .join(" | ");
    info!(%titles, "recent posts");

    for request in account.conversion_requests().await? {
        info!(
            amount = %request.amount,
            conversion_date = %request.conversion_date,
            "pending conversion request"
        );
    }

    for route in account.withdraw_routes().await? {
        info!(
            from = %route.from_account,
            to = %route.to_account,
            percent = route.percent,
            auto_vest = route.auto_vest,
            "withdraw route"
        );
    }

    // Transfers to "null" burn the amount, the memo usually says why
    let mut transfers = account.recent("transfer", TRANSFER_LOOKBACK).await?;
    while let Some(transfer) = transfers.try_next().await? {
        let field = |name: &str| transfer.op.get(name).and_then(|value| value.as_str());
        if field("to") != Some("null") {
            continue;
        }

        let amount = field("amount").map(parse_amount).transpose()?.unwrap_or_default();
        info!(
            amount,
            memo = field("memo").unwrap_or_default(),
            timestamp = %transfer.timestamp,
            "burned transfer"
        );
    }

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
