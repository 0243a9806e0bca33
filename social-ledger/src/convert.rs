//! Token, power, reward share and pegged currency conversions.
//!
//! Formulas mirror the ledger's own accounting: vesting share exchange rate, the vote weight
//! curve and the content constant reward curve. Every conversion needing ledger state runs
//! against one [`ConversionRates`] snapshot, fetched in a single round and cached for the
//! client's [`rates_ttl`](crate::client::LedgerClient::rates_ttl).

use crate::{
    cache::TtlCell,
    client::{
        LedgerClient,
        model::{DynamicGlobalProperties, FeedHistory},
    },
    error::LedgerError,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Content reward smoothing constant of the ledger's reward curve.
pub const CONTENT_CONSTANT: f64 = 2_000_000_000_000.0;

/// Full vote weight / full voting power, in basis points.
pub const FULL_PERCENT: u32 = 10_000;

const MEGA: f64 = 1e6;

/// Consistent snapshot of the ledger figures the conversions depend on.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ConversionRates {
    /// Tokens backing one million vesting shares.
    pub token_per_mvests: f64,
    /// Witness median price of the pegged currency, in currency per token.
    pub currency_median_price: f64,
    /// Tokens in the content reward fund, when the ledger still reports it globally.
    pub total_reward_fund: Option<f64>,
    /// Sum of squared reward shares of the reward fund.
    pub total_reward_shares2: Option<f64>,
}

impl ConversionRates {
    pub fn from_ledger(
        properties: &DynamicGlobalProperties,
        feed_history: &FeedHistory,
    ) -> Result<Self, LedgerError> {
        let total_vesting_shares = properties.total_vesting_shares.amount;
        if total_vesting_shares == 0.0 {
            return Err(LedgerError::ZeroDivisor("total_vesting_shares"));
        }

        Ok(Self {
            token_per_mvests: properties.total_vesting_fund_steem.amount
                / (total_vesting_shares / MEGA),
            currency_median_price: feed_history.current_median_history.base.amount,
            total_reward_fund: properties
                .total_reward_fund_steem
                .as_ref()
                .map(|fund| fund.amount),
            total_reward_shares2: properties.total_reward_shares2,
        })
    }

    pub fn vests_to_power(&self, vests: f64) -> f64 {
        vests * self.token_per_mvests / MEGA
    }

    pub fn power_to_vests(&self, power: f64) -> Result<f64, LedgerError> {
        if self.token_per_mvests == 0.0 {
            return Err(LedgerError::ZeroDivisor("token_per_mvests"));
        }
        Ok(power * MEGA / self.token_per_mvests)
    }

    /// Reward shares of a vote cast with `power`, the current `voting_power` and `vote_pct`
    /// (both in basis points).
    ///
    /// Vesting shares are truncated to the ledger's integer precision before the vote curve
    /// is applied.
    pub fn power_to_rshares(
        &self,
        power: f64,
        voting_power: u32,
        vote_pct: u32,
    ) -> Result<f64, LedgerError> {
        let vesting_shares = (self.power_to_vests(power)? * MEGA).trunc();

        let vote_weight = (voting_power as f64 * vote_pct as f64) / FULL_PERCENT as f64;
        let vote_factor = vote_weight / 200.0 + 1.0;
        Ok(vote_factor * vesting_shares / FULL_PERCENT as f64)
    }

    pub fn token_to_currency(&self, amount: f64) -> f64 {
        amount * self.currency_median_price
    }

    pub fn currency_to_token(&self, amount: f64) -> Result<f64, LedgerError> {
        if self.currency_median_price == 0.0 {
            return Err(LedgerError::ZeroDivisor("currency_median_price"));
        }
        Ok(amount / self.currency_median_price)
    }

    /// Reward shares a post needs to be paid `currency_payout`, inverting the content
    /// constant curve `rshares2 = (rshares + C)^2 - C^2`.
    pub fn currency_to_rshares(&self, currency_payout: f64) -> Result<f64, LedgerError> {
        let tokens_payout = self.currency_to_token(currency_payout)?;

        let total_reward_fund = self
            .total_reward_fund
            .ok_or_else(|| LedgerError::Malformed("total_reward_fund_steem missing".to_string()))?;
        let total_reward_shares2 = self
            .total_reward_shares2
            .ok_or_else(|| LedgerError::Malformed("total_reward_shares2 missing".to_string()))?;
        if total_reward_fund == 0.0 {
            return Err(LedgerError::ZeroDivisor("total_reward_fund"));
        }

        let post_rshares2 = tokens_payout / total_reward_fund * total_reward_shares2;
        let rshares = (CONTENT_CONSTANT.powi(2) + post_rshares2).sqrt() - CONTENT_CONSTANT;

        if rshares.is_nan() {
            return Err(LedgerError::NonFinite("currency_to_rshares"));
        }
        if rshares < 0.0 {
            return Err(LedgerError::NegativeRshares(rshares));
        }
        Ok(rshares)
    }
}

/// Vote weight of `rshares` on the ledger's weight curve: `(2^64 - 1) * r / (2C + r)`.
pub fn rshares_to_weight(rshares: f64) -> Result<f64, LedgerError> {
    let denominator = 2.0 * CONTENT_CONSTANT + rshares;
    if denominator <= 0.0 {
        return Err(LedgerError::ZeroDivisor("2 * CONTENT_CONSTANT + rshares"));
    }
    Ok(u64::MAX as f64 * rshares / denominator)
}

/// Conversions against a ledger connection, with a lazily refreshed rate snapshot.
#[derive(Debug)]
pub struct Converter<Client: ?Sized> {
    client: Arc<Client>,
    rates: TtlCell<ConversionRates>,
}

impl<Client> Converter<Client>
where
    Client: LedgerClient + ?Sized,
{
    /// Converter caching rates for the client's [`LedgerClient::rates_ttl`].
    pub fn new(client: Arc<Client>) -> Self {
        let ttl = client.rates_ttl();
        Self::with_ttl(client, ttl)
    }

    pub fn with_ttl(client: Arc<Client>, ttl: Duration) -> Self {
        Self {
            client,
            rates: TtlCell::new(ttl),
        }
    }

    /// Current rate snapshot, refreshed from the ledger once the cached one has expired.
    ///
    /// A failed refresh is returned as is, an expired snapshot is never reused.
    pub async fn rates(&self) -> Result<ConversionRates, LedgerError> {
        if let Some(rates) = self.rates.get() {
            return Ok(rates);
        }

        let (properties, feed_history) = futures::try_join!(
            self.client.get_dynamic_global_properties(),
            self.client.get_feed_history(),
        )?;

        let rates = ConversionRates::from_ledger(&properties, &feed_history)?;
        debug!(
            chain = %self.client.chain(),
            token_per_mvests = rates.token_per_mvests,
            currency_median_price = rates.currency_median_price,
            "refreshed conversion rates"
        );

        self.rates.set(rates.clone());
        Ok(rates)
    }

    pub async fn token_per_mvests(&self) -> Result<f64, LedgerError> {
        Ok(self.rates().await?.token_per_mvests)
    }

    pub async fn currency_median_price(&self) -> Result<f64, LedgerError> {
        Ok(self.rates().await?.currency_median_price)
    }

    pub async fn vests_to_power(&self, vests: f64) -> Result<f64, LedgerError> {
        Ok(self.rates().await?.vests_to_power(vests))
    }

    pub async fn power_to_vests(&self, power: f64) -> Result<f64, LedgerError> {
        self.rates().await?.power_to_vests(power)
    }

    /// [`ConversionRates::power_to_rshares`] at full voting power and a full vote.
    pub async fn power_to_rshares(&self, power: f64) -> Result<f64, LedgerError> {
        self.power_to_rshares_with(power, FULL_PERCENT, FULL_PERCENT).await
    }

    pub async fn power_to_rshares_with(
        &self,
        power: f64,
        voting_power: u32,
        vote_pct: u32,
    ) -> Result<f64, LedgerError> {
        self.rates()
            .await?
            .power_to_rshares(power, voting_power, vote_pct)
    }

    pub async fn token_to_currency(&self, amount: f64) -> Result<f64, LedgerError> {
        Ok(self.rates().await?.token_to_currency(amount))
    }

    pub async fn currency_to_token(&self, amount: f64) -> Result<f64, LedgerError> {
        self.rates().await?.currency_to_token(amount)
    }

    pub async fn currency_to_rshares(&self, currency_payout: f64) -> Result<f64, LedgerError> {
        self.rates().await?.currency_to_rshares(currency_payout)
    }

    pub fn rshares_to_weight(&self, rshares: f64) -> Result<f64, LedgerError> {
        rshares_to_weight(rshares)
    }
}
