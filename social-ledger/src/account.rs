//! Read-only view of one ledger account.
//!
//! [`Account`] bundles the account's properties, social graph, blog and operation history
//! with the economic figures derived from them (power, reputation, curation returns).
//! Properties and blog are fetched once per facade and then reused.

use crate::{
    asset::parse_amount,
    client::{
        LedgerClient,
        model::{AccountProps, AccountVote, ConversionRequest, FollowEntry, WithdrawRoute},
    },
    convert::Converter,
    error::LedgerError,
    history::{HistoryWalker, OperationFilter, OperationStream},
    post::Post,
};
use chrono::{DateTime, Duration, Utc};
use futures::{TryStreamExt, future::try_join_all};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::OnceCell;
use tracing::debug;

/// Page size used when listing followers.
pub const FOLLOW_PAGE_SIZE: u32 = 100;

/// Power an account needs to count as a whale.
pub const WHALE_POWER_THRESHOLD: f64 = 1e5;

/// Most recent operations scanned for a previous vote.
const VOTE_LOOKBACK: u64 = 1000;

/// Most recent operations scanned for curation rewards.
const CURATION_LOOKBACK: u64 = 10_000;

/// Blog window selection: skip the newest `skip` posts, then take up to `max_posts`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct BlogWindow {
    pub skip: usize,
    pub max_posts: usize,
}

impl Default for BlogWindow {
    fn default() -> Self {
        Self {
            skip: 1,
            max_posts: 10,
        }
    }
}

impl BlogWindow {
    pub fn with_max_posts(max_posts: usize) -> Self {
        Self {
            max_posts,
            ..Self::default()
        }
    }

    fn select<'a>(&self, blog: &'a [Post]) -> &'a [Post] {
        let start = self.skip.min(blog.len());
        let end = start.saturating_add(self.max_posts).min(blog.len());
        &blog[start..end]
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct WinningPosts {
    pub winners: usize,
    pub blog_posts: usize,
}

/// Curation rewards in power over the trailing day and week.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct CurationStats {
    #[serde(rename = "24hr")]
    pub day: f64,
    #[serde(rename = "7d")]
    pub week: f64,
    /// Daily average over the trailing week.
    pub avg: f64,
}

/// Common features of an author's recent posts.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct AccountFeatures {
    pub name: String,
    pub settings: FeatureSettings,
    pub author: AuthorFeatures,
}

#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct FeatureSettings {
    pub max_posts: usize,
    pub payout_requirement: f64,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct AuthorFeatures {
    pub post_count: usize,
    pub winners: usize,
    /// Power, truncated.
    pub sp: i64,
    pub rep: f64,
    pub followers: usize,
    /// Mean time to whale in seconds.
    pub ttw: Option<f64>,
    /// Average payout per post.
    pub ppp: f64,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum FollowDirection {
    Followers,
    Following,
}

impl FollowDirection {
    fn name(self, entry: FollowEntry) -> String {
        match self {
            FollowDirection::Followers => entry.follower,
            FollowDirection::Following => entry.following,
        }
    }
}

/// Reputation score as displayed by the ledger front-ends.
pub fn reputation_score(raw: i64) -> f64 {
    match raw {
        raw if raw < 0 => -1.0,
        0 => 25.0,
        raw => {
            let score = ((raw as f64).log10() - 9.0) * 9.0 + 25.0;
            (score * 100.0).round() / 100.0
        }
    }
}

/// One ledger account.
#[derive(Debug)]
pub struct Account<Client: ?Sized> {
    name: String,
    client: Arc<Client>,
    converter: Arc<Converter<Client>>,
    walker: HistoryWalker<Client>,
    props: OnceCell<AccountProps>,
    blog: OnceCell<Vec<Post>>,
}

impl<Client> Account<Client>
where
    Client: LedgerClient + ?Sized + 'static,
{
    pub fn new(name: impl Into<String>, client: Arc<Client>) -> Self {
        let converter = Arc::new(Converter::new(Arc::clone(&client)));
        Self::with_converter(name, client, converter)
    }

    /// Account sharing the rate snapshot of an existing [`Converter`].
    pub fn with_converter(
        name: impl Into<String>,
        client: Arc<Client>,
        converter: Arc<Converter<Client>>,
    ) -> Self {
        Self {
            name: name.into(),
            walker: HistoryWalker::new(Arc::clone(&client)),
            client,
            converter,
            props: OnceCell::new(),
            blog: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn converter(&self) -> &Converter<Client> {
        &self.converter
    }

    pub async fn props(&self) -> Result<&AccountProps, LedgerError> {
        self.props
            .get_or_try_init(|| self.client.get_account(&self.name))
            .await
    }

    pub async fn reputation(&self) -> Result<f64, LedgerError> {
        Ok(reputation_score(self.props().await?.reputation))
    }

    /// Vested power, vesting shares truncated to whole shares.
    pub async fn power(&self) -> Result<f64, LedgerError> {
        let vests = self.props().await?.vesting_shares.amount.trunc();
        self.converter.vests_to_power(vests).await
    }

    /// Current voting power in percent.
    pub async fn voting_power(&self) -> Result<f64, LedgerError> {
        Ok(f64::from(self.props().await?.voting_power) / 100.0)
    }

    /// Liquid token, pegged currency and vesting balances keyed by lowercase symbol,
    /// eg/ `golos`, `gbg`, `gests`. Always fetched fresh.
    pub async fn balances(&self) -> Result<BTreeMap<String, f64>, LedgerError> {
        let chain = self.client.chain();
        let props = self.client.get_account(&self.name).await?;

        Ok(BTreeMap::from([
            (chain.token_symbol().to_lowercase(), props.balance.amount),
            (chain.currency_symbol().to_lowercase(), props.sbd_balance.amount),
            (chain.vests_symbol().to_lowercase(), props.vesting_shares.amount),
        ]))
    }

    pub async fn followers(&self) -> Result<Vec<String>, LedgerError> {
        self.follow_list(FollowDirection::Followers).await
    }

    pub async fn following(&self) -> Result<Vec<String>, LedgerError> {
        self.follow_list(FollowDirection::Following).await
    }

    /// Pages through the follow list. Every page after the first starts at the last name of
    /// the previous one, which is dropped.
    async fn follow_list(&self, direction: FollowDirection) -> Result<Vec<String>, LedgerError> {
        let mut names = Vec::new();
        let mut start = String::new();

        loop {
            let page = match direction {
                FollowDirection::Followers => {
                    self.client
                        .get_followers(&self.name, &start, FOLLOW_PAGE_SIZE)
                        .await?
                }
                FollowDirection::Following => {
                    self.client
                        .get_following(&self.name, &start, FOLLOW_PAGE_SIZE)
                        .await?
                }
            };

            let full_page = page.len() == FOLLOW_PAGE_SIZE as usize;
            let before = names.len();
            names.extend(
                page.into_iter()
                    .map(|entry| direction.name(entry))
                    .skip_while(|name| !start.is_empty() && *name == start),
            );

            match names.last() {
                Some(last) if full_page && names.len() > before => start = last.clone(),
                _ => break,
            }
        }

        debug!(account = %self.name, ?direction, count = names.len(), "listed follow relations");
        Ok(names)
    }

    /// Posts of the account's blog, newest first.
    pub async fn blog(&self) -> Result<&[Post], LedgerError> {
        self.blog
            .get_or_try_init(|| self.fetch_blog())
            .await
            .map(Vec::as_slice)
    }

    async fn fetch_blog(&self) -> Result<Vec<Post>, LedgerError> {
        let chain = self.client.chain();
        let identifiers = self.client.get_blog_identifiers(&self.name).await?;

        let contents = identifiers.iter().map(|identifier| async move {
            let (author, permlink) = identifier
                .trim_start_matches('@')
                .split_once('/')
                .ok_or_else(|| LedgerError::Malformed(format!("blog entry {identifier:?}")))?;

            self.client.get_content(author, permlink).await
        });

        Ok(try_join_all(contents)
            .await?
            .into_iter()
            .map(|content| Post::new(chain, content))
            .collect())
    }

    pub async fn number_of_winning_posts(
        &self,
        window: BlogWindow,
        payout_requirement: f64,
    ) -> Result<WinningPosts, LedgerError> {
        let posts = window.select(self.blog().await?);

        Ok(WinningPosts {
            winners: posts
                .iter()
                .filter(|post| post.payout() >= payout_requirement)
                .count(),
            blog_posts: posts.len(),
        })
    }

    /// Mean payout of the selected posts, zero without posts.
    pub async fn avg_payout_per_post(&self, window: BlogWindow) -> Result<f64, LedgerError> {
        let posts = window.select(self.blog().await?);
        if posts.is_empty() {
            return Ok(0.0);
        }

        Ok(posts.iter().map(Post::payout).sum::<f64>() / posts.len() as f64)
    }

    /// Mean seconds it took the first `mean_of_recent` selected posts to gather the reward
    /// shares of a full vote with `whale_power`. `None` if no post got there.
    pub async fn time_to_whale(
        &self,
        whale_power: f64,
        window: BlogWindow,
        mean_of_recent: usize,
    ) -> Result<Option<f64>, LedgerError> {
        let whale_rshares = self.converter.power_to_rshares(whale_power).await?;
        let posts = window.select(self.blog().await?);

        let mut times = Vec::new();
        for post in posts {
            let mut rshares_sum = 0.0;
            for vote in post.votes().into_iter().sorted_by_key(|vote| vote.time_elapsed) {
                rshares_sum += vote.vote.rshares as f64;
                if rshares_sum >= whale_rshares {
                    times.push(vote.time_elapsed as f64);
                    break;
                }
            }
        }

        let recent = &times[..times.len().min(mean_of_recent)];
        if recent.is_empty() {
            return Ok(None);
        }
        Ok(Some(recent.iter().sum::<f64>() / recent.len() as f64))
    }

    /// Whether one of the account's last votes went to `permlink`.
    pub async fn check_if_already_voted(&self, permlink: &str) -> Result<bool, LedgerError> {
        let mut votes = self.recent("vote", VOTE_LOOKBACK).await?;

        while let Some(vote) = votes.try_next().await? {
            let field = |name: &str| vote.op.get(name).and_then(|value| value.as_str());
            if field("voter") == Some(self.name.as_str()) && field("permlink") == Some(permlink) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub async fn curation_stats(&self) -> Result<CurationStats, LedgerError> {
        self.curation_stats_at(Utc::now()).await
    }

    /// Curation rewards earned in the 24 hours and 7 days before `now`.
    pub async fn curation_stats_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CurationStats, LedgerError> {
        let day_ago = now - Duration::hours(24);
        let week_ago = now - Duration::days(7);

        let mut rewards = self.recent("curation_reward", CURATION_LOOKBACK).await?;
        let (mut day_vests, mut week_vests) = (0.0, 0.0);

        while let Some(reward) = rewards.try_next().await? {
            if reward.timestamp <= week_ago {
                continue;
            }

            let vests = reward
                .op
                .get("reward")
                .and_then(|value| value.as_str())
                .ok_or_else(|| {
                    LedgerError::Malformed(format!(
                        "curation_reward {} has no reward",
                        reward.index
                    ))
                })
                .and_then(parse_amount)?;

            week_vests += vests;
            if reward.timestamp > day_ago {
                day_vests += vests;
            }
        }

        let rates = self.converter.rates().await?;
        let week = rates.vests_to_power(week_vests);

        Ok(CurationStats {
            day: rates.vests_to_power(day_vests),
            week,
            avg: week / 7.0,
        })
    }

    pub async fn features(
        &self,
        max_posts: usize,
        payout_requirement: f64,
    ) -> Result<AccountFeatures, LedgerError> {
        let window = BlogWindow::with_max_posts(max_posts);

        let winning = self.number_of_winning_posts(window, payout_requirement).await?;
        let power = self.power().await?;
        let reputation = self.reputation().await?;
        let followers = self.followers().await?;
        let time_to_whale = self.time_to_whale(WHALE_POWER_THRESHOLD, window, 3).await?;
        let payout_per_post = self.avg_payout_per_post(window).await?;

        Ok(AccountFeatures {
            name: self.name.clone(),
            settings: FeatureSettings {
                max_posts,
                payout_requirement,
            },
            author: AuthorFeatures {
                post_count: winning.blog_posts,
                winners: winning.winners,
                sp: power.trunc() as i64,
                rep: reputation,
                followers: followers.len(),
                ttw: time_to_whale,
                ppp: payout_per_post,
            },
        })
    }

    /// Number of operations in the account's history, virtual operations included.
    pub async fn virtual_op_count(&self) -> Result<u64, LedgerError> {
        self.walker.high_water_mark(&self.name).await
    }

    /// Operation history from `start`, oldest first. See [`HistoryWalker::walk`].
    pub async fn history(
        &self,
        filter: impl Into<OperationFilter>,
        start: u64,
    ) -> Result<OperationStream, LedgerError> {
        self.walker.walk(&self.name, filter, start).await
    }

    /// Roughly the last `take` operations, oldest first. See [`HistoryWalker::recent`].
    pub async fn recent(
        &self,
        filter: impl Into<OperationFilter>,
        take: u64,
    ) -> Result<OperationStream, LedgerError> {
        self.walker.recent(&self.name, filter, take).await
    }

    /// Witness votes of the account.
    pub async fn account_votes(&self) -> Result<Vec<AccountVote>, LedgerError> {
        self.client.get_account_votes(&self.name).await
    }

    pub async fn withdraw_routes(&self) -> Result<Vec<WithdrawRoute>, LedgerError> {
        self.client.get_withdraw_routes(&self.name).await
    }

    pub async fn conversion_requests(&self) -> Result<Vec<ConversionRequest>, LedgerError> {
        self.client.get_conversion_requests(&self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reputation_score() {
        struct TestCase {
            input: i64,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: negative reputation clamps
                input: -1_000_000_000,
                expected: -1.0,
            },
            TestCase {
                // TC1: new account
                input: 0,
                expected: 25.0,
            },
            TestCase {
                // TC2: 1e9 maps to the starting score
                input: 1_000_000_000,
                expected: 25.0,
            },
            TestCase {
                // TC3: every order of magnitude adds nine points
                input: 100_000_000_000,
                expected: 43.0,
            },
            TestCase {
                // TC4: rounded to two decimals
                input: 7_023_465_845_178,
                expected: 59.62,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = reputation_score(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_blog_window_select() {
        let window = BlogWindow::default();
        assert_eq!(window.select(&[]).len(), 0);

        let window = BlogWindow {
            skip: 5,
            max_posts: 10,
        };
        assert_eq!(window.select(&[]).len(), 0);
    }
}
