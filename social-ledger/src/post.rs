use crate::{
    chain::Chain,
    client::model::{ActiveVote, Content},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tags [`Post::contains_tags`] screens for by default.
pub const DEFAULT_SCREENED_TAGS: [&str; 3] = ["spam", "test", "nsfw"];

/// Seconds after creation at which a vote earns its full curation reward.
pub const REWARD_WINDOW_SECS: f64 = 1800.0;

/// Votes on posts younger than this are never summed up in [`Post::metadata`].
const METADATA_FALLBACK_AGE_SECS: f64 = 3600.0;

/// Vote on a post annotated with the seconds elapsed between post creation and the vote.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct TimedVote {
    #[serde(flatten)]
    pub vote: ActiveVote,
    pub time_elapsed: i64,
}

/// Vote totals of a post.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct PostMetadata {
    pub rshares: i64,
    pub weight: i64,
    pub time_elapsed: f64,
}

/// Post or comment of a ledger, with convenience views over its content.
#[derive(Clone, PartialEq, Debug)]
pub struct Post {
    chain: Chain,
    content: Content,
}

impl Post {
    pub fn new(chain: Chain, content: Content) -> Self {
        Self { chain, content }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn into_content(self) -> Content {
        self.content
    }

    /// `@author/permlink`
    pub fn identifier(&self) -> String {
        self.content.identifier()
    }

    /// Web front-end url of the post.
    pub fn url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.chain.url_prefix(),
            self.content.category,
            self.identifier()
        )
    }

    /// Empty title, a depth greater than zero or a parent author make a comment.
    pub fn is_comment(&self) -> bool {
        self.content.title.is_empty()
            || self.content.depth > 0
            || !self.content.parent_author.is_empty()
    }

    pub fn votes(&self) -> Vec<TimedVote> {
        self.content
            .active_votes
            .iter()
            .map(|vote| TimedVote {
                vote: vote.clone(),
                time_elapsed: (vote.time - self.content.created).num_seconds(),
            })
            .collect()
    }

    pub fn vote_by(&self, voter: &str) -> Option<TimedVote> {
        self.votes().into_iter().find(|vote| vote.vote.voter == voter)
    }

    pub fn metadata(&self) -> PostMetadata {
        self.metadata_at(Utc::now())
    }

    /// Reward shares and weight of the post as of `now`.
    ///
    /// Once paid out the ledger resets the post's totals, so for posts older than an hour
    /// with no total weight the active votes are summed instead.
    pub fn metadata_at(&self, now: DateTime<Utc>) -> PostMetadata {
        let time_elapsed = self.time_elapsed_at(now);

        let (rshares, weight) =
            if self.content.total_vote_weight == 0 && time_elapsed > METADATA_FALLBACK_AGE_SECS {
                self.content
                    .active_votes
                    .iter()
                    .fold((0, 0), |(rshares, weight), vote| {
                        (rshares + vote.rshares, weight + vote.weight)
                    })
            } else {
                (self.content.vote_rshares, self.content.total_vote_weight)
            };

        PostMetadata {
            rshares,
            weight,
            time_elapsed,
        }
    }

    /// Whether the post is tagged with any of `tags`.
    pub fn contains_tags<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> bool {
        let post_tags = self.content.tags();
        tags.into_iter()
            .any(|tag| post_tags.iter().any(|post_tag| post_tag == tag))
    }

    pub fn time_elapsed(&self) -> f64 {
        self.time_elapsed_at(Utc::now())
    }

    /// Seconds between post creation and `now`.
    pub fn time_elapsed_at(&self, now: DateTime<Utc>) -> f64 {
        (now - self.content.created).num_milliseconds() as f64 / 1000.0
    }

    pub fn payout(&self) -> f64 {
        self.content.total_payout_reward()
    }

    pub fn reward_pct(&self) -> f64 {
        self.reward_pct_at(Utc::now())
    }

    /// Share of the curation reward a vote cast at `now` would earn, in percent.
    pub fn reward_pct_at(&self, now: DateTime<Utc>) -> f64 {
        (self.time_elapsed_at(now) / REWARD_WINDOW_SECS * 100.0).min(100.0)
    }
}
