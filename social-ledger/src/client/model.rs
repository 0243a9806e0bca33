//! Typed ledger RPC responses.
//!
//! Only the fields the toolkit consumes are modelled; unknown fields are ignored.

use crate::asset::{Asset, de_f64_lenient, de_i64_lenient};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;

/// One `[index, entry]` element of an account history window.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct HistoryItem(pub u64, pub HistoryEntry);

impl HistoryItem {
    pub fn index(&self) -> u64 {
        self.0
    }
}

/// Account history entry as returned by `get_account_history`.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub trx_id: String,
    #[serde(default)]
    pub block: u64,
    #[serde(deserialize_with = "de_ledger_time")]
    pub timestamp: DateTime<Utc>,
    /// `[op_type, op_body]`
    pub op: (SmolStr, serde_json::Value),
}

/// Subset of the dynamic global properties object.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct DynamicGlobalProperties {
    #[serde(default)]
    pub head_block_number: u64,
    #[serde(alias = "total_vesting_fund_golos")]
    pub total_vesting_fund_steem: Asset,
    pub total_vesting_shares: Asset,
    #[serde(default, alias = "total_reward_fund_golos")]
    pub total_reward_fund_steem: Option<Asset>,
    #[serde(default, deserialize_with = "de_opt_f64_lenient")]
    pub total_reward_shares2: Option<f64>,
}

/// Exchange rate expressed as `base` per `quote`.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Price {
    pub base: Asset,
    pub quote: Asset,
}

impl Price {
    /// `base / quote`, `None` when the quote is zero.
    pub fn ratio(&self) -> Option<f64> {
        (self.quote.amount != 0.0).then(|| self.base.amount / self.quote.amount)
    }
}

/// Witness price feed history.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct FeedHistory {
    pub current_median_history: Price,
    #[serde(default)]
    pub price_history: Vec<Price>,
}

/// Subset of the account object.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct AccountProps {
    pub name: String,
    #[serde(default, deserialize_with = "de_i64_lenient")]
    pub reputation: i64,
    pub vesting_shares: Asset,
    /// Current voting power in basis points (0 - 10000).
    #[serde(default)]
    pub voting_power: u16,
    pub balance: Asset,
    pub sbd_balance: Asset,
}

/// Follow relation entry returned by `get_followers` / `get_following`.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct FollowEntry {
    pub follower: String,
    pub following: String,
    #[serde(default)]
    pub what: Vec<String>,
}

/// Vote cast on a post.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ActiveVote {
    pub voter: String,
    #[serde(deserialize_with = "de_i64_lenient")]
    pub rshares: i64,
    #[serde(default, deserialize_with = "de_i64_lenient")]
    pub weight: i64,
    #[serde(default, deserialize_with = "de_i64_lenient")]
    pub percent: i64,
    #[serde(deserialize_with = "de_ledger_time")]
    pub time: DateTime<Utc>,
}

/// Post or comment content.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Content {
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub json_metadata: String,
    #[serde(deserialize_with = "de_ledger_time")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub parent_author: String,
    #[serde(default)]
    pub active_votes: Vec<ActiveVote>,
    #[serde(default, deserialize_with = "de_i64_lenient")]
    pub vote_rshares: i64,
    #[serde(default, deserialize_with = "de_i64_lenient")]
    pub total_vote_weight: i64,
    #[serde(default)]
    pub total_payout_value: Option<Asset>,
    #[serde(default)]
    pub curator_payout_value: Option<Asset>,
    #[serde(default)]
    pub pending_payout_value: Option<Asset>,
}

impl Content {
    /// `author/permlink`
    pub fn identifier(&self) -> String {
        format!("@{}/{}", self.author, self.permlink)
    }

    /// Total reward of the post: paid out author and curator rewards plus any pending payout.
    pub fn total_payout_reward(&self) -> f64 {
        [
            &self.total_payout_value,
            &self.curator_payout_value,
            &self.pending_payout_value,
        ]
        .into_iter()
        .flatten()
        .map(|asset| asset.amount)
        .sum()
    }

    /// Tags declared in the json metadata. Unparseable metadata has no tags.
    pub fn tags(&self) -> Vec<String> {
        #[derive(Deserialize)]
        struct Metadata {
            #[serde(default)]
            tags: Vec<String>,
        }

        serde_json::from_str::<Metadata>(&self.json_metadata)
            .map(|metadata| metadata.tags)
            .unwrap_or_default()
    }
}

/// Vote cast by an account on content (`get_account_votes`).
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct AccountVote {
    pub authorperm: String,
    #[serde(default, deserialize_with = "de_i64_lenient")]
    pub weight: i64,
    #[serde(default, deserialize_with = "de_i64_lenient")]
    pub rshares: i64,
    #[serde(default)]
    pub percent: i64,
    #[serde(deserialize_with = "de_ledger_time")]
    pub time: DateTime<Utc>,
}

/// Vesting withdraw route.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct WithdrawRoute {
    pub from_account: String,
    pub to_account: String,
    pub percent: u16,
    #[serde(default)]
    pub auto_vest: bool,
}

/// Pending currency to token conversion.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ConversionRequest {
    #[serde(default)]
    pub id: u64,
    pub owner: String,
    pub requestid: u32,
    pub amount: Asset,
    #[serde(deserialize_with = "de_ledger_time")]
    pub conversion_date: DateTime<Utc>,
}

/// Subset of the witness object.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Witness {
    pub owner: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub total_missed: u64,
    pub sbd_exchange_rate: Price,
}

impl Witness {
    /// Token price last published by the witness, zero if it never published one.
    pub fn published_price(&self) -> f64 {
        self.sbd_exchange_rate.ratio().unwrap_or(0.0)
    }

    /// Blocks missed since an earlier reading of `total_missed`.
    pub fn missed_since(&self, baseline: u64) -> u64 {
        self.total_missed.saturating_sub(baseline)
    }
}

/// Deserialise a ledger timestamp. The ledger emits naive `YYYY-MM-DDTHH:MM:SS` values in UTC;
/// RFC 3339 is accepted too so serialised values round trip.
pub(crate) fn de_ledger_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_ledger_time(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_ledger_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|time| time.with_timezone(&Utc)))
}

fn de_opt_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    de_f64_lenient(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_de_history_window() {
        let input = r#"[
            [0, {"trx_id": "a1", "block": 10, "timestamp": "2016-09-19T12:27:24",
                 "op": ["account_create", {"new_account_name": "kiwi"}]}],
            [1, {"trx_id": "b2", "block": 12, "timestamp": "2016-09-19T12:27:30",
                 "op": ["vote", {"voter": "kiwi", "permlink": "hello", "weight": 10000}]}]
        ]"#;

        let window: Vec<HistoryItem> = serde_json::from_str(input).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[1].index(), 1);
        assert_eq!(window[1].1.op.0, "vote");
        assert_eq!(
            window[1].1.timestamp,
            Utc.with_ymd_and_hms(2016, 9, 19, 12, 27, 30).unwrap()
        );
    }

    #[test]
    fn test_de_dynamic_global_properties() {
        let input = r#"{
            "head_block_number": 5000000,
            "total_vesting_fund_steem": "500000.000 STEEM",
            "total_vesting_shares": "1000000000.000000 VESTS",
            "total_reward_fund_steem": "10000.000 STEEM",
            "total_reward_shares2": "1000000000000000000000000"
        }"#;

        let dgpo: DynamicGlobalProperties = serde_json::from_str(input).unwrap();
        assert_eq!(dgpo.total_vesting_fund_steem.amount, 500000.0);
        assert_eq!(dgpo.total_reward_shares2, Some(1e24));

        let input = r#"{
            "total_vesting_fund_steem": "1.000 GOLOS",
            "total_vesting_shares": "2.000000 GESTS"
        }"#;
        let dgpo: DynamicGlobalProperties = serde_json::from_str(input).unwrap();
        assert_eq!(dgpo.total_reward_fund_steem, None);
        assert_eq!(dgpo.total_reward_shares2, None);
    }

    #[test]
    fn test_content_payout_and_tags() {
        let input = r#"{
            "author": "kiwi", "permlink": "hello", "category": "golos", "title": "Hello",
            "json_metadata": "{\"tags\": [\"golos\", \"nsfw\"]}",
            "created": "2016-09-19T12:00:00", "depth": 0, "parent_author": "",
            "active_votes": [], "vote_rshares": "0", "total_vote_weight": 0,
            "total_payout_value": "10.000 GBG", "curator_payout_value": "2.500 GBG",
            "pending_payout_value": "0.000 GBG"
        }"#;

        let content: Content = serde_json::from_str(input).unwrap();
        assert_eq!(content.identifier(), "@kiwi/hello");
        assert_eq!(content.total_payout_reward(), 12.5);
        assert_eq!(content.tags(), vec!["golos".to_string(), "nsfw".to_string()]);
    }

    #[test]
    fn test_witness_published_price() {
        let witness = Witness {
            owner: "kiwi".to_string(),
            url: String::new(),
            total_missed: 3,
            sbd_exchange_rate: Price {
                base: Asset::new(0.508, "GBG"),
                quote: Asset::new(1.0, "GOLOS"),
            },
        };
        assert_eq!(witness.published_price(), 0.508);

        let witness = Witness {
            sbd_exchange_rate: Price {
                base: Asset::new(0.508, "GBG"),
                quote: Asset::new(0.0, "GOLOS"),
            },
            ..witness
        };
        assert_eq!(witness.published_price(), 0.0);
        assert_eq!(witness.missed_since(1), 2);
        // counter below the baseline, eg/ a different witness object
        assert_eq!(witness.missed_since(10), 0);
    }
}
