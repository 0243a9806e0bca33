use self::model::{
    AccountProps, AccountVote, Content, ConversionRequest, DynamicGlobalProperties, FeedHistory,
    FollowEntry, HistoryItem, Witness, WithdrawRoute,
};
use crate::{chain::Chain, config::DEFAULT_RATES_TTL, error::LedgerError};
use async_trait::async_trait;
use std::time::Duration;

/// JSON-RPC over HTTP [`LedgerClient`] with ordered node failover.
pub mod http;

/// Deterministic in-process [`LedgerClient`] emulating the ledger's windowed history endpoint.
pub mod memory;

/// Typed ledger RPC responses.
pub mod model;

/// Read-only view of a social ledger node consumed by the toolkit.
///
/// Connection management, node selection and any retry policy belong to implementations.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Ledger network this client is connected to.
    fn chain(&self) -> Chain;

    /// How long a conversion rate snapshot taken through this client stays fresh.
    fn rates_ttl(&self) -> Duration {
        DEFAULT_RATES_TTL
    }

    /// Window of an account's operation log, ascending by index.
    ///
    /// Returns entries with index in `[from - limit, from]` (inclusive at both ends), so a
    /// window of `limit` holds up to `limit + 1` entries.
    async fn get_account_history(
        &self,
        account: &str,
        from: u64,
        limit: u64,
    ) -> Result<Vec<HistoryItem>, LedgerError>;

    /// Number of operations in an account's log (index of the last operation plus one).
    async fn get_account_operation_count(&self, account: &str) -> Result<u64, LedgerError>;

    async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, LedgerError>;

    async fn get_feed_history(&self) -> Result<FeedHistory, LedgerError>;

    async fn get_account(&self, account: &str) -> Result<AccountProps, LedgerError>;

    /// Page of accounts following `account`, starting at `start` (inclusive, empty for first).
    async fn get_followers(
        &self,
        account: &str,
        start: &str,
        limit: u32,
    ) -> Result<Vec<FollowEntry>, LedgerError>;

    /// Page of accounts `account` follows, starting at `start` (inclusive, empty for first).
    async fn get_following(
        &self,
        account: &str,
        start: &str,
        limit: u32,
    ) -> Result<Vec<FollowEntry>, LedgerError>;

    /// `author/permlink` identifiers of an account's blog, newest first.
    async fn get_blog_identifiers(&self, account: &str) -> Result<Vec<String>, LedgerError>;

    async fn get_content(&self, author: &str, permlink: &str) -> Result<Content, LedgerError>;

    async fn get_account_votes(&self, account: &str) -> Result<Vec<AccountVote>, LedgerError>;

    async fn get_withdraw_routes(&self, account: &str) -> Result<Vec<WithdrawRoute>, LedgerError>;

    async fn get_conversion_requests(
        &self,
        account: &str,
    ) -> Result<Vec<ConversionRequest>, LedgerError>;

    async fn get_witness_by_account(&self, witness: &str) -> Result<Witness, LedgerError>;
}
