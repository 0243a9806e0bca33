use super::{
    LedgerClient,
    model::{
        AccountProps, AccountVote, Content, ConversionRequest, DynamicGlobalProperties,
        FeedHistory, FollowEntry, HistoryEntry, HistoryItem, Witness, WithdrawRoute,
    },
};
use crate::{chain::Chain, config::DEFAULT_RATES_TTL, error::LedgerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use serde_json::Value;
use smol_str::SmolStr;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

#[derive(Debug, Default)]
struct State {
    histories: FnvHashMap<String, Vec<HistoryEntry>>,
    accounts: FnvHashMap<String, AccountProps>,
    dynamic_global_properties: Option<DynamicGlobalProperties>,
    feed_history: Option<FeedHistory>,
    /// account -> accounts following it
    followers: FnvHashMap<String, Vec<String>>,
    blogs: FnvHashMap<String, Vec<Content>>,
    account_votes: FnvHashMap<String, Vec<AccountVote>>,
    withdraw_routes: FnvHashMap<String, Vec<WithdrawRoute>>,
    conversion_requests: FnvHashMap<String, Vec<ConversionRequest>>,
    witnesses: FnvHashMap<String, Witness>,
    /// `from` cursor values whose history window fails
    failing_windows: Vec<u64>,
    ledger_down: bool,
}

/// In-process [`LedgerClient`].
///
/// History windows follow the node's convention: `[from - limit, from]` inclusive at both
/// ends. With `clamp_window` enabled a `from` beyond the newest entry is clamped to it, as
/// production nodes do.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    chain: Chain,
    clamp_window: bool,
    rates_ttl: Option<Duration>,
    state: RwLock<State>,
    history_calls: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            ..Self::default()
        }
    }

    /// Clamp history windows that start beyond the newest entry.
    pub fn with_clamped_windows(mut self) -> Self {
        self.clamp_window = true;
        self
    }

    /// Conversion rate snapshot lifetime reported to converters built on this ledger.
    pub fn with_rates_ttl(mut self, ttl: Duration) -> Self {
        self.rates_ttl = Some(ttl);
        self
    }

    /// Append an operation to an account's log, returning its index.
    pub fn push_operation(
        &self,
        account: &str,
        op_type: &str,
        op: Value,
        timestamp: DateTime<Utc>,
    ) -> u64 {
        let mut state = self.state.write();
        let history = state.histories.entry(account.to_string()).or_default();
        let index = history.len() as u64;
        history.push(HistoryEntry {
            trx_id: format!("{account}-{index:08}"),
            block: index,
            timestamp,
            op: (SmolStr::new(op_type), op),
        });
        index
    }

    pub fn set_account(&self, account: AccountProps) {
        self.state.write().accounts.insert(account.name.clone(), account);
    }

    pub fn set_dynamic_global_properties(&self, properties: DynamicGlobalProperties) {
        self.state.write().dynamic_global_properties = Some(properties);
    }

    pub fn set_feed_history(&self, feed_history: FeedHistory) {
        self.state.write().feed_history = Some(feed_history);
    }

    pub fn add_follower(&self, account: &str, follower: &str) {
        let mut state = self.state.write();
        let followers = state.followers.entry(account.to_string()).or_default();
        followers.push(follower.to_string());
        followers.sort();
    }

    /// Add a post to the front of an account's blog (blogs are newest first).
    pub fn add_post(&self, account: &str, content: Content) {
        self.state
            .write()
            .blogs
            .entry(account.to_string())
            .or_default()
            .insert(0, content);
    }

    pub fn set_account_votes(&self, account: &str, votes: Vec<AccountVote>) {
        self.state.write().account_votes.insert(account.to_string(), votes);
    }

    pub fn set_withdraw_routes(&self, account: &str, routes: Vec<WithdrawRoute>) {
        self.state.write().withdraw_routes.insert(account.to_string(), routes);
    }

    pub fn set_conversion_requests(&self, account: &str, requests: Vec<ConversionRequest>) {
        self.state
            .write()
            .conversion_requests
            .insert(account.to_string(), requests);
    }

    pub fn set_witness(&self, witness: Witness) {
        self.state.write().witnesses.insert(witness.owner.clone(), witness);
    }

    /// Make the history window requested with `from` fail.
    pub fn fail_window(&self, from: u64) {
        self.state.write().failing_windows.push(from);
    }

    /// Make every call fail, or recover.
    pub fn set_down(&self, down: bool) {
        self.state.write().ledger_down = down;
    }

    /// Number of `get_account_history` windows served so far.
    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn ensure_up(&self, method: &str) -> Result<(), LedgerError> {
        if self.state.read().ledger_down {
            return Err(LedgerError::Rpc {
                method: method.to_string(),
                message: "ledger unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn follow_page(
        entries: Vec<FollowEntry>,
        start: &str,
        limit: u32,
        key: impl Fn(&FollowEntry) -> &str,
    ) -> Vec<FollowEntry> {
        entries
            .into_iter()
            .skip_while(|entry| !start.is_empty() && key(entry) < start)
            .take(limit as usize)
            .collect()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn rates_ttl(&self) -> Duration {
        self.rates_ttl.unwrap_or(DEFAULT_RATES_TTL)
    }

    async fn get_account_history(
        &self,
        account: &str,
        from: u64,
        limit: u64,
    ) -> Result<Vec<HistoryItem>, LedgerError> {
        self.ensure_up("get_account_history")?;
        self.history_calls.fetch_add(1, Ordering::SeqCst);

        let state = self.state.read();
        if state.failing_windows.contains(&from) {
            return Err(LedgerError::Rpc {
                method: "get_account_history".to_string(),
                message: format!("window ending at {from} unavailable"),
            });
        }

        let Some(history) = state
            .histories
            .get(account)
            .filter(|history| !history.is_empty())
        else {
            return Ok(vec![]);
        };

        let newest = history.len() as u64 - 1;
        let from = if self.clamp_window { from.min(newest) } else { from };
        let lowest = from.saturating_sub(limit);

        Ok((lowest..=from.min(newest))
            .map(|index| HistoryItem(index, history[index as usize].clone()))
            .collect())
    }

    async fn get_account_operation_count(&self, account: &str) -> Result<u64, LedgerError> {
        self.ensure_up("get_account_history")?;
        Ok(self
            .state
            .read()
            .histories
            .get(account)
            .map_or(0, |history| history.len() as u64))
    }

    async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, LedgerError> {
        self.ensure_up("get_dynamic_global_properties")?;
        self.state
            .read()
            .dynamic_global_properties
            .clone()
            .ok_or_else(|| LedgerError::Malformed("dynamic global properties not set".to_string()))
    }

    async fn get_feed_history(&self) -> Result<FeedHistory, LedgerError> {
        self.ensure_up("get_feed_history")?;
        self.state
            .read()
            .feed_history
            .clone()
            .ok_or_else(|| LedgerError::Malformed("feed history not set".to_string()))
    }

    async fn get_account(&self, account: &str) -> Result<AccountProps, LedgerError> {
        self.ensure_up("get_accounts")?;
        self.state
            .read()
            .accounts
            .get(account)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }

    async fn get_followers(
        &self,
        account: &str,
        start: &str,
        limit: u32,
    ) -> Result<Vec<FollowEntry>, LedgerError> {
        self.ensure_up("get_followers")?;
        let entries = self
            .state
            .read()
            .followers
            .get(account)
            .into_iter()
            .flatten()
            .map(|follower| FollowEntry {
                follower: follower.clone(),
                following: account.to_string(),
                what: vec!["blog".to_string()],
            })
            .collect();

        Ok(Self::follow_page(entries, start, limit, |entry| entry.follower.as_str()))
    }

    async fn get_following(
        &self,
        account: &str,
        start: &str,
        limit: u32,
    ) -> Result<Vec<FollowEntry>, LedgerError> {
        self.ensure_up("get_following")?;
        let mut entries: Vec<FollowEntry> = self
            .state
            .read()
            .followers
            .iter()
            .filter(|(_, followers)| followers.iter().any(|follower| follower == account))
            .map(|(followed, _)| FollowEntry {
                follower: account.to_string(),
                following: followed.clone(),
                what: vec!["blog".to_string()],
            })
            .collect();
        entries.sort_by(|a, b| a.following.cmp(&b.following));

        Ok(Self::follow_page(entries, start, limit, |entry| entry.following.as_str()))
    }

    async fn get_blog_identifiers(&self, account: &str) -> Result<Vec<String>, LedgerError> {
        self.ensure_up("get_state")?;
        Ok(self
            .state
            .read()
            .blogs
            .get(account)
            .into_iter()
            .flatten()
            .map(|content| format!("{}/{}", content.author, content.permlink))
            .collect())
    }

    async fn get_content(&self, author: &str, permlink: &str) -> Result<Content, LedgerError> {
        self.ensure_up("get_content")?;
        self.state
            .read()
            .blogs
            .values()
            .flatten()
            .find(|content| content.author == author && content.permlink == permlink)
            .cloned()
            .ok_or_else(|| LedgerError::Malformed(format!("no content @{author}/{permlink}")))
    }

    async fn get_account_votes(&self, account: &str) -> Result<Vec<AccountVote>, LedgerError> {
        self.ensure_up("get_account_votes")?;
        Ok(self
            .state
            .read()
            .account_votes
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_withdraw_routes(&self, account: &str) -> Result<Vec<WithdrawRoute>, LedgerError> {
        self.ensure_up("get_withdraw_routes")?;
        Ok(self
            .state
            .read()
            .withdraw_routes
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_conversion_requests(
        &self,
        account: &str,
    ) -> Result<Vec<ConversionRequest>, LedgerError> {
        self.ensure_up("get_conversion_requests")?;
        Ok(self
            .state
            .read()
            .conversion_requests
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_witness_by_account(&self, witness: &str) -> Result<Witness, LedgerError> {
        self.ensure_up("get_witness_by_account")?;
        self.state
            .read()
            .witnesses
            .get(witness)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(witness.to_string()))
    }
}
