//! Paginated account history walker.
//!
//! Turns the ledger's index-addressed, windowed `get_account_history` endpoint into a lazy,
//! oldest-first, filterable stream of [`Operation`]s for one account.
//!
//! The walk is bounded by the account's operation count captured once when the walk starts
//! (the high-water mark): operations appended while walking are not observed, which makes a
//! walk from the same start index reproducible against an unchanged ledger.

use crate::{
    client::{
        LedgerClient,
        model::{HistoryEntry, HistoryItem},
    },
    config::HISTORY_BATCH_SIZE,
    error::LedgerError,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashSet;
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::debug;

/// Stream of [`Operation`]s yielded by a walk. A failed page fetch is yielded as the final
/// `Err` item.
pub type OperationStream = BoxStream<'static, Result<Operation, LedgerError>>;

/// One entry of an account's operation log.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Operation {
    pub index: u64,
    pub trx_id: String,
    pub timestamp: DateTime<Utc>,
    pub op_type: SmolStr,
    pub op: serde_json::Value,
}

impl From<HistoryItem> for Operation {
    fn from(HistoryItem(index, entry): HistoryItem) -> Self {
        let HistoryEntry {
            trx_id,
            block: _,
            timestamp,
            op: (op_type, op),
        } = entry;

        Self {
            index,
            trx_id,
            timestamp,
            op_type,
            op,
        }
    }
}

/// Operation type filter applied while walking.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum OperationFilter {
    #[default]
    All,
    Only(SmolStr),
    AnyOf(FnvHashSet<SmolStr>),
}

impl OperationFilter {
    pub fn matches(&self, op_type: &str) -> bool {
        match self {
            OperationFilter::All => true,
            OperationFilter::Only(tag) => tag == op_type,
            OperationFilter::AnyOf(tags) => tags.contains(op_type),
        }
    }
}

impl From<&str> for OperationFilter {
    fn from(tag: &str) -> Self {
        Self::Only(SmolStr::new(tag))
    }
}

impl From<Option<&str>> for OperationFilter {
    fn from(tag: Option<&str>) -> Self {
        tag.map_or(Self::All, Self::from)
    }
}

impl From<Vec<&str>> for OperationFilter {
    fn from(tags: Vec<&str>) -> Self {
        Self::AnyOf(tags.into_iter().map(SmolStr::new).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OperationFilter {
    fn from(tags: [&str; N]) -> Self {
        Self::AnyOf(tags.into_iter().map(SmolStr::new).collect())
    }
}

/// Walks account histories through a [`LedgerClient`].
#[derive(Debug)]
pub struct HistoryWalker<Client: ?Sized> {
    client: Arc<Client>,
    batch_size: u64,
}

impl<Client: ?Sized> Clone for HistoryWalker<Client> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            batch_size: self.batch_size,
        }
    }
}

impl<Client> HistoryWalker<Client>
where
    Client: LedgerClient + ?Sized + 'static,
{
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            batch_size: HISTORY_BATCH_SIZE,
        }
    }

    /// Current operation count of `account`, the bound of any walk started now.
    pub async fn high_water_mark(&self, account: &str) -> Result<u64, LedgerError> {
        self.client.get_account_operation_count(account).await
    }

    /// All operations of `account` from `start` up to the current high-water mark, oldest
    /// first, filtered by `filter`.
    ///
    /// Fails without starting if the high-water mark cannot be fetched. An account without
    /// history yields an empty stream.
    pub async fn walk(
        &self,
        account: &str,
        filter: impl Into<OperationFilter>,
        start: u64,
    ) -> Result<OperationStream, LedgerError> {
        let high_water_mark = self.high_water_mark(account).await?;
        Ok(self.walk_bounded(account, filter.into(), start, high_water_mark))
    }

    /// Approximately the most recent `take` operations of `account`, oldest first.
    pub async fn recent(
        &self,
        account: &str,
        filter: impl Into<OperationFilter>,
        take: u64,
    ) -> Result<OperationStream, LedgerError> {
        let high_water_mark = self.high_water_mark(account).await?;
        let start = high_water_mark.saturating_sub(take);
        Ok(self.walk_bounded(account, filter.into(), start, high_water_mark))
    }

    /// Convenience: drain [`Self::walk`] into a `Vec`.
    pub async fn collect(
        &self,
        account: &str,
        filter: impl Into<OperationFilter>,
        start: u64,
    ) -> Result<Vec<Operation>, LedgerError> {
        self.walk(account, filter, start).await?.try_collect().await
    }

    fn walk_bounded(
        &self,
        account: &str,
        filter: OperationFilter,
        start: u64,
        high_water_mark: u64,
    ) -> OperationStream {
        debug!(account, start, high_water_mark, "starting account history walk");

        let walk = Walk {
            client: Arc::clone(&self.client),
            account: account.to_string(),
            filter,
            high_water_mark,
            batch_size: self.batch_size,
            cursor: start.saturating_add(self.batch_size),
            first_window: true,
            next_index: start,
            finished: high_water_mark == 0 || start >= high_water_mark,
        };

        stream::try_unfold(walk, Walk::next_page)
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}

/// In-flight pagination state of one walk.
struct Walk<Client: ?Sized> {
    client: Arc<Client>,
    account: String,
    filter: OperationFilter,
    high_water_mark: u64,
    batch_size: u64,
    /// Highest index requested by the next window. Only ever increases.
    cursor: u64,
    first_window: bool,
    /// Lowest index not yet emitted or skipped.
    next_index: u64,
    finished: bool,
}

impl<Client> Walk<Client>
where
    Client: LedgerClient + ?Sized,
{
    async fn next_page(mut self) -> Result<Option<(Vec<Operation>, Self)>, LedgerError> {
        if self.finished {
            return Ok(None);
        }

        // The window is inclusive of its lower bound, which the previous window already
        // returned as its last item.
        let limit = if self.first_window {
            self.batch_size
        } else {
            self.batch_size - 1
        };

        let mut window = self
            .client
            .get_account_history(&self.account, self.cursor, limit)
            .await?;

        debug!(
            account = %self.account,
            cursor = self.cursor,
            limit,
            received = window.len(),
            "fetched account history window"
        );

        if window.is_empty() {
            return Ok(None);
        }

        window.sort_by_key(HistoryItem::index);

        let mut page = Vec::with_capacity(window.len());
        let mut advanced = false;

        for item in window {
            let index = item.index();
            if index >= self.high_water_mark {
                self.finished = true;
                break;
            }
            // Overlap with an already covered range (eg/ a node clamping the window end)
            if index < self.next_index {
                continue;
            }

            self.next_index = index + 1;
            advanced = true;

            if self.filter.matches(&item.1.op.0) {
                page.push(Operation::from(item));
            }
        }

        if !advanced || self.next_index >= self.high_water_mark {
            self.finished = true;
        }

        self.cursor = self.cursor.saturating_add(self.batch_size);
        self.first_window = false;

        Ok(Some((page, self)))
    }
}
