use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::{StreamExt, TryStreamExt};
use serde_json::json;
use social_ledger::{
    HistoryWalker, InMemoryLedger, LedgerError, Operation, OperationFilter, chain::Chain,
};
use std::sync::Arc;

const ACCOUNT: &str = "kiwi";

fn genesis() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 9, 19, 12, 0, 0).unwrap()
}

/// Ledger with `count` operations for [`ACCOUNT`]: every third one a `transfer`, every
/// seventh a `curation_reward`, the rest `vote`s.
fn ledger(count: u64) -> InMemoryLedger {
    let ledger = InMemoryLedger::new(Chain::Steem);
    fill(&ledger, count);
    ledger
}

fn fill(ledger: &InMemoryLedger, count: u64) {
    for index in 0..count {
        let op_type = match index {
            index if index % 3 == 0 => "transfer",
            index if index % 7 == 0 => "curation_reward",
            _ => "vote",
        };
        ledger.push_operation(
            ACCOUNT,
            op_type,
            json!({ "seq": index }),
            genesis() + Duration::seconds(index as i64 * 3),
        );
    }
}

fn indices(operations: &[Operation]) -> Vec<u64> {
    operations.iter().map(|operation| operation.index).collect()
}

#[tokio::test]
async fn test_walk_yields_every_operation_in_order() {
    for count in [1, 999, 1000, 1001, 2000, 2001, 2500, 4321] {
        let walker = HistoryWalker::new(Arc::new(ledger(count)));

        let operations = walker.collect(ACCOUNT, OperationFilter::All, 0).await.unwrap();
        assert_eq!(indices(&operations), (0..count).collect::<Vec<_>>(), "count {count}");
    }
}

#[tokio::test]
async fn test_walk_over_clamping_ledger() {
    for count in [1, 1000, 1001, 2500] {
        let ledger = InMemoryLedger::new(Chain::Steem).with_clamped_windows();
        fill(&ledger, count);
        let walker = HistoryWalker::new(Arc::new(ledger));

        let operations = walker.collect(ACCOUNT, OperationFilter::All, 0).await.unwrap();
        assert_eq!(indices(&operations), (0..count).collect::<Vec<_>>(), "count {count}");
    }
}

#[tokio::test]
async fn test_walk_filters() {
    let walker = HistoryWalker::new(Arc::new(ledger(2500)));

    let transfers = walker.collect(ACCOUNT, "transfer", 0).await.unwrap();
    assert_eq!(transfers.len(), 834);
    assert!(transfers.iter().all(|op| op.op_type == "transfer" && op.index % 3 == 0));

    let rewards_and_transfers = walker
        .collect(ACCOUNT, ["transfer", "curation_reward"], 0)
        .await
        .unwrap();
    let expected = (0..2500u64)
        .filter(|index| index % 3 == 0 || index % 7 == 0)
        .collect::<Vec<_>>();
    assert_eq!(indices(&rewards_and_transfers), expected);

    let none = walker.collect(ACCOUNT, "account_create", 0).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_walk_from_start_index() {
    let walker = HistoryWalker::new(Arc::new(ledger(2500)));

    let operations = walker.collect(ACCOUNT, OperationFilter::All, 1500).await.unwrap();
    assert_eq!(indices(&operations), (1500..2500).collect::<Vec<_>>());

    let operations = walker.collect(ACCOUNT, OperationFilter::All, 2499).await.unwrap();
    assert_eq!(indices(&operations), vec![2499]);

    let operations = walker.collect(ACCOUNT, OperationFilter::All, 2500).await.unwrap();
    assert!(operations.is_empty());

    let operations = walker.collect(ACCOUNT, OperationFilter::All, u64::MAX).await.unwrap();
    assert!(operations.is_empty());
}

#[tokio::test]
async fn test_walk_is_bounded_by_high_water_mark_at_start() {
    let ledger = Arc::new(ledger(1500));
    let walker = HistoryWalker::new(Arc::clone(&ledger));

    let mut stream = walker.walk(ACCOUNT, OperationFilter::All, 0).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.index, 0);

    // appended after the walk started
    fill(&ledger, 700);

    let rest: Vec<Operation> = stream.try_collect().await.unwrap();
    assert_eq!(rest.last().map(|op| op.index), Some(1499));
    assert_eq!(rest.len(), 1499);
}

#[tokio::test]
async fn test_walk_is_restartable() {
    let walker = HistoryWalker::new(Arc::new(ledger(3000)));

    let first_run: Vec<Operation> = walker
        .walk(ACCOUNT, OperationFilter::All, 0)
        .await
        .unwrap()
        .take(1200)
        .try_collect()
        .await
        .unwrap();
    let resume_at = first_run.last().unwrap().index + 1;

    let second_run = walker.collect(ACCOUNT, OperationFilter::All, resume_at).await.unwrap();

    let joined = first_run.into_iter().chain(second_run).collect::<Vec<_>>();
    let full = walker.collect(ACCOUNT, OperationFilter::All, 0).await.unwrap();
    assert_eq!(joined, full);
}

#[tokio::test]
async fn test_walk_of_account_without_history() {
    let ledger = Arc::new(ledger(10));
    let walker = HistoryWalker::new(Arc::clone(&ledger));

    let operations = walker.collect("nobody", OperationFilter::All, 0).await.unwrap();
    assert!(operations.is_empty());
    assert_eq!(ledger.history_calls(), 0);
}

#[tokio::test]
async fn test_walk_fails_before_start_when_ledger_is_down() {
    let ledger = Arc::new(ledger(10));
    ledger.set_down(true);
    let walker = HistoryWalker::new(Arc::clone(&ledger));

    let error = walker.walk(ACCOUNT, OperationFilter::All, 0).await.err().unwrap();
    assert!(matches!(error, LedgerError::Rpc { .. }));
    assert_eq!(ledger.history_calls(), 0);
}

#[tokio::test]
async fn test_walk_yields_page_failure_and_ends() {
    let ledger = Arc::new(ledger(3500));
    // second window of a walk from zero
    ledger.fail_window(2000);
    let walker = HistoryWalker::new(Arc::clone(&ledger));

    let items: Vec<Result<Operation, LedgerError>> = walker
        .walk(ACCOUNT, OperationFilter::All, 0)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 1002);
    assert!(items[..1001].iter().all(Result::is_ok));
    assert!(matches!(items[1001], Err(LedgerError::Rpc { .. })));
    assert_eq!(ledger.history_calls(), 2);
}

#[tokio::test]
async fn test_walk_is_lazy() {
    let ledger = Arc::new(ledger(5000));
    let walker = HistoryWalker::new(Arc::clone(&ledger));

    let mut stream = walker.walk(ACCOUNT, OperationFilter::All, 0).await.unwrap();
    assert_eq!(ledger.history_calls(), 0);

    for _ in 0..1001 {
        stream.try_next().await.unwrap();
    }
    assert_eq!(ledger.history_calls(), 1);

    stream.try_next().await.unwrap();
    assert_eq!(ledger.history_calls(), 2);
}

#[tokio::test]
async fn test_recent() {
    let walker = HistoryWalker::new(Arc::new(ledger(2500)));

    let recent: Vec<Operation> = walker
        .recent(ACCOUNT, OperationFilter::All, 10)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(indices(&recent), (2490..2500).collect::<Vec<_>>());

    let everything: Vec<Operation> = walker
        .recent(ACCOUNT, OperationFilter::All, 10_000)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(everything.len(), 2500);

    let recent_votes: Vec<Operation> = walker
        .recent(ACCOUNT, "vote", 21)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert!(recent_votes.iter().all(|op| op.op_type == "vote" && op.index >= 2479));
}
