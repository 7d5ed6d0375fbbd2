use std::future::Future;

use serde_json::json;

use super::TestResult;
use crate::LedgerStorage;

pub(super) async fn run_event_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "events",
            "events_invisible_before_commit",
            events_invisible_before_commit(factory).await,
        ),
        TestResult::from_result(
            "events",
            "sequences_follow_commit_order",
            sequences_follow_commit_order(factory).await,
        ),
        TestResult::from_result(
            "events",
            "list_events_pages_with_after_and_limit",
            list_events_pages_with_after_and_limit(factory).await,
        ),
        TestResult::from_result(
            "events",
            "recorded_at_is_rfc3339",
            recorded_at_is_rfc3339(factory).await,
        ),
    ]
}

async fn append<S: LedgerStorage>(s: &S, payloads: &[serde_json::Value]) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for p in payloads {
        s.append_event(&mut snap, p.clone())
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    Ok(())
}

async fn events_invisible_before_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.append_event(&mut snap, json!({"event": "pending"}))
        .await
        .map_err(|e| e.to_string())?;
    let before = s.list_events(None, 0).await.map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    let after = s.list_events(None, 0).await.map_err(|e| e.to_string())?;
    if !before.is_empty() {
        return Err("event visible before commit".to_string());
    }
    if after.len() != 1 {
        return Err(format!("expected 1 event after commit, got {}", after.len()));
    }
    Ok(())
}

/// Events from separate commits interleave in commit order, not in the
/// order their snapshots began.
async fn sequences_follow_commit_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut early = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.append_event(&mut early, json!({"n": "early"}))
        .await
        .map_err(|e| e.to_string())?;
    append(&s, &[json!({"n": "late-0"}), json!({"n": "late-1"})]).await?;
    s.commit_snapshot(early).await.map_err(|e| e.to_string())?;

    let events = s.list_events(None, 0).await.map_err(|e| e.to_string())?;
    let order: Vec<_> = events.iter().map(|e| e.payload["n"].clone()).collect();
    let seqs: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    if order != vec![json!("late-0"), json!("late-1"), json!("early")] {
        return Err(format!("unexpected event order {order:?}"));
    }
    if seqs != vec![0, 1, 2] {
        return Err(format!("expected sequences [0, 1, 2], got {seqs:?}"));
    }
    Ok(())
}

async fn list_events_pages_with_after_and_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let payloads: Vec<_> = (0..5).map(|n| json!({ "n": n })).collect();
    append(&s, &payloads).await?;

    let page = s.list_events(Some(1), 2).await.map_err(|e| e.to_string())?;
    let seqs: Vec<u64> = page.iter().map(|e| e.sequence).collect();
    if seqs != vec![2, 3] {
        return Err(format!("expected page [2, 3], got {seqs:?}"));
    }
    let tail = s.list_events(Some(4), 0).await.map_err(|e| e.to_string())?;
    if !tail.is_empty() {
        return Err(format!("expected empty tail, got {} event(s)", tail.len()));
    }
    Ok(())
}

async fn recorded_at_is_rfc3339<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    append(&s, &[json!({})]).await?;
    let events = s.list_events(None, 0).await.map_err(|e| e.to_string())?;
    let stamp = &events.first().ok_or("no event")?.recorded_at;
    time::OffsetDateTime::parse(stamp, &time::format_description::well_known::Rfc3339)
        .map_err(|e| format!("recorded_at {stamp:?} is not RFC 3339: {e}"))?;
    Ok(())
}
