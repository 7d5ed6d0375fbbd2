use std::future::Future;

use serde_json::json;

use super::{committed, seed, TestResult};
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "multi_key_commit_all_visible",
            multi_key_commit_all_visible(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "abort_discards_all_keys_and_events",
            abort_discards_all_keys_and_events(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "failed_commit_applies_nothing",
            failed_commit_applies_nothing(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "receipt_counts_keys_written",
            receipt_counts_keys_written(factory).await,
        ),
    ]
}

/// A transfer touches the token entry and two owner indexes; after commit
/// all three must be visible together.
async fn multi_key_commit_all_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for (k, v) in [
        ("token/0", json!({"owner": "t"})),
        ("owner_tokens/b", json!([])),
        ("owner_tokens/t", json!([0])),
    ] {
        s.write(&mut snap, k, v).await.map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    for k in ["token/0", "owner_tokens/b", "owner_tokens/t"] {
        if committed(&s, k).await?.is_none() {
            return Err(format!("{k} missing after commit"));
        }
    }
    Ok(())
}

async fn abort_discards_all_keys_and_events<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "keep", json!("original")).await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.write(&mut snap, "keep", json!("changed"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert(&mut snap, "new", json!(1))
        .await
        .map_err(|e| e.to_string())?;
    s.append_event(&mut snap, json!({"event": "x"}))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if committed(&s, "keep").await? != Some(json!("original")) {
        return Err("abort changed an existing key".to_string());
    }
    if committed(&s, "new").await?.is_some() {
        return Err("abort leaked an inserted key".to_string());
    }
    if !s
        .list_events(None, 0)
        .await
        .map_err(|e| e.to_string())?
        .is_empty()
    {
        return Err("abort leaked an event".to_string());
    }
    Ok(())
}

/// A conflicting commit must not apply the non-conflicting part of its writes.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "contested", json!(0)).await?;

    let mut loser = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.read(&mut loser, "contested")
        .await
        .map_err(|e| e.to_string())?;
    s.write(&mut loser, "side_effect", json!(true))
        .await
        .map_err(|e| e.to_string())?;
    s.append_event(&mut loser, json!({"event": "loser"}))
        .await
        .map_err(|e| e.to_string())?;

    seed(&s, "contested", json!(1)).await?;

    match s.commit_snapshot(loser).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
    if committed(&s, "side_effect").await?.is_some() {
        return Err("failed commit applied a write".to_string());
    }
    if !s
        .list_events(None, 0)
        .await
        .map_err(|e| e.to_string())?
        .is_empty()
    {
        return Err("failed commit appended an event".to_string());
    }
    Ok(())
}

async fn receipt_counts_keys_written<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.write(&mut snap, "a", json!(1)).await.map_err(|e| e.to_string())?;
    s.write(&mut snap, "a", json!(2)).await.map_err(|e| e.to_string())?;
    s.write(&mut snap, "b", json!(3)).await.map_err(|e| e.to_string())?;
    let receipt = s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    if receipt.keys_written != 2 {
        return Err(format!("expected 2 keys written, got {}", receipt.keys_written));
    }
    Ok(())
}
