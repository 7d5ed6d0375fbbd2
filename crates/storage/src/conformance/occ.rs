use std::future::Future;

use serde_json::json;

use super::{committed, seed, TestResult};
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_occ_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "occ",
            "stale_read_conflicts_at_commit",
            stale_read_conflicts_at_commit(factory).await,
        ),
        TestResult::from_result(
            "occ",
            "conflict_error_names_key_and_versions",
            conflict_error_names_key_and_versions(factory).await,
        ),
        TestResult::from_result(
            "occ",
            "blind_write_does_not_conflict",
            blind_write_does_not_conflict(factory).await,
        ),
        TestResult::from_result(
            "occ",
            "racing_inserts_second_conflicts",
            racing_inserts_second_conflicts(factory).await,
        ),
        TestResult::from_result(
            "occ",
            "unrelated_keys_do_not_conflict",
            unrelated_keys_do_not_conflict(factory).await,
        ),
    ]
}

/// Two snapshots read-modify-write the same owner entry; the second
/// committer must observe the first and fail.
async fn stale_read_conflicts_at_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "token/0", json!({"owner": "b"})).await?;

    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.read(&mut first, "token/0").await.map_err(|e| e.to_string())?;
    s.read(&mut second, "token/0").await.map_err(|e| e.to_string())?;
    s.write(&mut first, "token/0", json!({"owner": "t1"}))
        .await
        .map_err(|e| e.to_string())?;
    s.write(&mut second, "token/0", json!({"owner": "t2"}))
        .await
        .map_err(|e| e.to_string())?;

    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    match s.commit_snapshot(second).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
    if committed(&s, "token/0").await? != Some(json!({"owner": "t1"})) {
        return Err("losing commit overwrote the winner".to_string());
    }
    Ok(())
}

async fn conflict_error_names_key_and_versions<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "k", json!(0)).await?;
    let mut stale = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.read(&mut stale, "k").await.map_err(|e| e.to_string())?;
    seed(&s, "k", json!(1)).await?;
    match s.commit_snapshot(stale).await {
        Err(StorageError::ConcurrentConflict {
            key,
            expected_version,
            found_version,
        }) => {
            if key != "k" || expected_version != 1 || found_version != 2 {
                return Err(format!(
                    "unexpected conflict fields: key={key} expected={expected_version} found={found_version}"
                ));
            }
            Ok(())
        }
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}

async fn blind_write_does_not_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "k", json!(0)).await?;
    let mut blind = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.write(&mut blind, "k", json!("blind"))
        .await
        .map_err(|e| e.to_string())?;
    seed(&s, "k", json!(1)).await?;
    s.commit_snapshot(blind)
        .await
        .map_err(|e| format!("blind write conflicted: {e}"))?;
    Ok(())
}

async fn racing_inserts_second_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut a = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut b = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert(&mut a, "token/9", json!("a"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert(&mut b, "token/9", json!("b"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(a).await.map_err(|e| e.to_string())?;
    match s.commit_snapshot(b).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}

async fn unrelated_keys_do_not_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "x", json!(0)).await?;
    seed(&s, "y", json!(0)).await?;
    let mut a = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut b = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.read(&mut a, "x").await.map_err(|e| e.to_string())?;
    s.write(&mut a, "x", json!(1)).await.map_err(|e| e.to_string())?;
    s.read(&mut b, "y").await.map_err(|e| e.to_string())?;
    s.write(&mut b, "y", json!(1)).await.map_err(|e| e.to_string())?;
    s.commit_snapshot(a).await.map_err(|e| e.to_string())?;
    s.commit_snapshot(b)
        .await
        .map_err(|e| format!("disjoint snapshot conflicted: {e}"))?;
    Ok(())
}
