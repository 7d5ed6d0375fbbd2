use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Barrier;

use super::{committed, seed, TestResult};
use crate::{LedgerStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "racing_read_modify_write_exactly_one_wins",
            racing_read_modify_write_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "disjoint_keys_all_commit",
            disjoint_keys_all_commit(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "retried_increments_all_land",
            retried_increments_all_land(factory).await,
        ),
    ]
}

/// Read-modify-write of `key` as one snapshot; `Ok(false)` on conflict.
async fn increment<S: LedgerStorage>(
    s: &S,
    key: &str,
    barrier: Option<&Barrier>,
) -> Result<bool, StorageError> {
    let mut snap = s.begin_snapshot().await?;
    let current = s
        .read(&mut snap, key)
        .await?
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    s.write(&mut snap, key, json!(current + 1)).await?;
    if let Some(b) = barrier {
        b.wait().await;
    }
    match s.commit_snapshot(snap).await {
        Ok(_) => Ok(true),
        Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// N tasks all read the counter before any of them commits. Exactly one
/// commit succeeds; the rest must get ConcurrentConflict.
async fn racing_read_modify_write_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), "counter/token", json!(0)).await?;
    let barrier = Arc::new(Barrier::new(N));

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        let b = barrier.clone();
        handles.push(tokio::spawn(async move {
            increment(s.as_ref(), "counter/token", Some(b.as_ref())).await
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if committed(storage.as_ref(), "counter/token").await? != Some(json!(1)) {
        return Err("counter does not reflect exactly one increment".to_string());
    }
    Ok(())
}

async fn disjoint_keys_all_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let barrier = Arc::new(Barrier::new(N));

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let b = barrier.clone();
        handles.push(tokio::spawn(async move {
            increment(s.as_ref(), &format!("counter/{i}"), Some(b.as_ref())).await
        }));
    }
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if !won {
            return Err("disjoint key commit reported a conflict".to_string());
        }
    }
    Ok(())
}

/// Callers that retry after a conflict eventually all land; no increment
/// is lost or applied twice.
async fn retried_increments_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            loop {
                if increment(s.as_ref(), "counter/shared", None).await? {
                    return Ok::<(), StorageError>(());
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let value = committed(storage.as_ref(), "counter/shared").await?;
    if value != Some(json!(N as u64)) {
        return Err(format!("expected counter {N}, got {value:?}"));
    }
    Ok(())
}
