use std::future::Future;

use serde_json::json;

use super::{committed, seed, TestResult};
use crate::{LedgerStorage, StorageError};

pub(super) async fn run_rw_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "rw",
            "missing_key_reads_none",
            missing_key_reads_none(factory).await,
        ),
        TestResult::from_result(
            "rw",
            "committed_write_readable_via_get",
            committed_write_readable_via_get(factory).await,
        ),
        TestResult::from_result(
            "rw",
            "versions_start_at_one_and_increment",
            versions_start_at_one_and_increment(factory).await,
        ),
        TestResult::from_result(
            "rw",
            "insert_twice_returns_already_exists",
            insert_twice_returns_already_exists(factory).await,
        ),
        TestResult::from_result(
            "rw",
            "insert_over_committed_key_returns_already_exists",
            insert_over_committed_key_returns_already_exists(factory).await,
        ),
        TestResult::from_result(
            "rw",
            "write_overwrites_whole_value",
            write_overwrites_whole_value(factory).await,
        ),
    ]
}

/// Reading a key nobody wrote yields `None` inside and outside a snapshot.
async fn missing_key_reads_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let v = s.read(&mut snap, "nope").await.map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    if v.is_some() {
        return Err(format!("expected None inside snapshot, got {v:?}"));
    }
    if committed(&s, "nope").await?.is_some() {
        return Err("expected None from get".to_string());
    }
    Ok(())
}

async fn committed_write_readable_via_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "animal/0", json!({"species": "Cow"})).await?;
    let rec = s
        .get("animal/0")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("expected committed record")?;
    if rec.key != "animal/0" || rec.value != json!({"species": "Cow"}) {
        return Err(format!("unexpected record {rec:?}"));
    }
    Ok(())
}

async fn versions_start_at_one_and_increment<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "counter", json!(0)).await?;
    let v1 = s.get("counter").await.map_err(|e| e.to_string())?.map(|r| r.version);
    seed(&s, "counter", json!(1)).await?;
    let v2 = s.get("counter").await.map_err(|e| e.to_string())?.map(|r| r.version);
    if v1 != Some(1) || v2 != Some(2) {
        return Err(format!("expected versions 1 then 2, got {v1:?} then {v2:?}"));
    }
    Ok(())
}

async fn insert_twice_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert(&mut snap, "token/3", json!(1))
        .await
        .map_err(|e| e.to_string())?;
    let second = s.insert(&mut snap, "token/3", json!(2)).await;
    let _ = s.abort_snapshot(snap).await;
    match second {
        Err(StorageError::AlreadyExists { key }) if key == "token/3" => Ok(()),
        other => Err(format!("expected AlreadyExists(token/3), got {other:?}")),
    }
}

async fn insert_over_committed_key_returns_already_exists<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "token/3", json!(1)).await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.insert(&mut snap, "token/3", json!(2)).await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        other => Err(format!("expected AlreadyExists, got {other:?}")),
    }
}

async fn write_overwrites_whole_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "meat/2", json!({"part": "Tongue", "weight": 100})).await?;
    seed(&s, "meat/2", json!({"part": "Eye"})).await?;
    let v = committed(&s, "meat/2").await?;
    if v != Some(json!({"part": "Eye"})) {
        return Err(format!("expected full overwrite, got {v:?}"));
    }
    Ok(())
}
