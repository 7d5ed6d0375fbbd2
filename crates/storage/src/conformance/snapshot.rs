use std::future::Future;

use serde_json::json;

use super::{committed, seed, TestResult};
use crate::LedgerStorage;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_write_invisible_to_get",
            uncommitted_write_invisible_to_get(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "uncommitted_write_invisible_to_other_snapshot",
            uncommitted_write_invisible_to_other_snapshot(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "read_your_own_writes",
            read_your_own_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "dropped_snapshot_discards_writes",
            dropped_snapshot_discards_writes(factory).await,
        ),
    ]
}

async fn uncommitted_write_invisible_to_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.write(&mut snap, "k", json!("pending"))
        .await
        .map_err(|e| e.to_string())?;
    let seen = committed(&s, "k").await?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    if seen.is_some() {
        return Err(format!("write visible before commit: {seen:?}"));
    }
    if committed(&s, "k").await? != Some(json!("pending")) {
        return Err("write not visible after commit".to_string());
    }
    Ok(())
}

async fn uncommitted_write_invisible_to_other_snapshot<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "owner/0", json!("breeder")).await?;
    let mut writer = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut reader = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.write(&mut writer, "owner/0", json!("transporter"))
        .await
        .map_err(|e| e.to_string())?;
    let seen = s
        .read(&mut reader, "owner/0")
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(writer).await;
    let _ = s.abort_snapshot(reader).await;
    if seen != Some(json!("breeder")) {
        return Err(format!("reader saw foreign uncommitted write: {seen:?}"));
    }
    Ok(())
}

async fn read_your_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "k", json!(1)).await?;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.write(&mut snap, "k", json!(2))
        .await
        .map_err(|e| e.to_string())?;
    let seen = s.read(&mut snap, "k").await.map_err(|e| e.to_string())?;
    s.insert(&mut snap, "fresh", json!("x"))
        .await
        .map_err(|e| e.to_string())?;
    let fresh = s.read(&mut snap, "fresh").await.map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    if seen != Some(json!(2)) {
        return Err(format!("expected own write 2, got {seen:?}"));
    }
    if fresh != Some(json!("x")) {
        return Err(format!("expected own insert, got {fresh:?}"));
    }
    Ok(())
}

async fn dropped_snapshot_discards_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.write(&mut snap, "ghost", json!(true))
            .await
            .map_err(|e| e.to_string())?;
        s.append_event(&mut snap, json!({"event": "ghost"}))
            .await
            .map_err(|e| e.to_string())?;
    }
    if committed(&s, "ghost").await?.is_some() {
        return Err("dropped snapshot leaked a write".to_string());
    }
    let events = s.list_events(None, 0).await.map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err(format!("dropped snapshot leaked {} event(s)", events.len()));
    }
    Ok(())
}
