//! Conformance test suite for `LedgerStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `LedgerStorage` implementation can run to verify it behaves like the
//! substrate the ledger assumes. The suite covers:
//!
//! - **Read/write**: upsert, insert, duplicate detection, committed reads
//! - **Snapshot isolation**: uncommitted writes invisible, read-your-writes
//! - **Atomic commit**: all-or-nothing semantics, abort discards everything
//! - **OCC**: stale reads conflict at commit, blind writes do not
//! - **Events**: sequence order, paging, no events from aborted snapshots
//! - **Concurrency**: racing read-modify-write tasks, exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use tracechain_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod events;
mod occ;
mod rw;
mod snapshot;

use std::fmt;
use std::future::Future;

use crate::LedgerStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "rw", "snapshot", "occ").
    pub category: String,
    /// Test name (e.g. "insert_twice_returns_already_exists").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: LedgerStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(rw::run_rw_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(occ::run_occ_tests(&factory).await);
    results.extend(events::run_event_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Commit a single key in its own snapshot.
async fn seed<S: LedgerStorage>(
    s: &S,
    key: &str,
    value: serde_json::Value,
) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    s.write(&mut snap, key, value)
        .await
        .map_err(|e| format!("write {key}: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit {key}: {e}"))?;
    Ok(())
}

/// Committed value of `key`, or `None`.
async fn committed<S: LedgerStorage>(
    s: &S,
    key: &str,
) -> Result<Option<serde_json::Value>, String> {
    s.get(key)
        .await
        .map(|r| r.map(|r| r.value))
        .map_err(|e| format!("get {key}: {e}"))
}
