//! Run audit records.
//!
//! Every run produces one append-only [`RunRecord`] holding the resolved
//! assignments (with the full effective role sets they were collapsed
//! from), every diff operation, and every execution result. That is enough
//! to answer "why does this user hold this capacity on this organization"
//! for any past run without replaying the directory.
//!
//! Records can be shipped to different backends; the in-memory sink exists
//! for tests and inspection, the tracing sink hands records to the
//! observability pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use tessera_core::{ClientId, RunId};
use tessera_directory::{EffectiveAssignment, RoleConflict};

use crate::diff::Operation;
use crate::executor::OperationResult;
use crate::fetch::FetchError;

/// Counts of operation outcomes for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub granted: usize,
    pub updated: usize,
    pub revoked: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Append-only record of one synchronization run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Desired state this run was computed from.
    pub assignments: Vec<EffectiveAssignment>,
    /// Incomparable-role conflicts; these pairs were not written.
    pub conflicts: Vec<RoleConflict>,
    /// Clients whose memberships were skipped for lack of a mapping.
    pub unmapped_clients: Vec<ClientId>,
    /// Organizations excluded because their state could not be fetched.
    pub fetch_errors: Vec<FetchError>,
    /// The diff this run applied.
    pub operations: Vec<Operation>,
    /// One result per operation.
    pub results: Vec<OperationResult>,
    pub counts: RunCounts,
}

/// Error from an audit backend.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to record audit entry: {message}")]
    Sink { message: String },
}

/// Destination for run records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one run record.
    async fn record(&self, record: &RunRecord) -> Result<(), AuditError>;
}

/// In-memory sink for tests and ad-hoc inspection.
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: RwLock<Vec<RunRecord>>,
}

impl InMemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded runs, oldest first.
    pub async fn records(&self) -> Vec<RunRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, record: &RunRecord) -> Result<(), AuditError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

/// Sink that emits run records as structured tracing events.
///
/// The record itself is serialized to JSON on the event so downstream
/// collectors own the storage format.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &RunRecord) -> Result<(), AuditError> {
        let payload =
            serde_json::to_string(record).map_err(|e| AuditError::Sink {
                message: e.to_string(),
            })?;
        info!(
            target: "tessera::audit",
            run_id = %record.run_id,
            granted = record.counts.granted,
            updated = record.counts.updated,
            revoked = record.counts.revoked,
            skipped = record.counts.skipped,
            failed = record.counts.failed,
            record = %payload,
            "Synchronization run recorded"
        );
        for result in record.results.iter().filter(|r| r.is_failed()) {
            warn!(
                target: "tessera::audit",
                run_id = %record.run_id,
                operation = %result.operation,
                "Operation failed during run"
            );
        }
        Ok(())
    }
}
