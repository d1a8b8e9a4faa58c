//! Run orchestration.
//!
//! Ties the pure resolution pipeline to the catalog-facing fetch and
//! execution stages and records the outcome. Runs are serial per engine:
//! overlapping runs against the same organizations would race their
//! writes, so a second `run()` fails fast with `AlreadyRunning`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use tessera_catalog_client::CatalogApi;
use tessera_core::{OrgId, RunId};
use tessera_directory::{DirectoryModel, RoleConflict, RoleResolver};

use crate::audit::{AuditSink, RunCounts, RunRecord};
use crate::config::SyncConfig;
use crate::diff::{diff, Operation};
use crate::error::{SyncError, SyncResult};
use crate::executor::{OperationResult, SyncExecutor};
use crate::fetch::{FetchError, StateFetcher};
use crate::rate_limiter::RateLimiter;

/// User-facing outcome of one synchronization run: outcome counts plus
/// the per-entity problem records.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub granted: usize,
    pub updated: usize,
    pub revoked: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Incomparable-role conflicts; nothing was written for these pairs.
    pub conflicts: Vec<RoleConflict>,
    /// Organizations excluded because their state could not be fetched.
    pub fetch_errors: Vec<FetchError>,
    /// Operations that failed after exhausting retries.
    pub failures: Vec<OperationResult>,
}

/// Clears the running flag when a run exits, on every path.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Synchronization engine: resolve, fetch, diff, apply, record.
pub struct SyncEngine {
    api: Arc<dyn CatalogApi>,
    sink: Arc<dyn AuditSink>,
    config: SyncConfig,
    running: AtomicBool,
    cancelled: Arc<AtomicBool>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(api: Arc<dyn CatalogApi>, sink: Arc<dyn AuditSink>, config: SyncConfig) -> Self {
        Self {
            api,
            sink,
            config,
            running: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop issuing new operations for the in-flight run; operations
    /// already started complete normally.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Execute one synchronization run against the given directory model.
    ///
    /// Structural model errors abort before any write. Per-entity problems
    /// (role conflicts, unreachable organizations, failed operations) are
    /// reported in the returned [`RunSummary`] while the rest of the run
    /// proceeds.
    pub async fn run(&self, model: &DirectoryModel) -> SyncResult<RunSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);
        self.cancelled.store(false, Ordering::Relaxed);

        let run_id = RunId::new();
        let started_at = Utc::now();
        let deadline = self
            .config
            .run_deadline_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        info!(
            run_id = %run_id,
            orgs = self.config.org_map.len(),
            "Starting synchronization run"
        );

        // Structural problems make desired state untrustworthy; nothing
        // has been written yet at this point.
        model.validate()?;
        let resolver = RoleResolver::new(model, &self.config.precedence, &self.config.org_map);
        let resolution = resolver.resolve_all()?;

        let orgs: BTreeSet<OrgId> = self.config.org_map.values().cloned().collect();
        let limiter = Arc::new(RateLimiter::per_minute(self.config.requests_per_minute));
        let retry = self.config.retry.policy();

        let fetcher = StateFetcher::new(
            self.api.clone(),
            retry.clone(),
            limiter.clone(),
            self.config.concurrency,
        );
        let observed = fetcher.fetch_observed(&orgs).await;
        let unreachable = observed.unreachable_orgs();

        let operations = diff(&resolution.assignments, &observed.assignments, &unreachable);
        info!(
            run_id = %run_id,
            operations = operations.len(),
            conflicts = resolution.conflicts.len(),
            unreachable_orgs = unreachable.len(),
            "Computed diff"
        );

        let executor = SyncExecutor::new(
            self.api.clone(),
            retry,
            limiter,
            self.config.concurrency,
            self.cancelled.clone(),
        );
        let results = executor.apply(operations.clone(), deadline).await;

        let counts = count_outcomes(&results);
        let record = RunRecord {
            run_id,
            started_at,
            completed_at: Utc::now(),
            assignments: resolution.assignments,
            conflicts: resolution.conflicts.clone(),
            unmapped_clients: resolution.unmapped_clients.iter().copied().collect(),
            fetch_errors: observed.fetch_errors.clone(),
            operations,
            results: results.clone(),
            counts,
        };
        if let Err(e) = self.sink.record(&record).await {
            // Audit failures never undo a completed run; surface and move on.
            warn!(run_id = %run_id, error = %e, "Failed to record audit entry");
        }

        let summary = RunSummary {
            run_id,
            granted: counts.granted,
            updated: counts.updated,
            revoked: counts.revoked,
            skipped: counts.skipped,
            failed: counts.failed,
            conflicts: resolution.conflicts,
            fetch_errors: observed.fetch_errors,
            failures: results
                .into_iter()
                .filter(OperationResult::is_failed)
                .collect(),
        };

        info!(
            run_id = %run_id,
            granted = summary.granted,
            updated = summary.updated,
            revoked = summary.revoked,
            skipped = summary.skipped,
            failed = summary.failed,
            "Synchronization run completed"
        );

        Ok(summary)
    }
}

fn count_outcomes(results: &[OperationResult]) -> RunCounts {
    let mut counts = RunCounts::default();
    for result in results {
        if result.is_skipped() {
            counts.skipped += 1;
        } else if result.is_failed() {
            counts.failed += 1;
        } else {
            match result.operation {
                Operation::Grant { .. } => counts.granted += 1,
                Operation::UpdateRole { .. } => counts.updated += 1,
                Operation::Revoke { .. } => counts.revoked += 1,
            }
        }
    }
    counts
}
