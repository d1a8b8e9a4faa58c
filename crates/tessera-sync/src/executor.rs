//! Operation execution against the catalog.
//!
//! Applies a diff with bounded concurrency, per-operation retry, rate
//! limiting, a run deadline, and cooperative cancellation. Operations are
//! bulkheaded: one failure never aborts the rest. The grant/update phase
//! runs before the revoke phase, preserving the diff's bias toward
//! transient over-access during a partial run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use tessera_catalog_client::{CatalogApi, CatalogError, RetryPolicy};

use crate::diff::Operation;
use crate::rate_limiter::RateLimiter;

/// Why an operation was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The run deadline passed before the operation started.
    DeadlineExceeded,
    /// The run was cancelled before the operation started.
    Cancelled,
}

/// Terminal state of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// The catalog accepted the write.
    Applied,
    /// The write failed after exhausting retries, or permanently.
    Failed {
        error_code: String,
        message: String,
        attempts: u32,
    },
    /// The operation was never issued.
    Skipped { reason: SkipReason },
}

/// Result record for one operation, consumed by the audit sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub operation: Operation,
    pub outcome: OperationOutcome,
    pub completed_at: DateTime<Utc>,
}

impl OperationResult {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Applied)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Failed { .. })
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Skipped { .. })
    }
}

/// Applies diff operations to the catalog.
///
/// Concurrency safety rests on the diff invariant that each
/// (user, organization) pair appears in at most one operation; operations
/// touching different pairs are independent and run in parallel up to the
/// configured width.
pub struct SyncExecutor {
    api: Arc<dyn CatalogApi>,
    retry: RetryPolicy,
    limiter: Arc<RateLimiter>,
    concurrency: usize,
    cancelled: Arc<AtomicBool>,
}

impl SyncExecutor {
    #[must_use]
    pub fn new(
        api: Arc<dyn CatalogApi>,
        retry: RetryPolicy,
        limiter: Arc<RateLimiter>,
        concurrency: usize,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            api,
            retry,
            limiter,
            concurrency: concurrency.max(1),
            cancelled,
        }
    }

    /// Request that no further operations be issued.
    ///
    /// In-flight operations complete normally so no (user, organization)
    /// pair is left half-applied.
    pub fn cancel(&self) {
        info!("Cancellation requested, no new operations will be issued");
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Apply all operations, grants and updates first, revokes last.
    ///
    /// Always returns one result per input operation, in the input order.
    pub async fn apply(
        &self,
        operations: Vec<Operation>,
        deadline: Option<Instant>,
    ) -> Vec<OperationResult> {
        let (revokes, grants_and_updates): (Vec<Operation>, Vec<Operation>) =
            operations.into_iter().partition(Operation::is_revoke);

        let mut results = self.apply_phase(grants_and_updates, deadline).await;
        results.extend(self.apply_phase(revokes, deadline).await);
        results
    }

    async fn apply_phase(
        &self,
        operations: Vec<Operation>,
        deadline: Option<Instant>,
    ) -> Vec<OperationResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<(usize, OperationResult)> = JoinSet::new();

        for (index, operation) in operations.into_iter().enumerate() {
            let api = self.api.clone();
            let retry = self.retry.clone();
            let limiter = self.limiter.clone();
            let semaphore = semaphore.clone();
            let cancelled = self.cancelled.clone();

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            skipped(operation, SkipReason::Cancelled),
                        )
                    }
                };

                // An operation "starts" once it holds a worker slot; the
                // deadline and the cancellation flag are checked here, so
                // anything already past this point runs to completion.
                if cancelled.load(Ordering::Relaxed) {
                    return (index, skipped(operation, SkipReason::Cancelled));
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return (index, skipped(operation, SkipReason::DeadlineExceeded));
                }

                limiter.acquire().await;
                let result = execute_operation(api.as_ref(), &retry, operation).await;
                (index, result)
            });
        }

        let mut indexed: Vec<(usize, OperationResult)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => {
                    error!(error = %e, "Operation task failed");
                }
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

fn skipped(operation: Operation, reason: SkipReason) -> OperationResult {
    debug!(operation = %operation, reason = ?reason, "Operation skipped");
    OperationResult {
        operation,
        outcome: OperationOutcome::Skipped { reason },
        completed_at: Utc::now(),
    }
}

/// Execute one operation with retry and map the outcome.
async fn execute_operation(
    api: &dyn CatalogApi,
    retry: &RetryPolicy,
    operation: Operation,
) -> OperationResult {
    let call = match &operation {
        Operation::Grant {
            user,
            org,
            capacity,
        } => {
            let (user, org, capacity) = (*user, org.clone(), capacity.clone());
            retry
                .execute("add_member", || {
                    let org = org.clone();
                    let capacity = capacity.clone();
                    async move { api.add_member(&org, user, &capacity).await.map(|_| ()) }
                })
                .await
        }
        Operation::UpdateRole {
            user,
            org,
            new_capacity,
            ..
        } => {
            let (user, org, capacity) = (*user, org.clone(), new_capacity.clone());
            retry
                .execute("update_member", || {
                    let org = org.clone();
                    let capacity = capacity.clone();
                    async move { api.update_member(&org, user, &capacity).await.map(|_| ()) }
                })
                .await
        }
        Operation::Revoke { user, org, .. } => {
            let (user, org) = (*user, org.clone());
            let result = retry
                .execute("remove_member", || {
                    let org = org.clone();
                    async move { api.remove_member(&org, user).await }
                })
                .await;
            // A member already absent from the catalog is the desired end
            // state of a revoke.
            match result {
                Err(CatalogError::NotFound { .. }) => Ok(()),
                other => other,
            }
        }
    };

    let outcome = match call {
        Ok(()) => {
            debug!(operation = %operation, "Operation applied");
            OperationOutcome::Applied
        }
        Err(error) => {
            warn!(operation = %operation, error = %error, "Operation failed");
            let attempts = match &error {
                CatalogError::MaxRetriesExceeded { attempts, .. } => *attempts,
                _ => 1,
            };
            OperationOutcome::Failed {
                error_code: error.error_code().to_string(),
                message: error.to_string(),
                attempts,
            }
        }
    };

    OperationResult {
        operation,
        outcome,
        completed_at: Utc::now(),
    }
}
