//! Observed-state fetching from the catalog.
//!
//! Reads the current membership list of every organization under
//! management. Fetching is fail-soft per organization: a fetch that fails
//! after retries records a [`FetchError`] and excludes that organization
//! from this run's diff, so one unreachable organization never blocks
//! synchronization of the others.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use tessera_catalog_client::{CatalogApi, CatalogError, Membership, RetryPolicy};
use tessera_core::{OrgId, Role, UserId};

use crate::rate_limiter::RateLimiter;

/// A per-organization fetch failure; the organization is excluded from the
/// current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchError {
    pub org: OrgId,
    pub error_code: String,
    pub message: String,
}

/// Membership state read from the catalog for this run.
#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    /// Current capacity per (user, organization), for every organization
    /// that was fetched successfully.
    pub assignments: BTreeMap<(UserId, OrgId), Role>,
    /// Organizations that could not be fetched.
    pub fetch_errors: Vec<FetchError>,
}

impl ObservedState {
    /// Organizations excluded from this run because their state is
    /// unknown.
    #[must_use]
    pub fn unreachable_orgs(&self) -> BTreeSet<OrgId> {
        self.fetch_errors.iter().map(|e| e.org.clone()).collect()
    }
}

/// Fetches observed membership state across organizations with bounded
/// concurrency.
pub struct StateFetcher {
    api: Arc<dyn CatalogApi>,
    retry: RetryPolicy,
    limiter: Arc<RateLimiter>,
    concurrency: usize,
}

impl StateFetcher {
    #[must_use]
    pub fn new(
        api: Arc<dyn CatalogApi>,
        retry: RetryPolicy,
        limiter: Arc<RateLimiter>,
        concurrency: usize,
    ) -> Self {
        Self {
            api,
            retry,
            limiter,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch the membership list of every given organization.
    ///
    /// Never fails as a whole: per-organization failures are collected in
    /// [`ObservedState::fetch_errors`].
    pub async fn fetch_observed(&self, orgs: &BTreeSet<OrgId>) -> ObservedState {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<(OrgId, Result<Vec<Membership>, CatalogError>)> = JoinSet::new();

        for org in orgs {
            let api = self.api.clone();
            let retry = self.retry.clone();
            let limiter = self.limiter.clone();
            let semaphore = semaphore.clone();
            let org = org.clone();

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            org,
                            Err(CatalogError::Unreachable {
                                message: "fetch pool closed".to_string(),
                            }),
                        )
                    }
                };
                limiter.acquire().await;
                debug!(org = %org, "Fetching organization members");
                let result = retry
                    .execute("list_members", || {
                        let api = api.clone();
                        let org = org.clone();
                        async move { api.list_members(&org).await }
                    })
                    .await;
                (org, result)
            });
        }

        // Collect into ordered maps so the observed state is deterministic
        // regardless of task completion order.
        let mut state = ObservedState::default();
        let mut errors: BTreeMap<OrgId, CatalogError> = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((org, Ok(members))) => {
                    debug!(org = %org, count = members.len(), "Fetched organization members");
                    for membership in members {
                        state
                            .assignments
                            .insert((membership.user, org.clone()), membership.capacity);
                    }
                }
                Ok((org, Err(e))) => {
                    warn!(org = %org, error = %e, "Failed to fetch organization, excluding from run");
                    errors.insert(org, e);
                }
                Err(e) => {
                    error!(error = %e, "Fetch task failed");
                }
            }
        }

        state.fetch_errors = errors
            .into_iter()
            .map(|(org, e)| FetchError {
                org,
                error_code: e.error_code().to_string(),
                message: e.to_string(),
            })
            .collect();
        state
    }
}
