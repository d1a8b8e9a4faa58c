//! # Synchronization Engine
//!
//! Converges catalog organization memberships with the roles resolved from
//! the identity directory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌───────────────┐     ┌─────────────┐
//! │  DirectoryModel  │────►│ RoleResolver  │────►│ Diff Engine │
//! │  (pure data)     │     │ (pure)        │     │             │
//! └──────────────────┘     └───────────────┘     └──────┬──────┘
//!                                 desired               │
//! ┌──────────────────┐     ┌───────────────┐            ▼
//! │  Catalog (HTTP)  │◄───►│ StateFetcher  │     ┌─────────────┐     ┌────────────┐
//! │                  │     │ (fail-soft)   │────►│ SyncExecutor│────►│ Audit Sink │
//! └──────────────────┘     └───────────────┘     │ (bounded)   │     │            │
//!                                 observed       └─────────────┘     └────────────┘
//! ```
//!
//! ## Run lifecycle
//!
//! A [`engine::SyncEngine`] run validates the model, resolves desired
//! state, fetches observed state per organization (one unreachable
//! organization never blocks the others), diffs the two, applies the
//! resulting operations through a bounded worker pool with retry and rate
//! limiting, and records everything to the audit sink.
//!
//! ## Failure policy
//!
//! Structural errors in the directory abort the run before any write.
//! Everything else (role conflicts, fetch failures, operation failures)
//! isolates to the affected entity and is reported in the
//! [`engine::RunSummary`], favoring maximal partial progress with full
//! visibility over all-or-nothing failure.
//!
//! Revokes are always ordered after grants and capacity updates so a
//! partially applied run leaves users with at most transient over-access,
//! never transient under-access.

pub mod audit;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod rate_limiter;

// Re-exports for convenience
pub use audit::{AuditError, AuditSink, InMemoryAuditSink, RunCounts, RunRecord, TracingAuditSink};
pub use config::{RetryConfig, SyncConfig};
pub use diff::{diff, Operation};
pub use engine::{RunSummary, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use executor::{OperationOutcome, OperationResult, SkipReason, SyncExecutor};
pub use fetch::{FetchError, ObservedState, StateFetcher};
pub use rate_limiter::RateLimiter;
