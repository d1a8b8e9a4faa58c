//! # Catalog Membership Client
//!
//! HTTP client for the data catalog's membership API: list the members of
//! an organization, and create, update or remove a member with a given
//! capacity. This is the only part of the engine that talks to the catalog
//! over the wire.
//!
//! ## Key components
//!
//! - [`CatalogApi`] - the trait the sync engine consumes; implemented by
//!   [`CatalogClient`] and by in-memory mocks in tests
//! - [`CatalogClient`] - reqwest-based implementation with per-request
//!   timeouts and status-code error mapping
//! - [`CatalogError`] - error taxonomy with a transient/permanent split
//!   driving retry decisions
//! - [`RetryPolicy`] - bounded exponential backoff around individual calls
//!
//! All write calls are assumed idempotent when retried with identical
//! parameters; the retry layer relies on that.

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod retry;
pub mod types;

// Re-exports for convenience
pub use api::CatalogApi;
pub use auth::CatalogCredentials;
pub use client::CatalogClient;
pub use error::{CatalogError, CatalogResult};
pub use retry::RetryPolicy;
pub use types::{MemberList, Membership};
