//! The membership API surface the sync engine consumes.

use async_trait::async_trait;

use tessera_core::{OrgId, Role, UserId};

use crate::error::CatalogResult;
use crate::types::Membership;

/// Read/write access to an organization's membership list.
///
/// Implemented by [`crate::CatalogClient`] for the real catalog and by
/// in-memory fakes in tests. Every call addresses one organization and at
/// most one member; calls are assumed idempotent when retried with
/// identical parameters.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Current members of an organization.
    async fn list_members(&self, org: &OrgId) -> CatalogResult<Vec<Membership>>;

    /// Add a member with the given capacity.
    async fn add_member(
        &self,
        org: &OrgId,
        user: UserId,
        capacity: &Role,
    ) -> CatalogResult<Membership>;

    /// Change an existing member's capacity.
    async fn update_member(
        &self,
        org: &OrgId,
        user: UserId,
        capacity: &Role,
    ) -> CatalogResult<Membership>;

    /// Remove a member.
    async fn remove_member(&self, org: &OrgId, user: UserId) -> CatalogResult<()>;
}
