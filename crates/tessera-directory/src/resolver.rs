//! Effective-role resolution.
//!
//! Walks each user's direct memberships up their ancestor chains, unions
//! the directly-assigned roles found along the way (downward-only
//! inheritance), maps clients to catalog organizations, and collapses each
//! per-organization role set to a single capacity via the configured
//! precedence. The full role set is kept on every assignment so an audit
//! record can answer where a capacity came from.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use tessera_core::{ClientId, OrgId, Role, UserId};

use crate::error::DirectoryResult;
use crate::model::DirectoryModel;
use crate::precedence::RolePrecedence;

/// Desired state for one (user, organization) pair.
///
/// `capacity` is the collapsed value the catalog will hold; `roles` is the
/// full effective set it was collapsed from, retained for auditing.
/// Derived data, recomputed on every run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveAssignment {
    pub user: UserId,
    pub org: OrgId,
    pub capacity: Role,
    pub roles: BTreeSet<Role>,
}

/// Two effective roles with no declared order for the same (user, org).
///
/// The assignment is skipped and reported; the engine never guesses a
/// winner the configuration did not declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleConflict {
    pub user: UserId,
    pub org: OrgId,
    pub first: Role,
    pub second: Role,
}

/// Output of a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved assignments, ordered by (user, org).
    pub assignments: Vec<EffectiveAssignment>,
    /// Incomparable-role conflicts, one per affected (user, org).
    pub conflicts: Vec<RoleConflict>,
    /// Clients encountered through memberships but absent from the
    /// organization mapping; their memberships were skipped.
    pub unmapped_clients: BTreeSet<ClientId>,
}

impl Resolution {
    fn merge(&mut self, other: Resolution) {
        self.assignments.extend(other.assignments);
        self.conflicts.extend(other.conflicts);
        self.unmapped_clients.extend(other.unmapped_clients);
    }
}

/// Resolves effective catalog assignments from the directory model.
///
/// Resolution is pure and deterministic: identical model, precedence and
/// mapping always produce an identical [`Resolution`].
pub struct RoleResolver<'a> {
    model: &'a DirectoryModel,
    precedence: &'a RolePrecedence,
    org_map: &'a HashMap<ClientId, OrgId>,
}

impl<'a> RoleResolver<'a> {
    #[must_use]
    pub fn new(
        model: &'a DirectoryModel,
        precedence: &'a RolePrecedence,
        org_map: &'a HashMap<ClientId, OrgId>,
    ) -> Self {
        Self {
            model,
            precedence,
            org_map,
        }
    }

    /// Resolve every user known to the model.
    pub fn resolve_all(&self) -> DirectoryResult<Resolution> {
        let mut resolution = Resolution::default();
        for user in self.model.users() {
            resolution.merge(self.resolve_user(user)?);
        }
        Ok(resolution)
    }

    /// Resolve one user's effective assignments.
    ///
    /// Errors only on structural problems in the model; per-assignment
    /// conflicts are data in the returned [`Resolution`].
    pub fn resolve_user(&self, user: UserId) -> DirectoryResult<Resolution> {
        let mut role_sets: BTreeMap<OrgId, BTreeSet<Role>> = BTreeMap::new();
        let mut unmapped_clients = BTreeSet::new();

        for group in self.model.user_memberships(&user) {
            let Some(org) = self.org_map.get(&group.client_id) else {
                tracing::warn!(
                    user_id = %user,
                    group_id = %group.id,
                    client_id = %group.client_id,
                    "Skipping membership: client has no organization mapping"
                );
                unmapped_clients.insert(group.client_id);
                continue;
            };

            // Union every role directly assigned on the path from the
            // membership group up to the client root. Roles on descendant
            // subgroups are never visited, so they cannot leak upward.
            let chain = self.model.ancestor_chain(&group.id)?;
            let target = role_sets.entry(org.clone()).or_default();
            for ancestor in chain {
                target.extend(ancestor.roles.iter().cloned());
            }
        }

        let mut resolution = Resolution {
            unmapped_clients,
            ..Resolution::default()
        };

        for (org, roles) in role_sets {
            if roles.is_empty() {
                // Membership without any role on the chain grants nothing.
                continue;
            }
            match self.precedence.collapse(&roles) {
                Ok(Some(capacity)) => {
                    resolution.assignments.push(EffectiveAssignment {
                        user,
                        org,
                        capacity,
                        roles,
                    });
                }
                Ok(None) => {}
                Err(pair) => {
                    tracing::warn!(
                        user_id = %user,
                        org = %org,
                        first = %pair.first,
                        second = %pair.second,
                        "Role conflict: no precedence between effective roles"
                    );
                    resolution.conflicts.push(RoleConflict {
                        user,
                        org,
                        first: pair.first,
                        second: pair.second,
                    });
                }
            }
        }

        Ok(resolution)
    }
}
