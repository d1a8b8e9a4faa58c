//! Desired-vs-observed diffing.
//!
//! Compares the resolver's desired assignments with the fetched catalog
//! state, keyed by (user, organization), and emits the minimal operation
//! sequence that converges the two. Applying the sequence and diffing
//! again yields nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde::Serialize;
use tracing::debug;

use tessera_core::{OrgId, Role, UserId};
use tessera_directory::EffectiveAssignment;

/// A single membership write against the catalog.
///
/// The diff emits at most one operation per (user, organization) pair;
/// the executor's concurrency relies on that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create a membership that does not exist yet.
    Grant {
        user: UserId,
        org: OrgId,
        capacity: Role,
    },
    /// Change an existing membership's capacity.
    UpdateRole {
        user: UserId,
        org: OrgId,
        old_capacity: Role,
        new_capacity: Role,
    },
    /// Remove a membership no longer backed by any directory role.
    Revoke {
        user: UserId,
        org: OrgId,
        capacity: Role,
    },
}

impl Operation {
    #[must_use]
    pub fn user(&self) -> UserId {
        match self {
            Operation::Grant { user, .. }
            | Operation::UpdateRole { user, .. }
            | Operation::Revoke { user, .. } => *user,
        }
    }

    #[must_use]
    pub fn org(&self) -> &OrgId {
        match self {
            Operation::Grant { org, .. }
            | Operation::UpdateRole { org, .. }
            | Operation::Revoke { org, .. } => org,
        }
    }

    #[must_use]
    pub fn is_revoke(&self) -> bool {
        matches!(self, Operation::Revoke { .. })
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Grant {
                user,
                org,
                capacity,
            } => {
                write!(f, "grant {user} on {org} as {capacity}")
            }
            Operation::UpdateRole {
                user,
                org,
                old_capacity,
                new_capacity,
            } => {
                write!(f, "update {user} on {org}: {old_capacity} -> {new_capacity}")
            }
            Operation::Revoke {
                user,
                org,
                capacity,
            } => {
                write!(f, "revoke {user} on {org} (was {capacity})")
            }
        }
    }
}

/// Compute the operations that converge observed state onto desired state.
///
/// Both sides are keyed by (user, organization): a key present only in
/// desired becomes a grant, only in observed a revoke, present in both
/// with differing capacity an update. Desired entries for organizations in
/// `unreachable_orgs` are dropped because their observed state is unknown
/// this run.
///
/// Revokes are ordered after grants and updates. During a partially
/// applied run this leaves users with at most transient over-access rather
/// than under-access, a deliberate bias: access removal waits until the
/// additions it might depend on have been attempted.
#[must_use]
pub fn diff(
    desired: &[EffectiveAssignment],
    observed: &BTreeMap<(UserId, OrgId), Role>,
    unreachable_orgs: &BTreeSet<OrgId>,
) -> Vec<Operation> {
    let mut desired_map: BTreeMap<(UserId, OrgId), Role> = BTreeMap::new();
    let mut dropped = 0usize;
    for assignment in desired {
        if unreachable_orgs.contains(&assignment.org) {
            dropped += 1;
            continue;
        }
        desired_map.insert(
            (assignment.user, assignment.org.clone()),
            assignment.capacity.clone(),
        );
    }
    if dropped > 0 {
        debug!(
            dropped,
            "Skipped desired assignments for organizations excluded this run"
        );
    }

    let mut grants_and_updates = Vec::new();
    for ((user, org), capacity) in &desired_map {
        match observed.get(&(*user, org.clone())) {
            None => grants_and_updates.push(Operation::Grant {
                user: *user,
                org: org.clone(),
                capacity: capacity.clone(),
            }),
            Some(current) if current != capacity => {
                grants_and_updates.push(Operation::UpdateRole {
                    user: *user,
                    org: org.clone(),
                    old_capacity: current.clone(),
                    new_capacity: capacity.clone(),
                });
            }
            Some(_) => {} // already converged
        }
    }

    let mut revokes = Vec::new();
    for ((user, org), capacity) in observed {
        if unreachable_orgs.contains(org) {
            continue;
        }
        if !desired_map.contains_key(&(*user, org.clone())) {
            revokes.push(Operation::Revoke {
                user: *user,
                org: org.clone(),
                capacity: capacity.clone(),
            });
        }
    }

    grants_and_updates.extend(revokes);
    grants_and_updates
}
