//! Role precedence as an explicit partial order.
//!
//! The catalog accepts a single capacity value per membership while the
//! directory can grant a user several roles at once, so resolution needs a
//! way to pick a winner. The relation is declared in configuration as
//! ordered chains (for example `["admin", "editor", "member"]`) and kept as
//! an explicit outranks-table rather than an implicit total order, so
//! "these two roles are incomparable" is a detectable outcome instead of
//! an accidental default branch.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use tessera_core::Role;

use crate::error::{DirectoryError, DirectoryResult};

/// A pair of roles with no declared mutual order.
///
/// Surfaced by [`RolePrecedence::collapse`] when a role set has no unique
/// highest element; the resolver turns it into a reported conflict instead
/// of guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomparableRoles {
    pub first: Role,
    pub second: Role,
}

/// Partial order over roles, built from configured chains.
///
/// Each chain lists roles from highest to lowest precedence; the relation
/// is the transitive closure over every declared pair across all chains.
/// Contradictions (two roles outranking each other) are rejected at
/// construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Role>>", into = "Vec<Vec<Role>>")]
pub struct RolePrecedence {
    chains: Vec<Vec<Role>>,
    /// role -> every role it transitively outranks.
    outranks: HashMap<Role, HashSet<Role>>,
}

impl RolePrecedence {
    /// An empty relation: every pair of distinct roles is incomparable.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the relation from chains ordered highest-first.
    pub fn from_chains(chains: Vec<Vec<Role>>) -> DirectoryResult<Self> {
        let mut outranks: HashMap<Role, HashSet<Role>> = HashMap::new();

        for chain in &chains {
            for (i, higher) in chain.iter().enumerate() {
                for lower in &chain[i + 1..] {
                    if higher == lower {
                        return Err(DirectoryError::ContradictoryPrecedence {
                            first: higher.clone(),
                            second: lower.clone(),
                        });
                    }
                    outranks
                        .entry(higher.clone())
                        .or_default()
                        .insert(lower.clone());
                }
            }
        }

        // Transitive closure: iterate until no edge is added.
        let roles: Vec<Role> = outranks.keys().cloned().collect();
        loop {
            let mut added = false;
            for role in &roles {
                let below: Vec<Role> = outranks
                    .get(role)
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default();
                let mut reachable: HashSet<Role> = HashSet::new();
                for mid in &below {
                    if let Some(transitive) = outranks.get(mid) {
                        reachable.extend(transitive.iter().cloned());
                    }
                }
                let entry = outranks.entry(role.clone()).or_default();
                for r in reachable {
                    if entry.insert(r) {
                        added = true;
                    }
                }
            }
            if !added {
                break;
            }
        }

        // A contradiction is a pair present in both directions.
        for (role, below) in &outranks {
            for lower in below {
                if outranks.get(lower).is_some_and(|s| s.contains(role)) {
                    return Err(DirectoryError::ContradictoryPrecedence {
                        first: role.clone(),
                        second: lower.clone(),
                    });
                }
            }
        }

        Ok(Self { chains, outranks })
    }

    /// Whether `a` outranks `b`.
    #[must_use]
    pub fn outranks(&self, a: &Role, b: &Role) -> bool {
        self.outranks.get(a).is_some_and(|s| s.contains(b))
    }

    /// Compare two roles; `None` when they are incomparable.
    #[must_use]
    pub fn compare(&self, a: &Role, b: &Role) -> Option<Ordering> {
        if a == b {
            Some(Ordering::Equal)
        } else if self.outranks(a, b) {
            Some(Ordering::Greater)
        } else if self.outranks(b, a) {
            Some(Ordering::Less)
        } else {
            None
        }
    }

    /// Collapse a role set to the single capacity value the catalog can
    /// hold.
    ///
    /// Returns the unique highest-precedence role, `None` for an empty
    /// set, or the first incomparable pair of maximal roles when no unique
    /// winner exists. This is the only place where a role *set* becomes a
    /// single value; everything upstream keeps the full set.
    pub fn collapse(&self, roles: &BTreeSet<Role>) -> Result<Option<Role>, IncomparableRoles> {
        // Maximal elements: roles not outranked by any other in the set.
        let maximal: Vec<&Role> = roles
            .iter()
            .filter(|candidate| !roles.iter().any(|other| self.outranks(other, candidate)))
            .collect();

        match maximal.as_slice() {
            [] => Ok(None),
            [winner] => Ok(Some((*winner).clone())),
            [first, second, ..] => Err(IncomparableRoles {
                first: (*first).clone(),
                second: (*second).clone(),
            }),
        }
    }

    /// The chains this relation was declared with.
    #[must_use]
    pub fn chains(&self) -> &[Vec<Role>] {
        &self.chains
    }
}

impl TryFrom<Vec<Vec<Role>>> for RolePrecedence {
    type Error = DirectoryError;

    fn try_from(chains: Vec<Vec<Role>>) -> Result<Self, Self::Error> {
        Self::from_chains(chains)
    }
}

impl From<RolePrecedence> for Vec<Vec<Role>> {
    fn from(precedence: RolePrecedence) -> Self {
        precedence.chains
    }
}
