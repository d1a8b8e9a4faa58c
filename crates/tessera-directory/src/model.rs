//! Arena-stored directory hierarchy.
//!
//! Groups are kept in an id-indexed arena with parent links as optional
//! ids, so the forest has no pointer cycles or lifetime entanglement by
//! construction. Builder operations reject malformed input up front;
//! [`DirectoryModel::validate`] re-walks the whole structure before a sync
//! run so a model that was mutated into a bad state is caught before any
//! write happens.

use std::collections::{BTreeSet, HashMap, HashSet};

use tessera_core::{ClientId, GroupId, Role, UserId};

use crate::error::{DirectoryError, DirectoryResult};

/// An isolated access context owning a tree of groups.
///
/// Clients are provisioned externally; the engine only reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub display_name: String,
}

/// A named node in a per-client group tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub client_id: ClientId,
    pub name: String,
    /// `None` for a top-level group directly under the client.
    pub parent: Option<GroupId>,
    /// Child groups in insertion order.
    pub children: Vec<GroupId>,
    /// Roles directly assigned to this group.
    pub roles: BTreeSet<Role>,
}

/// In-memory directory: clients, their group forests, and direct user
/// memberships. Pure data, no I/O.
#[derive(Debug, Clone, Default)]
pub struct DirectoryModel {
    clients: HashMap<ClientId, Client>,
    groups: HashMap<GroupId, Group>,
    memberships: HashMap<UserId, BTreeSet<GroupId>>,
}

impl DirectoryModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client.
    pub fn add_client(
        &mut self,
        id: ClientId,
        display_name: impl Into<String>,
    ) -> DirectoryResult<()> {
        if self.clients.contains_key(&id) {
            return Err(DirectoryError::invalid(format!(
                "client {id} already exists"
            )));
        }
        self.clients.insert(
            id,
            Client {
                id,
                display_name: display_name.into(),
            },
        );
        Ok(())
    }

    /// Add a group under a client, optionally as a subgroup of `parent`.
    ///
    /// The parent must already exist and belong to the same client; a
    /// group is never re-parented, so the tree stays acyclic as long as
    /// every insertion goes through here.
    pub fn add_group(
        &mut self,
        id: GroupId,
        name: impl Into<String>,
        client_id: ClientId,
        parent: Option<GroupId>,
    ) -> DirectoryResult<()> {
        if self.groups.contains_key(&id) {
            return Err(DirectoryError::invalid(format!("group {id} already exists")));
        }
        if !self.clients.contains_key(&client_id) {
            return Err(DirectoryError::invalid(format!(
                "group {id} references unknown client {client_id}"
            )));
        }
        if let Some(parent_id) = parent {
            if parent_id == id {
                return Err(DirectoryError::CycleDetected { group_id: id });
            }
            let parent_group = self.groups.get(&parent_id).ok_or_else(|| {
                DirectoryError::invalid(format!(
                    "group {id} references unknown parent {parent_id}"
                ))
            })?;
            if parent_group.client_id != client_id {
                return Err(DirectoryError::invalid(format!(
                    "group {id} belongs to client {client_id} but its parent {parent_id} \
                     belongs to client {}",
                    parent_group.client_id
                )));
            }
        }

        self.groups.insert(
            id,
            Group {
                id,
                client_id,
                name: name.into(),
                parent,
                children: Vec::new(),
                roles: BTreeSet::new(),
            },
        );
        if let Some(parent_id) = parent {
            if let Some(parent_group) = self.groups.get_mut(&parent_id) {
                parent_group.children.push(id);
            }
        }
        Ok(())
    }

    /// Record a user's direct membership in a group.
    ///
    /// A user may be a direct member of many groups, including groups of
    /// different clients.
    pub fn add_user_membership(&mut self, user_id: UserId, group_id: GroupId) -> DirectoryResult<()> {
        if !self.groups.contains_key(&group_id) {
            return Err(DirectoryError::invalid(format!(
                "membership of user {user_id} references unknown group {group_id}"
            )));
        }
        self.memberships.entry(user_id).or_default().insert(group_id);
        Ok(())
    }

    /// Assign a role directly to a group.
    pub fn assign_role(&mut self, group_id: GroupId, role: Role) -> DirectoryResult<()> {
        let group = self.groups.get_mut(&group_id).ok_or_else(|| {
            DirectoryError::invalid(format!("role assignment references unknown group {group_id}"))
        })?;
        group.roles.insert(role);
        Ok(())
    }

    /// Look up a group by id.
    #[must_use]
    pub fn group(&self, id: &GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    /// Look up a client by id.
    #[must_use]
    pub fn client(&self, id: &ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    /// All known clients, in id order.
    #[must_use]
    pub fn clients(&self) -> Vec<&Client> {
        let mut clients: Vec<&Client> = self.clients.values().collect();
        clients.sort_by_key(|c| c.id);
        clients
    }

    /// All users with at least one membership, in id order.
    #[must_use]
    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.memberships.keys().copied().collect();
        users.sort();
        users
    }

    /// The groups a user is a direct member of, in group-id order.
    #[must_use]
    pub fn user_memberships(&self, user_id: &UserId) -> Vec<&Group> {
        self.memberships
            .get(user_id)
            .map(|group_ids| {
                group_ids
                    .iter()
                    .filter_map(|gid| self.groups.get(gid))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The ordered chain from a group up to its client root, inclusive.
    ///
    /// The walk carries a visited set so a corrupted parent link fails with
    /// [`DirectoryError::CycleDetected`] instead of looping.
    pub fn ancestor_chain(&self, group_id: &GroupId) -> DirectoryResult<Vec<&Group>> {
        let origin = self.groups.get(group_id).ok_or_else(|| {
            DirectoryError::invalid(format!("ancestor walk references unknown group {group_id}"))
        })?;

        let mut chain = Vec::new();
        let mut visited: HashSet<GroupId> = HashSet::new();
        let mut current = Some(*group_id);

        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(DirectoryError::CycleDetected { group_id: id });
            }
            let group = self.groups.get(&id).ok_or_else(|| {
                DirectoryError::invalid(format!("ancestor walk references unknown group {id}"))
            })?;
            if group.client_id != origin.client_id {
                return Err(DirectoryError::invalid(format!(
                    "group {group_id} has ancestor {id} in a different client"
                )));
            }
            chain.push(group);
            current = group.parent;
        }

        Ok(chain)
    }

    /// Full structural check: every group's ancestor chain resolves to a
    /// known client without cycles or client mismatches.
    ///
    /// Run before resolution; failure aborts the run before any write.
    pub fn validate(&self) -> DirectoryResult<()> {
        let mut group_ids: Vec<&GroupId> = self.groups.keys().collect();
        group_ids.sort();
        for group_id in group_ids {
            let chain = self.ancestor_chain(group_id)?;
            // The last element of the chain is the root; it must be
            // top-level and its client must exist.
            if let Some(root) = chain.last() {
                if root.parent.is_some() {
                    return Err(DirectoryError::invalid(format!(
                        "ancestor walk from {group_id} did not terminate at a root"
                    )));
                }
                if !self.clients.contains_key(&root.client_id) {
                    return Err(DirectoryError::invalid(format!(
                        "group {} references unknown client {}",
                        root.id, root.client_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of groups in the model.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
