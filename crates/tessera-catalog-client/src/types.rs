//! Wire types for the catalog membership API.

use serde::{Deserialize, Serialize};

use tessera_core::{Role, UserId};

/// One member row of an organization as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// The member's user identifier (shared with the directory).
    pub user: UserId,
    /// The single capacity value the catalog holds for this member.
    pub capacity: Role,
}

/// Response shape of a member listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberList {
    pub members: Vec<Membership>,
}
