//! Strongly Typed Identifiers
//!
//! Type-safe identifier types for tessera. Using the newtype pattern, these
//! types prevent accidental misuse of different ID types at compile time:
//! a `GroupId` cannot be passed where a `ClientId` is expected, even though
//! both wrap a UUID.
//!
//! Directory-side entities (clients, groups, users, runs) carry UUID
//! identifiers. Catalog-side names (`OrgId`, `Role`) are opaque strings
//! owned by the target system and are wrapped without interpretation.
//!
//! # Example
//!
//! ```
//! use tessera_core::{ClientId, UserId};
//!
//! let client = ClientId::new();
//! let user = UserId::new();
//!
//! fn requires_client(id: ClientId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_client(client);
//! // requires_client(user); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed UUID identifier
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

/// Macro to define a strongly-typed string name
macro_rules! define_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a string value without interpretation.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the wrapped string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Strongly typed identifier for directory clients.
    ///
    /// A client is an isolated access context in the identity directory,
    /// owning a tree of groups. Each client maps to exactly one catalog
    /// organization.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera_core::ClientId;
    /// use uuid::Uuid;
    ///
    /// let client_id = ClientId::new();
    ///
    /// let uuid = Uuid::new_v4();
    /// let client_id = ClientId::from_uuid(uuid);
    /// assert_eq!(client_id.as_uuid(), &uuid);
    ///
    /// let client_id: ClientId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
    /// ```
    ClientId
);

define_id!(
    /// Strongly typed identifier for directory groups.
    ///
    /// Groups form a per-client tree; subgroups are groups with a parent.
    GroupId
);

define_id!(
    /// Strongly typed identifier for directory users.
    ///
    /// The catalog is assumed to key its members by the same identifier,
    /// serialized as the UUID string.
    UserId
);

define_id!(
    /// Strongly typed identifier for synchronization runs.
    ///
    /// Every run gets a fresh `RunId`; audit records are keyed by it.
    RunId
);

define_name!(
    /// Name of a catalog organization, the flat resource the engine writes
    /// memberships into. Owned by the catalog; treated as opaque here.
    OrgId
);

define_name!(
    /// An opaque role understood by the catalog as a membership capacity
    /// value (for example "admin", "editor" or "member").
    ///
    /// `Role` derives lexicographic `Ord` so it can live in ordered
    /// collections; precedence between roles is a separate, explicitly
    /// configured relation and never follows from this ordering.
    Role
);
