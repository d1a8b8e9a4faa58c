//! # Directory Model and Role Resolution
//!
//! In-memory representation of the identity directory (clients, groups,
//! subgroups, users, role assignments) and the pure computation that turns
//! it into desired catalog state.
//!
//! ## Key components
//!
//! - [`DirectoryModel`] - arena-stored rooted forest of groups per client,
//!   with builder operations and structural validation
//! - [`RolePrecedence`] - explicit partial order over roles, built from
//!   configured chains; incomparable pairs are a first-class outcome
//! - [`RoleResolver`] - computes effective assignments per user with
//!   downward-only inheritance and a named precedence-collapse step
//!
//! ## Inheritance rule
//!
//! A user's effective role set for an organization is the union of roles
//! directly assigned to every group on the path from each of the user's
//! membership groups up to the client root. Roles assigned to descendant
//! subgroups never propagate upward.
//!
//! Resolution is pure: identical model, precedence and mapping input always
//! produce identical output, which is what makes re-running a sync
//! idempotent.

pub mod error;
pub mod model;
pub mod precedence;
pub mod resolver;

// Re-exports for convenience
pub use error::{DirectoryError, DirectoryResult};
pub use model::{Client, DirectoryModel, Group};
pub use precedence::{IncomparableRoles, RolePrecedence};
pub use resolver::{EffectiveAssignment, Resolution, RoleConflict, RoleResolver};
