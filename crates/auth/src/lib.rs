//! `shor-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it owns the
//! permission and role catalogs, grant resolution, authorization checks and
//! the contracts of the external identity provider.

pub mod authorize;
pub mod catalog;
pub mod password;
pub mod permissions;
pub mod provider;
pub mod resolve;
pub mod roles;
pub mod session;
pub mod user;

pub use authorize::{authorize, authorize_owner, explain_authorization, AuthzError, Principal};
pub use catalog::{
    ActionRecord, CatalogError, NewAction, RoleGrant, RoleRecord, RoleSummary, SeedOutcome, SeedPlan,
};
pub use permissions::{ActionDefinition, Operation, Permission, ACTION_CATALOG};
pub use provider::{AuthError, AuthHooks, IdentityProvider, Notifier, SessionEnricher, SignedIn};
pub use resolve::{resolve_permissions, CatalogAction, HeldRole, PermissionSet};
pub use roles::{DefaultGrants, RegistrationRole, Role, RoleDefinition, ROLE_CATALOG};
pub use session::{ClientInfo, EnrichedSession, EnrichedUser, RecentActivity, Session};
pub use user::{normalize_email, ProfileUpdate, UserProfile};
