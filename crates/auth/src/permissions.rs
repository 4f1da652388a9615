//! Permission vocabulary and the built-in action catalog.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use shor_core::DomainError;

/// Permission identifier.
///
/// Permissions are opaque `<operation>_<entity>` strings (e.g. "create_class")
/// and are the atomic unit of authorization. They are globally unique across
/// the action catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

/// CRUD-style operation an action performs on its table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Manage,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Manage => "manage",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Operation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "read" => Ok(Operation::Read),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "manage" => Ok(Operation::Manage),
            other => Err(DomainError::validation(format!("unknown operation '{other}'"))),
        }
    }
}

/// Category names used to group actions (free-form; new ones need no schema change).
pub mod categories {
    pub const CLASSES: &str = "classes";
    pub const CLASS_BOOKINGS: &str = "class_bookings";
    pub const STUDIOS: &str = "studios";
    pub const STUDIO_BOOKINGS: &str = "studio_bookings";
    pub const GIGS: &str = "gigs";
    pub const GIG_APPLICATIONS: &str = "gig_applications";
    pub const USERS: &str = "users";
    pub const SYSTEM: &str = "system";
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission constants
// ─────────────────────────────────────────────────────────────────────────────

pub mod classes {
    use super::Permission;
    pub const CREATE: Permission = Permission::from_static("create_class");
    pub const READ: Permission = Permission::from_static("read_class");
    pub const UPDATE: Permission = Permission::from_static("update_class");
    pub const DELETE: Permission = Permission::from_static("delete_class");
}

pub mod class_bookings {
    use super::Permission;
    pub const CREATE: Permission = Permission::from_static("create_class_booking");
    pub const READ: Permission = Permission::from_static("read_class_booking");
    pub const UPDATE: Permission = Permission::from_static("update_class_booking");
    pub const DELETE: Permission = Permission::from_static("delete_class_booking");
}

pub mod studios {
    use super::Permission;
    pub const CREATE: Permission = Permission::from_static("create_studio");
    pub const READ: Permission = Permission::from_static("read_studio");
    pub const UPDATE: Permission = Permission::from_static("update_studio");
    pub const DELETE: Permission = Permission::from_static("delete_studio");
}

pub mod studio_bookings {
    use super::Permission;
    pub const CREATE: Permission = Permission::from_static("create_studio_booking");
    pub const READ: Permission = Permission::from_static("read_studio_booking");
    pub const UPDATE: Permission = Permission::from_static("update_studio_booking");
    pub const DELETE: Permission = Permission::from_static("delete_studio_booking");
}

pub mod gigs {
    use super::Permission;
    pub const CREATE: Permission = Permission::from_static("create_gig");
    pub const READ: Permission = Permission::from_static("read_gig");
    pub const UPDATE: Permission = Permission::from_static("update_gig");
    pub const DELETE: Permission = Permission::from_static("delete_gig");
}

pub mod gig_applications {
    use super::Permission;
    pub const CREATE: Permission = Permission::from_static("create_gig_application");
    pub const READ: Permission = Permission::from_static("read_gig_application");
    pub const UPDATE: Permission = Permission::from_static("update_gig_application");
    pub const DELETE: Permission = Permission::from_static("delete_gig_application");
}

pub mod users {
    use super::Permission;
    pub const CREATE: Permission = Permission::from_static("create_user");
    pub const READ: Permission = Permission::from_static("read_user");
    pub const UPDATE: Permission = Permission::from_static("update_user");
    pub const DELETE: Permission = Permission::from_static("delete_user");
    pub const MANAGE_ROLES: Permission = Permission::from_static("manage_user_roles");
    pub const READ_ROLES: Permission = Permission::from_static("read_user_roles");
}

pub mod system {
    use super::Permission;
    pub const READ_AUDIT_LOG: Permission = Permission::from_static("read_audit_log");
    pub const MANAGE_ROLES: Permission = Permission::from_static("manage_roles");
    pub const MANAGE_PERMISSIONS: Permission = Permission::from_static("manage_permissions");
    pub const READ_ANALYTICS: Permission = Permission::from_static("read_analytics");
}

// ─────────────────────────────────────────────────────────────────────────────
// Action catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Static definition of one catalog action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDefinition {
    pub name: Permission,
    pub description: &'static str,
    pub category: &'static str,
    pub table_name: &'static str,
    pub operation: Operation,
}

const fn action(
    name: Permission,
    description: &'static str,
    category: &'static str,
    table_name: &'static str,
    operation: Operation,
) -> ActionDefinition {
    ActionDefinition {
        name,
        description,
        category,
        table_name,
        operation,
    }
}

use categories as cat;
use Operation::{Create, Delete, Manage, Read, Update};

/// The built-in action catalog inserted by the seeding routine.
pub const ACTION_CATALOG: &[ActionDefinition] = &[
    action(classes::CREATE, "Create new dance classes", cat::CLASSES, "classes", Create),
    action(classes::READ, "View class details", cat::CLASSES, "classes", Read),
    action(classes::UPDATE, "Edit class information", cat::CLASSES, "classes", Update),
    action(classes::DELETE, "Cancel or delete classes", cat::CLASSES, "classes", Delete),
    action(class_bookings::CREATE, "Book a dance class", cat::CLASS_BOOKINGS, "class_bookings", Create),
    action(class_bookings::READ, "View class bookings", cat::CLASS_BOOKINGS, "class_bookings", Read),
    action(class_bookings::UPDATE, "Modify class bookings", cat::CLASS_BOOKINGS, "class_bookings", Update),
    action(class_bookings::DELETE, "Cancel class bookings", cat::CLASS_BOOKINGS, "class_bookings", Delete),
    action(studios::CREATE, "Create studio listings", cat::STUDIOS, "studios", Create),
    action(studios::READ, "View studio details", cat::STUDIOS, "studios", Read),
    action(studios::UPDATE, "Edit studio information", cat::STUDIOS, "studios", Update),
    action(studios::DELETE, "Remove studio listings", cat::STUDIOS, "studios", Delete),
    action(studio_bookings::CREATE, "Rent studio space", cat::STUDIO_BOOKINGS, "studio_bookings", Create),
    action(studio_bookings::READ, "View studio rentals", cat::STUDIO_BOOKINGS, "studio_bookings", Read),
    action(studio_bookings::UPDATE, "Modify studio rentals", cat::STUDIO_BOOKINGS, "studio_bookings", Update),
    action(studio_bookings::DELETE, "Cancel studio rentals", cat::STUDIO_BOOKINGS, "studio_bookings", Delete),
    action(gigs::CREATE, "Create gig opportunities", cat::GIGS, "gigs", Create),
    action(gigs::READ, "View gig details", cat::GIGS, "gigs", Read),
    action(gigs::UPDATE, "Edit gig information", cat::GIGS, "gigs", Update),
    action(gigs::DELETE, "Cancel gig opportunities", cat::GIGS, "gigs", Delete),
    action(gig_applications::CREATE, "Apply for gigs", cat::GIG_APPLICATIONS, "gig_applications", Create),
    action(gig_applications::READ, "View gig applications", cat::GIG_APPLICATIONS, "gig_applications", Read),
    action(gig_applications::UPDATE, "Modify gig applications", cat::GIG_APPLICATIONS, "gig_applications", Update),
    action(gig_applications::DELETE, "Withdraw gig applications", cat::GIG_APPLICATIONS, "gig_applications", Delete),
    action(users::CREATE, "Register new users", cat::USERS, "users", Create),
    action(users::READ, "View user profiles", cat::USERS, "users", Read),
    action(users::UPDATE, "Edit user profiles", cat::USERS, "users", Update),
    action(users::DELETE, "Deactivate users", cat::USERS, "users", Delete),
    action(users::MANAGE_ROLES, "Assign and revoke user roles", cat::USERS, "user_roles", Manage),
    action(users::READ_ROLES, "View user roles", cat::USERS, "user_roles", Read),
    action(system::READ_AUDIT_LOG, "View audit logs", cat::SYSTEM, "audit_log", Read),
    action(system::MANAGE_ROLES, "Create and manage roles", cat::SYSTEM, "roles", Manage),
    action(system::MANAGE_PERMISSIONS, "Manage role permissions", cat::SYSTEM, "role_permissions", Manage),
    action(system::READ_ANALYTICS, "View platform analytics", cat::SYSTEM, "analytics", Read),
];

/// Look up a catalog action by permission name.
pub fn find_action(name: &str) -> Option<&'static ActionDefinition> {
    ACTION_CATALOG.iter().find(|a| a.name.as_str() == name)
}

/// Validate a permission name for a runtime-added action: lowercase
/// snake_case, at least one underscore (`<operation>_<entity>`).
pub fn validate_permission_name(name: &str) -> Result<(), DomainError> {
    let well_formed = !name.is_empty()
        && name.contains('_')
        && !name.starts_with('_')
        && !name.ends_with('_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if well_formed {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "permission name '{name}' must look like <operation>_<entity>"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_thirty_four_unique_actions() {
        let names: HashSet<&str> = ACTION_CATALOG.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(ACTION_CATALOG.len(), 34);
        assert_eq!(names.len(), ACTION_CATALOG.len());
    }

    #[test]
    fn catalog_names_follow_operation_entity_convention() {
        for a in ACTION_CATALOG {
            assert!(validate_permission_name(a.name.as_str()).is_ok(), "{}", a.name);
        }
    }

    #[test]
    fn operation_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Operation::Manage).unwrap(), "\"manage\"");
        assert_eq!("delete".parse::<Operation>().unwrap(), Operation::Delete);
        assert!("destroy".parse::<Operation>().is_err());
    }

    #[test]
    fn malformed_permission_names_are_rejected() {
        assert!(validate_permission_name("export_reports").is_ok());
        assert!(validate_permission_name("Export").is_err());
        assert!(validate_permission_name("export").is_err());
        assert!(validate_permission_name("_export").is_err());
        assert!(validate_permission_name("").is_err());
    }
}
