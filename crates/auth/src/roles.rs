//! Role catalog and default grants.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use shor_core::DomainError;

use crate::permissions::{
    class_bookings, classes, gig_applications, gigs, studio_bookings, studios, users,
    ActionDefinition, Permission,
};

/// Role identifier used for RBAC.
///
/// Roles are opaque names at this layer; their action grants live in the
/// catalog tables and are resolved by [`crate::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const STUDENT: Role = Role::from_static("student");
    pub const ARTIST: Role = Role::from_static("artist");
    pub const STUDIO_OWNER: Role = Role::from_static("studio_owner");
    pub const ADMIN: Role = Role::from_static("admin");

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

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role selector accepted at registration.
///
/// Only these three roles are self-service; `admin` is granted administratively.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationRole {
    #[default]
    Student,
    Artist,
    StudioOwner,
}

impl RegistrationRole {
    pub const ALL: [RegistrationRole; 3] = [
        RegistrationRole::Student,
        RegistrationRole::Artist,
        RegistrationRole::StudioOwner,
    ];

    pub fn role(&self) -> Role {
        match self {
            RegistrationRole::Student => Role::STUDENT,
            RegistrationRole::Artist => Role::ARTIST,
            RegistrationRole::StudioOwner => Role::STUDIO_OWNER,
        }
    }
}

impl core::str::FromStr for RegistrationRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(RegistrationRole::Student),
            "artist" => Ok(RegistrationRole::Artist),
            "studio_owner" => Ok(RegistrationRole::StudioOwner),
            other => Err(DomainError::validation(format!(
                "role must be one of student, artist, studio_owner (got '{other}')"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Default grants
// ─────────────────────────────────────────────────────────────────────────────

/// What a catalog role is granted when the catalog is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultGrants {
    /// One role→action row per listed permission.
    Explicit(&'static [Permission]),
    /// Every action in the catalog being seeded, written as one row each.
    /// Actions added after seeding are not picked up.
    AllActions,
}

impl DefaultGrants {
    /// The concrete permission list against a given action catalog.
    pub fn expand(&self, catalog: &[ActionDefinition]) -> Vec<Permission> {
        match self {
            DefaultGrants::Explicit(list) => list.to_vec(),
            DefaultGrants::AllActions => catalog.iter().map(|a| a.name.clone()).collect(),
        }
    }
}

/// Static definition of one catalog role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    pub name: Role,
    pub description: &'static str,
    pub grants: DefaultGrants,
}

const STUDENT_GRANTS: &[Permission] = &[
    classes::READ,
    class_bookings::CREATE,
    class_bookings::READ,
    class_bookings::UPDATE,
    class_bookings::DELETE,
    studios::READ,
    studio_bookings::CREATE,
    studio_bookings::READ,
    studio_bookings::UPDATE,
    studio_bookings::DELETE,
    gigs::READ,
    gig_applications::CREATE,
    gig_applications::READ,
    gig_applications::UPDATE,
    gig_applications::DELETE,
    users::READ,
    users::UPDATE,
];

const ARTIST_GRANTS: &[Permission] = &[
    classes::CREATE,
    classes::READ,
    classes::UPDATE,
    classes::DELETE,
    class_bookings::CREATE,
    class_bookings::READ,
    class_bookings::UPDATE,
    class_bookings::DELETE,
    studios::READ,
    studio_bookings::CREATE,
    studio_bookings::READ,
    studio_bookings::UPDATE,
    studio_bookings::DELETE,
    gigs::CREATE,
    gigs::READ,
    gigs::UPDATE,
    gigs::DELETE,
    gig_applications::CREATE,
    gig_applications::READ,
    gig_applications::UPDATE,
    gig_applications::DELETE,
    users::READ,
    users::UPDATE,
];

const STUDIO_OWNER_GRANTS: &[Permission] = &[
    classes::READ,
    class_bookings::CREATE,
    class_bookings::READ,
    class_bookings::UPDATE,
    class_bookings::DELETE,
    studios::CREATE,
    studios::READ,
    studios::UPDATE,
    studios::DELETE,
    studio_bookings::CREATE,
    studio_bookings::READ,
    studio_bookings::UPDATE,
    studio_bookings::DELETE,
    gigs::READ,
    gig_applications::CREATE,
    gig_applications::READ,
    gig_applications::UPDATE,
    gig_applications::DELETE,
    users::READ,
    users::UPDATE,
];

/// The built-in role catalog.
pub const ROLE_CATALOG: &[RoleDefinition] = &[
    RoleDefinition {
        name: Role::STUDENT,
        description: "Dance students who can book classes and studios",
        grants: DefaultGrants::Explicit(STUDENT_GRANTS),
    },
    RoleDefinition {
        name: Role::ARTIST,
        description: "Dance artists who can teach classes and apply for gigs",
        grants: DefaultGrants::Explicit(ARTIST_GRANTS),
    },
    RoleDefinition {
        name: Role::STUDIO_OWNER,
        description: "Studio owners who can rent out their spaces",
        grants: DefaultGrants::Explicit(STUDIO_OWNER_GRANTS),
    },
    RoleDefinition {
        name: Role::ADMIN,
        description: "System administrators with full access",
        grants: DefaultGrants::AllActions,
    },
];

pub fn find_role(name: &str) -> Option<&'static RoleDefinition> {
    ROLE_CATALOG.iter().find(|r| r.name.as_str() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn explicit(role: &str) -> HashSet<&'static str> {
        match find_role(role).map(|r| r.grants) {
            Some(DefaultGrants::Explicit(list)) => list.iter().map(|p| p.as_str()).collect(),
            other => panic!("expected explicit grants for {role}, got {other:?}"),
        }
    }

    #[test]
    fn artist_and_studio_owner_extend_student() {
        let student = explicit("student");
        assert!(student.is_subset(&explicit("artist")));
        assert!(student.is_subset(&explicit("studio_owner")));
        assert!(explicit("artist").contains("create_class"));
        assert!(!explicit("studio_owner").contains("create_class"));
        assert!(explicit("studio_owner").contains("update_studio"));
    }

    #[test]
    fn default_lists_have_no_duplicates() {
        for def in ROLE_CATALOG {
            if let DefaultGrants::Explicit(list) = def.grants {
                let unique: HashSet<_> = list.iter().collect();
                assert_eq!(unique.len(), list.len(), "{}", def.name);
            }
        }
    }

    #[test]
    fn only_admin_is_wildcard() {
        let wildcard: Vec<_> = ROLE_CATALOG
            .iter()
            .filter(|r| r.grants == DefaultGrants::AllActions)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(wildcard, vec!["admin"]);
    }

    #[test]
    fn admin_expands_to_the_whole_catalog() {
        use crate::permissions::ACTION_CATALOG;
        let admin = find_role("admin").unwrap();
        let expanded = admin.grants.expand(ACTION_CATALOG);
        assert_eq!(expanded.len(), ACTION_CATALOG.len());
        let student = find_role("student").unwrap().grants.expand(ACTION_CATALOG);
        assert_eq!(student.len(), 17);
    }

    #[test]
    fn registration_role_defaults_to_student_and_rejects_admin() {
        assert_eq!(RegistrationRole::default(), RegistrationRole::Student);
        assert!("admin".parse::<RegistrationRole>().is_err());
        let parsed: RegistrationRole = serde_json::from_str("\"studio_owner\"").unwrap();
        assert_eq!(parsed.role(), Role::STUDIO_OWNER);
    }
}
