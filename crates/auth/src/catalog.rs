//! Persisted catalog records and the seed plan derived from the static catalog.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shor_core::{ActionId, RoleGrantId, RoleId, UserId};

use crate::permissions::{ActionDefinition, Operation, Permission, ACTION_CATALOG};
use crate::roles::{DefaultGrants, Role, RoleDefinition, ROLE_CATALOG};

/// A stored role row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: Role,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored action (permission) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub id: ActionId,
    pub name: Permission,
    pub description: Option<String>,
    pub category: String,
    pub table_name: Option<String>,
    pub operation: Operation,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A user → role grant. Revocation flips `is_active`; rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrant {
    pub id: RoleGrantId,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub role_name: Role,
    pub assigned_by: Option<UserId>,
    pub assigned_at: DateTime<Utc>,
    pub is_active: bool,
    pub notes: Option<String>,
}

/// A role together with the permission names it grants (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: RoleRecord,
    pub permissions: Vec<Permission>,
}

/// Input for adding an action to the catalog after seeding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAction {
    pub name: Permission,
    pub description: Option<String>,
    pub category: String,
    pub table_name: Option<String>,
    pub operation: Operation,
}

// ─────────────────────────────────────────────────────────────────────────────
// Seed plan
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("role '{role}' grants unknown action '{action}'")]
    UnknownAction { role: String, action: String },

    #[error("duplicate action '{0}' in catalog")]
    DuplicateAction(String),

    #[error("duplicate role '{0}' in catalog")]
    DuplicateRole(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRole {
    pub name: Role,
    pub description: String,
    /// One role→action row each; the wildcard is already expanded here.
    pub actions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAction {
    pub name: Permission,
    pub description: String,
    pub category: String,
    pub table_name: String,
    pub operation: Operation,
}

/// Validated catalog contents, ready to be written in one transaction.
///
/// Every explicit grant is checked against the action list before any row is
/// written, so a referential mistake in the static tables never reaches the
/// database. Wildcard roles are expanded to the action list as it stands now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPlan {
    pub roles: Vec<SeedRole>,
    pub actions: Vec<SeedAction>,
}

impl SeedPlan {
    /// Plan for the built-in catalog.
    pub fn from_catalog() -> Result<Self, CatalogError> {
        Self::new(ROLE_CATALOG, ACTION_CATALOG)
    }

    pub fn new(roles: &[RoleDefinition], actions: &[ActionDefinition]) -> Result<Self, CatalogError> {
        let mut action_names = HashSet::new();
        for a in actions {
            if !action_names.insert(a.name.as_str()) {
                return Err(CatalogError::DuplicateAction(a.name.to_string()));
            }
        }

        let mut role_names = HashSet::new();
        let mut seed_roles = Vec::with_capacity(roles.len());
        for def in roles {
            if !role_names.insert(def.name.as_str()) {
                return Err(CatalogError::DuplicateRole(def.name.to_string()));
            }
            if let DefaultGrants::Explicit(list) = def.grants {
                if let Some(p) = list.iter().find(|p| !action_names.contains(p.as_str())) {
                    return Err(CatalogError::UnknownAction {
                        role: def.name.to_string(),
                        action: p.to_string(),
                    });
                }
            }
            seed_roles.push(SeedRole {
                name: def.name.clone(),
                description: def.description.to_string(),
                actions: def.grants.expand(actions),
            });
        }

        let seed_actions = actions
            .iter()
            .map(|a| SeedAction {
                name: a.name.clone(),
                description: a.description.to_string(),
                category: a.category.to_string(),
                table_name: a.table_name.to_string(),
                operation: a.operation,
            })
            .collect();

        Ok(Self {
            roles: seed_roles,
            actions: seed_actions,
        })
    }

    /// Number of role→action rows this plan writes.
    pub fn grant_count(&self) -> usize {
        self.roles.iter().map(|r| r.actions.len()).sum()
    }
}

/// Result of a seed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeedOutcome {
    Seeded {
        roles: usize,
        actions: usize,
        grants: usize,
    },
    /// At least one role already existed; nothing was written.
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{classes, Operation};

    #[test]
    fn builtin_catalog_produces_a_valid_plan() {
        let plan = SeedPlan::from_catalog().unwrap();
        assert_eq!(plan.roles.len(), 4);
        assert_eq!(plan.actions.len(), 34);
        let admin = plan.roles.iter().find(|r| r.name == Role::ADMIN).unwrap();
        assert_eq!(admin.actions.len(), 34);
        assert_eq!(plan.grant_count(), 17 + 23 + 20 + 34);
    }

    #[test]
    fn grant_naming_a_missing_action_is_rejected_before_writing() {
        const BROKEN: &[Permission] = &[Permission::from_static("fly_to_moon")];
        let roles = [RoleDefinition {
            name: Role::from_static("pilot"),
            description: "",
            grants: DefaultGrants::Explicit(BROKEN),
        }];
        let err = SeedPlan::new(&roles, ACTION_CATALOG).unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownAction {
                role: "pilot".into(),
                action: "fly_to_moon".into()
            }
        );
    }

    #[test]
    fn wildcard_is_a_snapshot_of_the_planned_actions() {
        let extra = ActionDefinition {
            name: Permission::from_static("export_reports"),
            description: "",
            category: "system",
            table_name: "reports",
            operation: Operation::Read,
        };
        let mut grown = ACTION_CATALOG.to_vec();
        grown.push(extra);

        let now = SeedPlan::from_catalog().unwrap();
        let later = SeedPlan::new(ROLE_CATALOG, &grown).unwrap();
        let admin = |p: &SeedPlan| p.roles.iter().find(|r| r.name == Role::ADMIN).unwrap().actions.len();
        assert_eq!(admin(&now), 34);
        assert_eq!(admin(&later), 35);
    }

    #[test]
    fn duplicate_actions_are_rejected() {
        let dup = ActionDefinition {
            name: classes::READ,
            description: "again",
            category: "classes",
            table_name: "classes",
            operation: Operation::Read,
        };
        let actions = [dup.clone(), dup];
        assert!(matches!(
            SeedPlan::new(&[], &actions),
            Err(CatalogError::DuplicateAction(_))
        ));
    }
}
