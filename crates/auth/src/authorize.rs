use serde::Serialize;
use thiserror::Error;

use shor_core::UserId;

use crate::{Permission, PermissionSet, Role};

/// A fully resolved caller for authorization decisions.
///
/// Built from an enriched session; decoupled from storage and transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: PermissionSet,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| *r == Role::ADMIN)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: {0} belongs to another user")]
    NotOwner(String),
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - Additive: holding the permission through any role is enough
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.permissions.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Owner-scoped check for mutations: the caller owns the row or is an admin.
pub fn authorize_owner(
    principal: &Principal,
    owner: UserId,
    resource: &str,
) -> Result<(), AuthzError> {
    if principal.user_id == owner || principal.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotOwner(resource.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub principal: PrincipalState,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalState {
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    MissingPermission,
}

/// Explain why a permission check passes or fails.
///
/// `granting_roles` maps a permission to the catalog roles that would grant
/// it; it is used only to build suggestions for denials.
pub fn explain_authorization<F>(
    principal: &Principal,
    required: &Permission,
    granting_roles: F,
) -> AuthorizationExplanation
where
    F: Fn(&Permission) -> Vec<Role>,
{
    let state = PrincipalState {
        user_id: principal.user_id,
        roles: principal.roles.iter().map(|r| r.to_string()).collect(),
        effective_permissions: principal.permissions.iter().map(|p| p.to_string()).collect(),
        is_admin: principal.is_admin(),
    };

    if authorize(principal, required).is_ok() {
        let reason = if principal.is_admin() {
            "Principal holds the admin role, which grants every active action".to_string()
        } else {
            format!("Principal has permission '{}' through an assigned role", required)
        };
        return AuthorizationExplanation {
            required_permission: required.to_string(),
            granted: true,
            reason,
            principal: state,
            denial_reason: None,
        };
    }

    let candidates = granting_roles(required);
    let mut suggestions = Vec::new();
    if candidates.is_empty() {
        suggestions.push(format!(
            "No catalog role grants '{}'; add it to a role via manage_permissions",
            required
        ));
    } else {
        let names: Vec<&str> = candidates.iter().map(|r| r.as_str()).collect();
        suggestions.push(format!("Assign one of these roles: {}", names.join(", ")));
    }

    AuthorizationExplanation {
        required_permission: required.to_string(),
        granted: false,
        reason: format!(
            "Principal does not have permission '{}' (holds {} permissions)",
            required,
            principal.permissions.len()
        ),
        principal: state,
        denial_reason: Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{}'", required),
            suggestions,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{classes, gigs, system};

    fn principal(roles: &[Role], perms: &[Permission]) -> Principal {
        Principal {
            user_id: UserId::new(),
            roles: roles.to_vec(),
            permissions: perms.iter().cloned().collect(),
        }
    }

    #[test]
    fn authorize_allows_held_permission() {
        let p = principal(&[Role::STUDENT], &[classes::READ]);
        assert!(authorize(&p, &classes::READ).is_ok());
    }

    #[test]
    fn authorize_denies_missing_permission() {
        let p = principal(&[Role::STUDENT], &[classes::READ]);
        let err = authorize(&p, &classes::CREATE).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("create_class".into()));
    }

    #[test]
    fn empty_principal_is_denied_everything() {
        let p = principal(&[], &[]);
        assert!(authorize(&p, &gigs::READ).is_err());
    }

    #[test]
    fn owner_check_admits_owner_and_admin_only() {
        let owner = principal(&[Role::ARTIST], &[]);
        assert!(authorize_owner(&owner, owner.user_id, "class").is_ok());

        let stranger = principal(&[Role::ARTIST], &[]);
        assert!(matches!(
            authorize_owner(&stranger, owner.user_id, "class"),
            Err(AuthzError::NotOwner(_))
        ));

        let admin = principal(&[Role::ADMIN], &[]);
        assert!(authorize_owner(&admin, owner.user_id, "class").is_ok());
    }

    #[test]
    fn explanation_suggests_granting_roles() {
        let p = principal(&[Role::STUDENT], &[classes::READ]);
        let explanation = explain_authorization(&p, &classes::CREATE, |_| vec![Role::ARTIST, Role::ADMIN]);
        assert!(!explanation.granted);
        let denial = explanation.denial_reason.unwrap();
        assert_eq!(denial.kind, DenialKind::MissingPermission);
        assert!(denial.suggestions[0].contains("artist, admin"));
    }

    #[test]
    fn explanation_for_granted_check_has_no_denial() {
        let p = principal(&[Role::ADMIN], &[system::READ_AUDIT_LOG]);
        let explanation = explain_authorization(&p, &system::READ_AUDIT_LOG, |_| vec![]);
        assert!(explanation.granted);
        assert!(explanation.principal.is_admin);
        assert!(explanation.denial_reason.is_none());
    }
}
