//! Handler-side authorization guards.
//!
//! Permission checks run against the permission set resolved into the
//! session; ownership checks compare the caller against the row's owner.

use tracing::debug;

use shor_auth::{authorize, authorize_owner, AuthzError, Permission};
use shor_core::UserId;

use crate::context::SessionContext;

/// The caller holds `permission` through any active role.
pub fn require(ctx: &SessionContext, permission: &Permission) -> Result<(), AuthzError> {
    authorize(ctx.principal(), permission).inspect_err(|e| {
        debug!(user_id = %ctx.user_id(), error = %e, "permission denied");
    })
}

/// The caller owns the row (by user id) or holds the admin role.
pub fn require_owner(ctx: &SessionContext, owner: UserId, resource: &str) -> Result<(), AuthzError> {
    authorize_owner(ctx.principal(), owner, resource)
}

/// Ownership established by the caller (e.g. through an extension row), or admin.
pub fn require_ownership(ctx: &SessionContext, owns: bool, resource: &str) -> Result<(), AuthzError> {
    if owns || ctx.principal().is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotOwner(resource.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use shor_auth::permissions::{classes, system};
    use shor_auth::{EnrichedSession, EnrichedUser, Role, Session, UserProfile};
    use shor_core::SessionId;

    fn ctx(roles: &[Role], perms: &[Permission]) -> SessionContext {
        let now = Utc::now();
        let id = UserId::new();
        let profile = UserProfile {
            id,
            email: "a@b.co".into(),
            name: "Asha".into(),
            phone: None,
            profile_pic: None,
            gender: None,
            instagram: None,
            height: None,
            bio: None,
            image: None,
            email_verified: false,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let mut user = EnrichedUser::basic(profile);
        user.roles = roles.to_vec();
        user.permissions = perms.iter().cloned().collect();
        SessionContext::new(EnrichedSession {
            session: Session {
                id: SessionId::new(),
                user_id: id,
                token: "t".into(),
                expires_at: now + Duration::days(1),
                created_at: now,
                updated_at: now,
                ip_address: None,
                user_agent: None,
            },
            user,
        })
    }

    #[test]
    fn permission_guard_uses_session_permissions() {
        let c = ctx(&[Role::STUDENT], &[classes::READ]);
        assert!(require(&c, &classes::READ).is_ok());
        assert!(require(&c, &system::READ_AUDIT_LOG).is_err());
    }

    #[test]
    fn ownership_guard_admits_admin() {
        let artist = ctx(&[Role::ARTIST], &[]);
        assert!(require_ownership(&artist, false, "class").is_err());
        assert!(require_ownership(&artist, true, "class").is_ok());
        assert!(require_owner(&artist, artist.user_id(), "booking").is_ok());

        let admin = ctx(&[Role::ADMIN], &[]);
        assert!(require_ownership(&admin, false, "class").is_ok());
        assert!(require_owner(&admin, UserId::new(), "booking").is_ok());
    }
}
