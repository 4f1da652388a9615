//! Session records and the enriched session payload.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use shor_core::{ArtistId, SessionId, StudentId, StudioId, UserId, UserType};

use crate::{PermissionSet, Role, UserProfile};

/// How many recent rows of each kind are counted in [`RecentActivity`].
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// An authenticated session. The token is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    #[serde(skip_serializing)]
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Sessions last touched more than `update_age` ago get their expiry extended.
    pub fn is_due_for_refresh(&self, now: DateTime<Utc>, update_age: Duration) -> bool {
        now - self.updated_at >= update_age
    }
}

/// Request metadata recorded on sessions and audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Counts of the user's most recent rows (each capped at [`RECENT_ACTIVITY_LIMIT`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub class_bookings: usize,
    pub studio_bookings: usize,
    pub gig_applications: usize,
}

impl RecentActivity {
    pub fn capped(class_bookings: usize, studio_bookings: usize, gig_applications: usize) -> Self {
        Self {
            class_bookings: class_bookings.min(RECENT_ACTIVITY_LIMIT),
            studio_bookings: studio_bookings.min(RECENT_ACTIVITY_LIMIT),
            gig_applications: gig_applications.min(RECENT_ACTIVITY_LIMIT),
        }
    }
}

/// The user as attached to a session after enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub roles: Vec<Role>,
    pub permissions: PermissionSet,
    pub user_type: UserType,
    pub recent_activity: RecentActivity,
    pub artist_id: Option<ArtistId>,
    pub studio_id: Option<StudioId>,
    pub student_id: Option<StudentId>,
}

impl EnrichedUser {
    /// Fallback shape when enrichment cannot run: no roles, no permissions.
    pub fn basic(profile: UserProfile) -> Self {
        Self {
            profile,
            roles: Vec::new(),
            permissions: PermissionSet::new(),
            user_type: UserType::Basic,
            recent_activity: RecentActivity::default(),
            artist_id: None,
            studio_id: None,
            student_id: None,
        }
    }

    pub fn principal(&self) -> crate::Principal {
        crate::Principal {
            user_id: self.profile.id,
            roles: self.roles.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

/// Derive the account classification from which extension rows exist.
pub fn classify_user(artist: bool, studio: bool, student: bool) -> UserType {
    if artist {
        UserType::Artist
    } else if studio {
        UserType::Studio
    } else if student {
        UserType::Student
    } else {
        UserType::Basic
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedSession {
    pub session: Session,
    pub user: EnrichedUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(now: DateTime<Utc>) -> Session {
        Session {
            id: SessionId::new(),
            user_id: UserId::new(),
            token: "secret".into(),
            expires_at: now + Duration::days(7),
            created_at: now,
            updated_at: now,
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn token_is_not_serialized() {
        let json = serde_json::to_value(session(Utc::now())).unwrap();
        assert!(json.get("token").is_none());
        assert!(json.get("expiresAt").is_some());
    }

    #[test]
    fn refresh_is_due_after_update_age() {
        let now = Utc::now();
        let s = session(now);
        assert!(!s.is_due_for_refresh(now + Duration::hours(23), Duration::days(1)));
        assert!(s.is_due_for_refresh(now + Duration::hours(25), Duration::days(1)));
        assert!(s.is_expired(now + Duration::days(7)));
    }

    #[test]
    fn classification_prefers_artist_then_studio_then_student() {
        assert_eq!(classify_user(true, true, true), UserType::Artist);
        assert_eq!(classify_user(false, true, true), UserType::Studio);
        assert_eq!(classify_user(false, false, true), UserType::Student);
        assert_eq!(classify_user(false, false, false), UserType::Basic);
    }

    #[test]
    fn recent_activity_is_capped() {
        let a = RecentActivity::capped(9, 2, 5);
        assert_eq!(a, RecentActivity { class_bookings: 5, studio_bookings: 2, gig_applications: 5 });
    }
}
