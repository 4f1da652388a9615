//! Session enrichment: roles, permissions, user type and recent activity.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use shor_auth::session::classify_user;
use shor_auth::{EnrichedSession, EnrichedUser, Session, SessionEnricher, UserProfile};

use crate::error::StoreError;
use crate::repository::Store;

pub struct StoreSessionEnricher {
    store: Arc<dyn Store>,
}

impl StoreSessionEnricher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn enrich_user(&self, profile: UserProfile) -> Result<EnrichedUser, StoreError> {
        let id = profile.id;
        let roles = self.store.active_roles(id).await?;
        let permissions = self.store.resolve_permissions(id).await?;
        let artist = self.store.find_artist_by_user(id).await?;
        let studio = self.store.find_studio_by_user(id).await?;
        let student = self.store.find_student_by_user(id).await?;
        let recent_activity = self.store.recent_activity(id).await?;

        Ok(EnrichedUser {
            profile,
            roles,
            permissions,
            user_type: classify_user(artist.is_some(), studio.is_some(), student.is_some()),
            recent_activity,
            artist_id: artist.map(|a| a.id),
            studio_id: studio.map(|s| s.id),
            student_id: student.map(|s| s.id),
        })
    }
}

#[async_trait]
impl SessionEnricher for StoreSessionEnricher {
    async fn enrich(&self, user: UserProfile, session: Session) -> EnrichedSession {
        let user = match self.enrich_user(user.clone()).await {
            Ok(enriched) => enriched,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "session enrichment failed, using base user");
                EnrichedUser::basic(user)
            }
        };
        EnrichedSession { session, user }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use shor_auth::Role;
    use shor_core::{SessionId, UserId, UserType};

    use crate::model::{NewAccount, NewUser, StudentUpdate};
    use crate::repository::{AccountRepository, InMemoryStore, ProfileRepository};

    fn session_for(user: &UserProfile) -> Session {
        let now = Utc::now();
        Session {
            id: SessionId::new(),
            user_id: user.id,
            token: "t".into(),
            expires_at: now + Duration::days(7),
            created_at: now,
            updated_at: now,
            ip_address: None,
            user_agent: None,
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: "Meera".into(),
            phone: None,
            profile_pic: None,
            gender: None,
            instagram: None,
            height: None,
            bio: None,
        }
    }

    #[tokio::test]
    async fn unknown_user_falls_back_to_basic() {
        let store = InMemoryStore::arc();
        let enricher = StoreSessionEnricher::new(store);
        let user = new_user("ghost@example.com").into_profile(UserId::new(), Utc::now());

        let enriched = enricher.enrich(user.clone(), session_for(&user)).await;
        assert_eq!(enriched.user.user_type, UserType::Basic);
        assert!(enriched.user.roles.is_empty());
        assert!(enriched.user.permissions.is_empty());
        assert_eq!(enriched.user.profile, user);
    }

    #[tokio::test]
    async fn student_row_and_grants_are_attached() {
        let store = InMemoryStore::arc();
        crate::seed::seed(store.as_ref()).await.unwrap();
        let account = store
            .provision_account(NewAccount {
                user_id: UserId::new(),
                user: new_user("meera@example.com"),
                password_hash: "h".into(),
                role: Role::STUDENT,
                extension: None,
                client: Default::default(),
            })
            .await
            .unwrap();
        let student = store
            .upsert_student(account.user.id, &StudentUpdate::default())
            .await
            .unwrap();

        let enricher = StoreSessionEnricher::new(store);
        let enriched = enricher
            .enrich(account.user.clone(), session_for(&account.user))
            .await;
        assert_eq!(enriched.user.user_type, UserType::Student);
        assert_eq!(enriched.user.student_id, Some(student.id));
        assert_eq!(enriched.user.roles, vec![Role::STUDENT]);
        assert_eq!(enriched.user.permissions.len(), 17);
    }
}
