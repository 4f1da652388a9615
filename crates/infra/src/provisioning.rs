//! Registration: one atomic account provisioning followed by session issuance.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};
use validator::{Validate, ValidationError, ValidationErrors};

use shor_auth::{
    normalize_email, AuthError, ClientInfo, EnrichedSession, IdentityProvider, RegistrationRole,
    SessionEnricher,
};
use shor_core::{DomainError, UserId};

use crate::error::StoreError;
use crate::model::{NewAccount, NewArtist, NewExtension, NewStudio, NewUser};
use crate::repository::Store;

/// Accepts an empty string or an http(s) URL.
pub fn url_or_empty(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::new("url_or_empty"))
    }
}

/// Self-service sign-up payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(min = 2))]
    pub name: String,
    #[validate(length(min = 10))]
    pub phone: Option<String>,
    #[validate(custom(function = "url_or_empty"))]
    pub profile_pic: Option<String>,
    pub gender: Option<String>,
    pub instagram: Option<String>,
    pub height: Option<String>,
    pub bio: Option<String>,
    /// `student` (default), `artist` or `studio_owner`.
    pub role: Option<String>,
}

/// Parse the registration role selector; absent means student.
pub fn select_role(raw: Option<&str>) -> Result<RegistrationRole, DomainError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(RegistrationRole::default()),
        Some(r) => r.parse(),
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid registration: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// A completed registration with its first session.
#[derive(Debug, Clone)]
pub struct Registered {
    pub token: String,
    pub role: RegistrationRole,
    pub session: EnrichedSession,
}

pub struct Registrar {
    store: Arc<dyn Store>,
    identity: Arc<dyn IdentityProvider>,
    enricher: Arc<dyn SessionEnricher>,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
        enricher: Arc<dyn SessionEnricher>,
    ) -> Self {
        Self {
            store,
            identity,
            enricher,
        }
    }

    /// Validate, provision user + credential + grant + extension + audit in
    /// one transaction, then sign the new user in.
    #[instrument(skip(self, registration, client), err)]
    pub async fn register(
        &self,
        registration: Registration,
        client: ClientInfo,
    ) -> Result<Registered, RegistrationError> {
        let mut registration = registration;
        registration.email = normalize_email(&registration.email);
        registration.validate()?;
        let role = select_role(registration.role.as_deref())?;

        let email = registration.email;
        let password_hash = self.identity.hash_password(&registration.password)?;
        let name = registration.name.trim().to_string();
        let phone = registration.phone.filter(|p| !p.trim().is_empty());

        let extension = match role {
            RegistrationRole::Student => None,
            RegistrationRole::Artist => Some(NewExtension::Artist(NewArtist::placeholder())),
            RegistrationRole::StudioOwner => Some(NewExtension::Studio(NewStudio::placeholder(
                &name,
                phone.as_deref(),
                &email,
            ))),
        };

        let account = NewAccount {
            user_id: UserId::new(),
            user: NewUser {
                email,
                name,
                phone,
                profile_pic: registration.profile_pic.filter(|p| !p.is_empty()),
                gender: registration.gender,
                instagram: registration.instagram,
                height: registration.height,
                bio: registration.bio,
            },
            password_hash,
            role: role.role(),
            extension,
            client: client.clone(),
        };

        let provisioned = self.store.provision_account(account).await?;
        info!(user_id = %provisioned.user.id, role = %provisioned.grant.role_name, "account provisioned");

        let session = self.identity.issue_session(provisioned.user.id, &client).await?;
        let token = session.token.clone();
        let enriched = self.enricher.enrich(provisioned.user, session).await;

        Ok(Registered {
            token,
            role,
            session: enriched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shor_auth::roles::find_role;
    use shor_auth::{PermissionSet, Role, ACTION_CATALOG};
    use shor_core::UserType;

    use crate::config::SessionConfig;
    use crate::enrichment::StoreSessionEnricher;
    use crate::identity::LocalIdentityProvider;
    use crate::model::AuditQuery;
    use crate::repository::{
        AuditLogRepository, GrantRepository, InMemoryStore, ProfileRepository, UserRepository,
    };
    use crate::seed::seed;

    fn registration(email: &str, role: Option<&str>) -> Registration {
        Registration {
            email: email.to_string(),
            password: "correct-horse".into(),
            name: "Asha Rao".into(),
            phone: Some("9876543210".into()),
            role: role.map(str::to_string),
            ..Default::default()
        }
    }

    async fn registrar() -> (Arc<InMemoryStore>, Registrar) {
        let store = InMemoryStore::arc();
        seed(store.as_ref()).await.unwrap();
        let dyn_store: Arc<dyn Store> = store.clone();
        let identity = Arc::new(LocalIdentityProvider::new(dyn_store.clone(), None, SessionConfig::default()));
        let enricher = Arc::new(StoreSessionEnricher::new(dyn_store.clone()));
        (store, Registrar::new(dyn_store, identity, enricher))
    }

    #[tokio::test]
    async fn student_registration_grants_student_role_only() {
        let (store, registrar) = registrar().await;
        let done = registrar
            .register(registration(" Asha@Example.com ", None), ClientInfo::default())
            .await
            .unwrap();

        let user = &done.session.user;
        assert_eq!(user.profile.email, "asha@example.com");
        assert_eq!(user.roles, vec![Role::STUDENT]);
        assert_eq!(user.permissions.len(), 17);
        assert_eq!(user.user_type, UserType::Basic);
        assert!(!done.token.is_empty());

        let audit = store.list_audit(&AuditQuery::default()).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "user_registered");
    }

    #[tokio::test]
    async fn artist_registration_creates_placeholder_profile() {
        let (store, registrar) = registrar().await;
        let done = registrar
            .register(registration("artist@example.com", Some("artist")), ClientInfo::default())
            .await
            .unwrap();
        let user = &done.session.user;
        assert_eq!(user.user_type, UserType::Artist);
        assert!(user.permissions.contains_str("create_class"));

        let artist = store.find_artist_by_user(user.profile.id).await.unwrap().unwrap();
        assert_eq!(artist.bio, "to be updated");
        assert_eq!(artist.experience, 0);
    }

    #[tokio::test]
    async fn studio_owner_registration_copies_contact_details() {
        let (store, registrar) = registrar().await;
        let done = registrar
            .register(registration("owner@example.com", Some("studio_owner")), ClientInfo::default())
            .await
            .unwrap();
        let studio = store
            .find_studio_by_user(done.session.user.profile.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(studio.contact_email, "owner@example.com");
        assert_eq!(studio.contact_phone, "9876543210");
        assert_eq!(studio.rental_fee_per_class, 20_000);
    }

    #[tokio::test]
    async fn each_role_resolves_exactly_its_default_list() {
        let (store, registrar) = registrar().await;
        for (i, selector) in ["student", "artist", "studio_owner"].into_iter().enumerate() {
            let email = format!("user{i}@example.com");
            let done = registrar
                .register(registration(&email, Some(selector)), ClientInfo::default())
                .await
                .unwrap();
            let user = done.session.user.profile.id;

            let expected: PermissionSet = find_role(selector)
                .unwrap()
                .grants
                .expand(ACTION_CATALOG)
                .into_iter()
                .collect();
            let resolved = store.resolve_permissions(user).await.unwrap();
            assert_eq!(resolved, expected, "{selector}");

            let active: Vec<_> = store
                .list_grants(user)
                .await
                .unwrap()
                .into_iter()
                .filter(|g| g.is_active)
                .collect();
            assert_eq!(active.len(), 1, "{selector}");
            assert_eq!(active[0].role_name.as_str(), selector);
        }
    }

    #[tokio::test]
    async fn admin_cannot_be_self_selected() {
        let (store, registrar) = registrar().await;
        let err = registrar
            .register(registration("root@example.com", Some("admin")), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Domain(DomainError::Validation(_))));
        assert!(store.find_user_by_email("root@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (_, registrar) = registrar().await;
        registrar
            .register(registration("dup@example.com", None), ClientInfo::default())
            .await
            .unwrap();
        let err = registrar
            .register(registration("DUP@example.com", None), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Store(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_any_write() {
        let (store, registrar) = registrar().await;
        let mut r = registration("short@example.com", None);
        r.password = "short".into();
        let err = registrar.register(r, ClientInfo::default()).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Invalid(_)));
        assert!(store.list_audit(&AuditQuery::default()).await.unwrap().is_empty());
    }

    #[test]
    fn profile_pic_accepts_url_or_empty() {
        let mut r = registration("p@example.com", None);
        r.profile_pic = Some(String::new());
        assert!(r.validate().is_ok());
        r.profile_pic = Some("https://cdn.example.com/a.png".into());
        assert!(r.validate().is_ok());
        r.profile_pic = Some("not a url".into());
        assert!(r.validate().is_err());
    }

    proptest! {
        #[test]
        fn role_selector_rejects_everything_else(raw in "[a-z_]{1,16}") {
            let parsed = select_role(Some(raw.as_str()));
            match raw.as_str() {
                "student" | "artist" | "studio_owner" => prop_assert!(parsed.is_ok()),
                _ => prop_assert!(parsed.is_err()),
            }
        }

        #[test]
        fn selected_role_maps_to_catalog_role(idx in 0usize..3) {
            let role = RegistrationRole::ALL[idx];
            let name = role.role();
            prop_assert_eq!(select_role(Some(name.as_str())).unwrap(), role);
        }
    }
}
