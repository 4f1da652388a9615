//! Store-backed implementation of the identity provider contract.
//!
//! Sessions are opaque random tokens persisted through [`AccountRepository`];
//! passwords are Argon2id hashes (optionally peppered with `AUTH_SECRET`).
//! Reset and verification tokens are one-shot rows consumed on first use.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shor_auth::password::{hash_password, verify_password};
use shor_auth::{
    normalize_email, AuthError, AuthHooks, ClientInfo, IdentityProvider, Notifier, Session,
    SignedIn, UserProfile,
};
use shor_core::{SessionId, UserId};

use crate::config::SessionConfig;
use crate::error::StoreError;
use crate::model::{Verification, VerificationKind};
use crate::repository::Store;

/// One hour.
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;
/// One day.
pub const VERIFICATION_TOKEN_TTL_SECS: i64 = 60 * 60 * 24;

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub struct LocalIdentityProvider {
    store: Arc<dyn Store>,
    pepper: Option<String>,
    session: SessionConfig,
    hooks: Option<Arc<dyn AuthHooks>>,
    notifier: Arc<dyn Notifier>,
    /// Verified against when the email is unknown, so both paths cost one argon2 verify.
    dummy_hash: OnceLock<String>,
}

impl LocalIdentityProvider {
    pub fn new(store: Arc<dyn Store>, pepper: Option<String>, session: SessionConfig) -> Self {
        Self {
            store,
            pepper,
            session,
            hooks: None,
            notifier: Arc::new(TracingNotifier),
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn AuthHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    fn pepper(&self) -> Option<&str> {
        self.pepper.as_deref()
    }

    fn dummy_hash(&self) -> Result<&str, AuthError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash);
        }
        let hash = hash_password(&new_token(), self.pepper())?;
        Ok(self.dummy_hash.get_or_init(|| hash))
    }

    /// Burn one verify and fail, for accounts that do not exist.
    fn reject_unknown(&self, password: &str) -> Result<SignedIn, AuthError> {
        let _ = verify_password(password, self.dummy_hash()?, self.pepper())?;
        Err(AuthError::InvalidCredentials)
    }

    async fn issue_token(
        &self,
        kind: VerificationKind,
        user: UserId,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let token = new_token();
        let now = Utc::now();
        self.store
            .insert_verification(&Verification {
                identifier: kind.identifier(&token),
                user_id: user,
                expires_at: now + ttl,
                created_at: now,
            })
            .await?;
        Ok(token)
    }

    /// Consume a token; missing and expired tokens are both invalid.
    async fn consume_token(&self, kind: VerificationKind, token: &str) -> Result<UserId, AuthError> {
        match self.store.take_verification(kind, token).await? {
            Some(v) if !v.is_expired(Utc::now()) => Ok(v.user_id),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    #[instrument(skip(self, password, client), err)]
    async fn sign_in(&self, email: &str, password: &str, client: &ClientInfo) -> Result<SignedIn, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            return self.reject_unknown(password);
        };
        let Some(hash) = self.store.password_hash(user.id).await? else {
            return self.reject_unknown(password);
        };
        if !verify_password(password, &hash, self.pepper())? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        let session = self.issue_session(user.id, client).await?;
        if let Some(hooks) = &self.hooks {
            if let Err(e) = hooks.after_sign_in(&user, &session).await {
                warn!(user_id = %user.id, error = %e, "after sign-in hook failed");
            }
        }
        info!(user_id = %user.id, "signed in");
        Ok(SignedIn { user, session })
    }

    async fn issue_session(&self, user_id: UserId, client: &ClientInfo) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session {
            id: SessionId::new(),
            user_id,
            token: new_token(),
            expires_at: now + self.session.ttl,
            created_at: now,
            updated_at: now,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        };
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    async fn get_session(&self, token: &str) -> Result<Option<(Session, UserProfile)>, AuthError> {
        let Some(session) = self.store.find_session(token).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        if session.is_expired(now) {
            self.store.delete_session(token).await?;
            debug!(session_id = %session.id, "expired session removed");
            return Ok(None);
        }
        let Some(user) = self.store.find_user(session.user_id).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let session = if session.is_due_for_refresh(now, self.session.update_age) {
            let expires_at = now + self.session.ttl;
            self.store.extend_session(session.id, expires_at, now).await?;
            Session {
                expires_at,
                updated_at: now,
                ..session
            }
        } else {
            session
        };
        Ok(Some((session, user)))
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<Session>, AuthError> {
        let now = Utc::now();
        let sessions = self.store.list_sessions(user_id).await?;
        Ok(sessions.into_iter().filter(|s| !s.is_expired(now)).collect())
    }

    async fn revoke_session(&self, user_id: UserId, session_id: SessionId) -> Result<bool, AuthError> {
        Ok(self.store.delete_user_session(user_id, session_id).await?)
    }

    async fn revoke_sessions(&self, user_id: UserId, keep: Option<SessionId>) -> Result<u64, AuthError> {
        Ok(self.store.delete_user_sessions(user_id, keep).await?)
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.store.delete_session(token).await?;
        Ok(())
    }

    #[instrument(skip(self, current_password, new_password), err)]
    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
        keep: Option<SessionId>,
    ) -> Result<(), AuthError> {
        let hash = self
            .store
            .password_hash(user_id)
            .await?
            .ok_or(AuthError::UnknownAccount)?;
        if !verify_password(current_password, &hash, self.pepper())? {
            return Err(AuthError::InvalidCredentials);
        }
        let replacement = self.hash_password(new_password)?;
        self.store.set_password_hash(user_id, &replacement).await?;
        let revoked = self.store.delete_user_sessions(user_id, keep).await?;
        info!(%user_id, revoked, "password changed");
        Ok(())
    }

    #[instrument(skip(self, email), err)]
    async fn forget_password(&self, email: &str) -> Result<(), AuthError> {
        let Some(user) = self.store.find_user_by_email(&normalize_email(email)).await? else {
            debug!("password reset requested for unknown email");
            return Ok(());
        };
        let token = self
            .issue_token(
                VerificationKind::PasswordReset,
                user.id,
                Duration::seconds(RESET_TOKEN_TTL_SECS),
            )
            .await?;
        self.notifier.password_reset_requested(&user, &token).await
    }

    #[instrument(skip(self, token, new_password), err)]
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let user_id = self.consume_token(VerificationKind::PasswordReset, token).await?;
        let hash = self.hash_password(new_password)?;
        self.store
            .set_password_hash(user_id, &hash)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => AuthError::UnknownAccount,
                other => other.into(),
            })?;
        let revoked = self.store.delete_user_sessions(user_id, None).await?;
        info!(%user_id, revoked, "password reset");
        Ok(())
    }

    #[instrument(skip(self, email), err)]
    async fn send_verification_email(&self, email: &str) -> Result<(), AuthError> {
        let Some(user) = self.store.find_user_by_email(&normalize_email(email)).await? else {
            debug!("verification requested for unknown email");
            return Ok(());
        };
        if user.email_verified {
            return Ok(());
        }
        let token = self
            .issue_token(
                VerificationKind::EmailVerification,
                user.id,
                Duration::seconds(VERIFICATION_TOKEN_TTL_SECS),
            )
            .await?;
        self.notifier.verification_requested(&user, &token).await
    }

    async fn verify_email(&self, token: &str) -> Result<UserProfile, AuthError> {
        let user_id = self.consume_token(VerificationKind::EmailVerification, token).await?;
        self.store
            .mark_email_verified(user_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => AuthError::UnknownAccount,
                other => other.into(),
            })
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        hash_password(password, self.pepper())
    }
}

/// Default notifier: records that a token was issued, never the token itself.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn password_reset_requested(&self, user: &UserProfile, _token: &str) -> Result<(), AuthError> {
        info!(user_id = %user.id, "password reset token issued");
        Ok(())
    }

    async fn verification_requested(&self, user: &UserProfile, _token: &str) -> Result<(), AuthError> {
        info!(user_id = %user.id, "email verification token issued");
        Ok(())
    }
}

/// Stamps `last_login_at` after every successful sign-in.
pub struct LastLoginHook {
    store: Arc<dyn Store>,
}

impl LastLoginHook {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthHooks for LastLoginHook {
    async fn after_sign_in(&self, user: &UserProfile, session: &Session) -> Result<(), AuthError> {
        self.store.record_login(user.id, session.created_at).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use shor_auth::Role;

    use crate::model::{AuditContext, NewAccount, NewUser};
    use crate::repository::{AccountRepository, InMemoryStore, UserRepository};
    use crate::seed::seed;

    #[derive(Default)]
    struct CapturingNotifier {
        tokens: Mutex<Vec<String>>,
    }

    impl CapturingNotifier {
        fn last(&self) -> String {
            self.tokens.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Notifier for CapturingNotifier {
        async fn password_reset_requested(&self, _: &UserProfile, token: &str) -> Result<(), AuthError> {
            self.tokens.lock().unwrap().push(token.to_string());
            Ok(())
        }

        async fn verification_requested(&self, _: &UserProfile, token: &str) -> Result<(), AuthError> {
            self.tokens.lock().unwrap().push(token.to_string());
            Ok(())
        }
    }

    struct FailingHook;

    #[async_trait]
    impl AuthHooks for FailingHook {
        async fn after_sign_in(&self, _: &UserProfile, _: &Session) -> Result<(), AuthError> {
            Err(AuthError::Storage("hook down".into()))
        }
    }

    const PASSWORD: &str = "correct-horse";

    struct Fixture {
        store: Arc<InMemoryStore>,
        provider: LocalIdentityProvider,
        notifier: Arc<CapturingNotifier>,
        user: UserProfile,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::arc();
        seed(store.as_ref()).await.unwrap();
        let dyn_store: Arc<dyn Store> = store.clone();
        let notifier = Arc::new(CapturingNotifier::default());
        let provider = LocalIdentityProvider::new(dyn_store.clone(), None, SessionConfig::default())
            .with_hooks(Arc::new(LastLoginHook::new(dyn_store)))
            .with_notifier(notifier.clone());

        let account = store
            .provision_account(NewAccount {
                user_id: UserId::new(),
                user: NewUser {
                    email: "kavya@example.com".into(),
                    name: "Kavya".into(),
                    phone: None,
                    profile_pic: None,
                    gender: None,
                    instagram: None,
                    height: None,
                    bio: None,
                },
                password_hash: provider.hash_password(PASSWORD).unwrap(),
                role: Role::STUDENT,
                extension: None,
                client: ClientInfo::default(),
            })
            .await
            .unwrap();

        Fixture {
            store,
            provider,
            notifier,
            user: account.user,
        }
    }

    #[tokio::test]
    async fn sign_in_issues_a_session_and_records_login() {
        let f = fixture().await;
        let signed = f
            .provider
            .sign_in(" KAVYA@example.com", PASSWORD, &ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(signed.user.id, f.user.id);
        assert_eq!(signed.session.token.len(), 64);

        let (session, user) = f.provider.get_session(&signed.session.token).await.unwrap().unwrap();
        assert_eq!(session.id, signed.session.id);
        assert!(user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let f = fixture().await;
        let client = ClientInfo::default();
        assert_eq!(
            f.provider.sign_in("kavya@example.com", "nope-nope", &client).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            f.provider.sign_in("nobody@example.com", PASSWORD, &client).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn unknown_email_still_runs_a_verify() {
        let f = fixture().await;
        assert!(f.provider.dummy_hash.get().is_none());
        assert_eq!(
            f.provider
                .sign_in("nobody@example.com", PASSWORD, &ClientInfo::default())
                .await
                .unwrap_err(),
            AuthError::InvalidCredentials
        );
        let dummy = f.provider.dummy_hash.get().expect("dummy hash built on first miss");
        assert!(dummy.starts_with("$argon2"));
        assert!(!verify_password(PASSWORD, dummy, None).unwrap());
    }

    #[tokio::test]
    async fn inactive_accounts_cannot_sign_in() {
        let f = fixture().await;
        f.store
            .deactivate_user(f.user.id, &AuditContext::system())
            .await
            .unwrap();
        let err = f
            .provider
            .sign_in("kavya@example.com", PASSWORD, &ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::AccountInactive);
    }

    #[tokio::test]
    async fn hook_failure_does_not_fail_sign_in() {
        let f = fixture().await;
        let provider = LocalIdentityProvider::new(f.store.clone(), None, SessionConfig::default())
            .with_hooks(Arc::new(FailingHook));
        assert!(provider
            .sign_in("kavya@example.com", PASSWORD, &ClientInfo::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn expired_sessions_are_removed_on_read() {
        let f = fixture().await;
        let now = Utc::now();
        let stale = Session {
            id: SessionId::new(),
            user_id: f.user.id,
            token: "stale".into(),
            expires_at: now - Duration::minutes(1),
            created_at: now - Duration::days(8),
            updated_at: now - Duration::days(8),
            ip_address: None,
            user_agent: None,
        };
        f.store.insert_session(&stale).await.unwrap();

        assert!(f.provider.get_session("stale").await.unwrap().is_none());
        assert!(f.store.find_session("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn old_sessions_are_extended_on_read() {
        let f = fixture().await;
        let now = Utc::now();
        let aging = Session {
            id: SessionId::new(),
            user_id: f.user.id,
            token: "aging".into(),
            expires_at: now + Duration::days(2),
            created_at: now - Duration::days(5),
            updated_at: now - Duration::days(2),
            ip_address: None,
            user_agent: None,
        };
        f.store.insert_session(&aging).await.unwrap();

        let (session, _) = f.provider.get_session("aging").await.unwrap().unwrap();
        assert!(session.expires_at > now + Duration::days(6));
        let stored = f.store.find_session("aging").await.unwrap().unwrap();
        assert_eq!(stored.expires_at, session.expires_at);
    }

    #[tokio::test]
    async fn changing_password_keeps_only_the_current_session() {
        let f = fixture().await;
        let client = ClientInfo::default();
        let first = f.provider.sign_in("kavya@example.com", PASSWORD, &client).await.unwrap();
        let second = f.provider.sign_in("kavya@example.com", PASSWORD, &client).await.unwrap();

        f.provider
            .change_password(f.user.id, PASSWORD, "new-password-1", Some(first.session.id))
            .await
            .unwrap();

        let remaining = f.provider.list_sessions(f.user.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first.session.id);
        assert!(f.provider.get_session(&second.session.token).await.unwrap().is_none());
        assert!(f.provider.sign_in("kavya@example.com", "new-password-1", &client).await.is_ok());
    }

    #[tokio::test]
    async fn reset_token_is_single_use_and_revokes_sessions() {
        let f = fixture().await;
        let client = ClientInfo::default();
        let signed = f.provider.sign_in("kavya@example.com", PASSWORD, &client).await.unwrap();

        f.provider.forget_password("kavya@example.com").await.unwrap();
        let token = f.notifier.last();
        f.provider.reset_password(&token, "fresh-password").await.unwrap();

        assert!(f.provider.get_session(&signed.session.token).await.unwrap().is_none());
        assert_eq!(
            f.provider.reset_password(&token, "again-password").await.unwrap_err(),
            AuthError::InvalidToken
        );
        assert!(f.provider.sign_in("kavya@example.com", "fresh-password", &client).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_email_reset_succeeds_silently() {
        let f = fixture().await;
        f.provider.forget_password("ghost@example.com").await.unwrap();
        assert!(f.notifier.tokens.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn verification_marks_email_verified() {
        let f = fixture().await;
        f.provider.send_verification_email("kavya@example.com").await.unwrap();
        let token = f.notifier.last();

        let user = f.provider.verify_email(&token).await.unwrap();
        assert!(user.email_verified);
        assert_eq!(f.provider.verify_email(&token).await.unwrap_err(), AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn sign_out_is_idempotent() {
        let f = fixture().await;
        f.provider.sign_out("never-issued").await.unwrap();
    }
}
