//! Collaborator contracts for the external identity provider.
//!
//! The marketplace delegates credential checks, session issuance and
//! password/email token flows to an [`IdentityProvider`]. In return it exposes
//! a [`SessionEnricher`] (augments every session read) and [`AuthHooks`]
//! (side effects after authentication). Token delivery goes through a
//! [`Notifier`].

use async_trait::async_trait;
use thiserror::Error;

use shor_core::{SessionId, UserId};

use crate::{ClientInfo, EnrichedSession, Session, UserProfile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("account not found")]
    UnknownAccount,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("identity storage failure: {0}")]
    Storage(String),
}

/// A successful credential sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub user: UserProfile,
    pub session: Session,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify email + password and issue a session.
    async fn sign_in(&self, email: &str, password: &str, client: &ClientInfo) -> Result<SignedIn, AuthError>;

    async fn issue_session(&self, user_id: UserId, client: &ClientInfo) -> Result<Session, AuthError>;

    /// Look up a live session by token. Unknown and expired tokens yield `None`.
    async fn get_session(&self, token: &str) -> Result<Option<(Session, UserProfile)>, AuthError>;

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<Session>, AuthError>;

    /// Revoke one of the user's sessions. `false` when it does not exist.
    async fn revoke_session(&self, user_id: UserId, session_id: SessionId) -> Result<bool, AuthError>;

    /// Revoke every session of the user except `keep`. Returns the number removed.
    async fn revoke_sessions(&self, user_id: UserId, keep: Option<SessionId>) -> Result<u64, AuthError>;

    /// Idempotent: signing out an unknown token succeeds.
    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    /// Replace the password after verifying the current one; other sessions are revoked.
    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
        keep: Option<SessionId>,
    ) -> Result<(), AuthError>;

    /// Start a password reset. Unknown emails succeed silently.
    async fn forget_password(&self, email: &str) -> Result<(), AuthError>;

    /// Consume a reset token, replace the password and revoke all sessions.
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError>;

    async fn send_verification_email(&self, email: &str) -> Result<(), AuthError>;

    async fn verify_email(&self, token: &str) -> Result<UserProfile, AuthError>;

    /// Hash a password with the provider's parameters (used by registration).
    fn hash_password(&self, password: &str) -> Result<String, AuthError>;
}

/// Augments the `(user, session)` pair on every session read.
///
/// Implementations never fail: on error they log and fall back to the base user.
#[async_trait]
pub trait SessionEnricher: Send + Sync {
    async fn enrich(&self, user: UserProfile, session: Session) -> EnrichedSession;
}

/// Post-authentication side effects. Failures are logged by the caller and
/// never fail the sign-in.
#[async_trait]
pub trait AuthHooks: Send + Sync {
    async fn after_sign_in(&self, user: &UserProfile, session: &Session) -> Result<(), AuthError>;
}

/// Delivery of one-shot tokens (password reset, email verification).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn password_reset_requested(&self, user: &UserProfile, token: &str) -> Result<(), AuthError>;

    async fn verification_requested(&self, user: &UserProfile, token: &str) -> Result<(), AuthError>;
}
