//! Identity-provider rows: registration input, verification tokens.

use chrono::{DateTime, Utc};

use shor_auth::{ClientInfo, Role, RoleGrant, UserProfile};
use shor_core::UserId;

use super::profiles::{Artist, NewArtist, NewStudio, Studio};

/// Validated registration data for the base user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub profile_pic: Option<String>,
    pub gender: Option<String>,
    pub instagram: Option<String>,
    pub height: Option<String>,
    pub bio: Option<String>,
}

impl NewUser {
    pub fn into_profile(self, id: UserId, now: DateTime<Utc>) -> UserProfile {
        UserProfile {
            id,
            email: self.email,
            name: self.name,
            phone: self.phone,
            profile_pic: self.profile_pic,
            gender: self.gender,
            instagram: self.instagram,
            height: self.height,
            bio: self.bio,
            image: None,
            email_verified: false,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Extension row created alongside the account for artist/studio owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewExtension {
    Artist(NewArtist),
    Studio(NewStudio),
}

/// Everything written by one registration, in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub user_id: UserId,
    pub user: NewUser,
    pub password_hash: String,
    pub role: Role,
    pub extension: Option<NewExtension>,
    pub client: ClientInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedAccount {
    pub user: UserProfile,
    pub grant: RoleGrant,
    pub artist: Option<Artist>,
    pub studio: Option<Studio>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Verification tokens
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationKind {
    PasswordReset,
    EmailVerification,
}

impl VerificationKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            VerificationKind::PasswordReset => "reset-password",
            VerificationKind::EmailVerification => "email-verification",
        }
    }

    /// Storage identifier (`<kind>:<token>`); tokens are only looked up by kind.
    pub fn identifier(&self, token: &str) -> String {
        format!("{}:{}", self.prefix(), token)
    }
}

/// A one-shot token. Consumed (deleted) on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub identifier: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Verification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
