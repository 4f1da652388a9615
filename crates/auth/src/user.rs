//! User profile model shared by the identity provider, enrichment and HTTP layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shor_core::UserId;

/// Base account row. Every other entity joins back to `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub profile_pic: Option<String>,
    pub gender: Option<String>,
    pub instagram: Option<String>,
    pub height: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of the self-service profile fields.
///
/// `None` leaves a field untouched; an empty string clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub profile_pic: Option<String>,
    pub gender: Option<String>,
    pub instagram: Option<String>,
    pub height: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ProfileUpdate::default()
    }

    pub fn apply(&self, user: &mut UserProfile, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            user.name = name.trim().to_string();
        }
        set_optional(&mut user.phone, &self.phone);
        set_optional(&mut user.profile_pic, &self.profile_pic);
        set_optional(&mut user.gender, &self.gender);
        set_optional(&mut user.instagram, &self.instagram);
        set_optional(&mut user.height, &self.height);
        set_optional(&mut user.bio, &self.bio);
        user.updated_at = now;
    }
}

fn set_optional(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        let v = v.trim();
        *slot = if v.is_empty() { None } else { Some(v.to_string()) };
    }
}

/// Canonical form of an email address used for lookups and uniqueness.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: UserId::new(),
            email: "a@b.co".into(),
            name: "Asha".into(),
            phone: Some("9876543210".into()),
            profile_pic: None,
            gender: None,
            instagram: Some("@asha".into()),
            height: None,
            bio: None,
            image: None,
            email_verified: false,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn update_touches_only_present_fields() {
        let mut u = user();
        let update = ProfileUpdate {
            bio: Some("  Kathak dancer ".into()),
            instagram: Some(String::new()),
            ..Default::default()
        };
        update.apply(&mut u, Utc::now());
        assert_eq!(u.bio.as_deref(), Some("Kathak dancer"));
        assert_eq!(u.instagram, None);
        assert_eq!(u.phone.as_deref(), Some("9876543210"));
        assert_eq!(u.name, "Asha");
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Asha@Example.COM "), "asha@example.com");
    }
}
