use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use validator::Validate;

use shor_auth::{NewAction, Operation, Permission, ProfileUpdate};
use shor_core::{ApplicationStatus, UserId};
use shor_infra::model::{AuditQuery, Page};
use shor_infra::provisioning::url_or_empty;

// -------------------------
// Auth
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

/// Self-service profile edit; same field rules as registration.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2))]
    pub name: Option<String>,
    #[validate(length(min = 10))]
    pub phone: Option<String>,
    #[validate(custom(function = "url_or_empty"))]
    pub profile_pic: Option<String>,
    pub gender: Option<String>,
    pub instagram: Option<String>,
    pub height: Option<String>,
    pub bio: Option<String>,
}

impl UpdateProfileRequest {
    pub fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            name: self.name,
            phone: self.phone,
            profile_pic: self.profile_pic,
            gender: self.gender,
            instagram: self.instagram,
            height: self.height,
            bio: self.bio,
        }
    }
}

// -------------------------
// RBAC
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct AssignRoleRequest {
    #[validate(length(min = 1))]
    pub role: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionRequest {
    #[validate(length(min = 3, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    pub table_name: Option<String>,
    pub operation: Operation,
}

impl CreateActionRequest {
    pub fn into_action(self) -> NewAction {
        NewAction {
            name: Permission::new(self.name.trim().to_string()),
            description: self.description,
            category: self.category,
            table_name: self.table_name,
            operation: self.operation,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExplainQuery {
    #[validate(length(min = 1))]
    pub permission: String,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQuery {
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl AuditLogQuery {
    pub fn into_query(self) -> AuditQuery {
        AuditQuery {
            user_id: self.user_id,
            action: self.action,
            page: PageQuery {
                page: self.page,
                limit: self.limit,
            }
            .page(),
        }
    }
}

// -------------------------
// Listings
// -------------------------

/// `?page=&limit=`; out-of-range values are clamped.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        let default = Page::default();
        Page::new(
            self.page.unwrap_or(default.page),
            self.limit.unwrap_or(default.limit),
        )
    }
}

// -------------------------
// Bookings and gigs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct BookClassRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStudioRequest {
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewApplicationRequest {
    pub status: ApplicationStatus,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_and_clamps() {
        assert_eq!(PageQuery::default().page(), Page::default());
        let q = PageQuery {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(q.page(), Page::new(1, 100));
    }

    #[test]
    fn profile_update_rules_match_registration() {
        let ok = UpdateProfileRequest {
            profile_pic: Some(String::new()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad = UpdateProfileRequest {
            name: Some("A".into()),
            phone: Some("123".into()),
            ..Default::default()
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("phone"));
    }
}
