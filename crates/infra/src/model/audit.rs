use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use shor_auth::ClientInfo;
use shor_core::{AuditEntryId, UserId};

use super::Page;

/// Append-only record of a permission-relevant mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub user_id: Option<UserId>,
    pub target_user_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub old_values: Option<JsonValue>,
    pub new_values: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<UserId>,
    pub target_user_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub old_values: Option<JsonValue>,
    pub new_values: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditEntry {
    pub fn new(ctx: &AuditContext, action: &str, entity_type: &str) -> Self {
        Self {
            user_id: ctx.actor,
            target_user_id: None,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: None,
            old_values: None,
            new_values: None,
            metadata: None,
            ip_address: ctx.client.ip_address.clone(),
            user_agent: ctx.client.user_agent.clone(),
        }
    }

    pub fn target(mut self, user: UserId) -> Self {
        self.target_user_id = Some(user);
        self
    }

    pub fn entity(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn old<T: Serialize>(mut self, value: &T) -> Self {
        self.old_values = serde_json::to_value(value).ok();
        self
    }

    pub fn new_values<T: Serialize>(mut self, value: &T) -> Self {
        self.new_values = serde_json::to_value(value).ok();
        self
    }

    pub fn metadata(mut self, value: JsonValue) -> Self {
        self.metadata = Some(value);
        self
    }

    pub fn into_entry(self, id: AuditEntryId, created_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id,
            user_id: self.user_id,
            target_user_id: self.target_user_id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            old_values: self.old_values,
            new_values: self.new_values,
            metadata: self.metadata,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at,
        }
    }
}

/// Who performed a mutation and from where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub actor: Option<UserId>,
    pub client: ClientInfo,
}

impl AuditContext {
    pub fn new(actor: Option<UserId>, client: ClientInfo) -> Self {
        Self { actor, client }
    }

    pub fn system() -> Self {
        Self::default()
    }
}

/// Audit log listing filter; newest entries first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    /// Matches entries where the user is either the actor or the target.
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub page: Page,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let user_ok = self
            .user_id
            .is_none_or(|u| entry.user_id == Some(u) || entry.target_user_id == Some(u));
        let action_ok = self.action.as_deref().is_none_or(|a| entry.action == a);
        user_ok && action_ok
    }
}

/// Audit action names written by the repositories.
pub mod actions {
    pub const USER_REGISTERED: &str = "user_registered";
    pub const USER_DEACTIVATED: &str = "user_deactivated";
    pub const ROLE_ASSIGNED: &str = "role_assigned";
    pub const ROLE_REVOKED: &str = "role_revoked";
    pub const ACTION_CREATED: &str = "action_created";
}
