//! Postgres-backed repositories.
//!
//! ## Error mapping
//!
//! SQLx errors go through [`map_sqlx_error`](crate::error::map_sqlx_error):
//! unique violations become `Conflict`, foreign key violations `Referential`,
//! check violations `Validation`, everything else `Storage`.
//!
//! ## Atomicity
//!
//! Multi-row mutations (catalog seeding, registration, role changes with
//! their audit entry, seat booking, application review) run in one
//! transaction. Rows that gate a decision are locked with `FOR UPDATE`.

mod accounts;
mod catalog;
mod marketplace;
mod profiles;
mod users;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use shor_auth::{Permission, Role, RoleGrant, Session, UserProfile};
use shor_core::{ActionId, AuditEntryId, RoleGrantId, RoleId, SessionId, UserId};

use crate::error::{map_sqlx_error, StoreError};
use crate::model::{AuditEntry, NewAuditEntry};

/// Every repository trait on one shared pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

async fn commit(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))
}

async fn rollback(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.rollback()
        .await
        .map_err(|e| map_sqlx_error("rollback", e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Decode a TEXT column through `FromStr` (vocabulary enums, names).
pub(super) fn parse_col<T>(row: &PgRow, col: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(col)?;
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

pub(super) fn parse_opt_col<T>(row: &PgRow, col: &str) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.try_get(col)?;
    raw.map(|s| {
        s.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: col.to_string(),
            source: Box::new(e),
        })
    })
    .transpose()
}

pub(super) fn user_id_col(row: &PgRow, col: &str) -> Result<UserId, sqlx::Error> {
    Ok(UserId::from_uuid(row.try_get::<Uuid, _>(col)?))
}

pub(super) fn opt_user_id_col(row: &PgRow, col: &str) -> Result<Option<UserId>, sqlx::Error> {
    Ok(row.try_get::<Option<Uuid>, _>(col)?.map(UserId::from_uuid))
}

pub(super) fn decode<T>(
    operation: &str,
    rows: Vec<PgRow>,
    f: impl Fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, StoreError> {
    rows.iter()
        .map(|r| f(r).map_err(|e| map_sqlx_error(operation, e)))
        .collect()
}

pub(super) fn user_from_row(row: &PgRow) -> Result<UserProfile, sqlx::Error> {
    Ok(UserProfile {
        id: user_id_col(row, "id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        profile_pic: row.try_get("profile_pic")?,
        gender: row.try_get("gender")?,
        instagram: row.try_get("instagram")?,
        height: row.try_get("height")?,
        bio: row.try_get("bio")?,
        image: row.try_get("image")?,
        email_verified: row.try_get("email_verified")?,
        is_active: row.try_get("is_active")?,
        last_login_at: row.try_get("last_login_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(super) const USER_COLUMNS: &str = "id, email, name, phone, profile_pic, gender, instagram, \
    height, bio, image, email_verified, is_active, last_login_at, created_at, updated_at";

pub(super) fn session_from_row(row: &PgRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        id: SessionId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: user_id_col(row, "user_id")?,
        token: row.try_get("token")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
    })
}

/// Expects `user_roles` columns plus `role_name`.
pub(super) fn grant_from_row(row: &PgRow) -> Result<RoleGrant, sqlx::Error> {
    Ok(RoleGrant {
        id: RoleGrantId::new(row.try_get("id")?),
        user_id: user_id_col(row, "user_id")?,
        role_id: RoleId::new(row.try_get("role_id")?),
        role_name: Role::new(row.try_get::<String, _>("role_name")?),
        assigned_by: opt_user_id_col(row, "assigned_by")?,
        assigned_at: row.try_get("assigned_at")?,
        is_active: row.try_get("is_active")?,
        notes: row.try_get("notes")?,
    })
}

pub(super) fn audit_from_row(row: &PgRow) -> Result<AuditEntry, sqlx::Error> {
    Ok(AuditEntry {
        id: AuditEntryId::new(row.try_get("id")?),
        user_id: opt_user_id_col(row, "user_id")?,
        target_user_id: opt_user_id_col(row, "target_user_id")?,
        action: row.try_get("action")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: row.try_get("entity_id")?,
        old_values: row.try_get("old_values")?,
        new_values: row.try_get("new_values")?,
        metadata: row.try_get("metadata")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(super) fn permission_col(row: &PgRow, col: &str) -> Result<Permission, sqlx::Error> {
    Ok(Permission::new(row.try_get::<String, _>(col)?))
}

pub(super) fn action_id_col(row: &PgRow, col: &str) -> Result<ActionId, sqlx::Error> {
    Ok(ActionId::new(row.try_get(col)?))
}

/// Append an audit entry inside the caller's transaction.
pub(super) async fn insert_audit(
    tx: &mut Transaction<'_, Postgres>,
    entry: NewAuditEntry,
) -> Result<AuditEntry, StoreError> {
    let row = sqlx::query(
        r#"
        INSERT INTO audit_logs (
            user_id, target_user_id, action, entity_type, entity_id,
            old_values, new_values, metadata, ip_address, user_agent
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, created_at
        "#,
    )
    .bind(entry.user_id.map(|u| *u.as_uuid()))
    .bind(entry.target_user_id.map(|u| *u.as_uuid()))
    .bind(&entry.action)
    .bind(&entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.old_values)
    .bind(&entry.new_values)
    .bind(&entry.metadata)
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_audit", e))?;

    let id: i32 = row.try_get("id").map_err(|e| map_sqlx_error("insert_audit", e))?;
    let created_at = row
        .try_get("created_at")
        .map_err(|e| map_sqlx_error("insert_audit", e))?;
    Ok(entry.into_entry(AuditEntryId::new(id), created_at))
}
