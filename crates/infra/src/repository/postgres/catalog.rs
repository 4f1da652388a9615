use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{info, instrument, Span};

use shor_auth::{
    resolve::effective_roles, resolve_permissions, ActionRecord, CatalogAction, HeldRole,
    NewAction, Permission, PermissionSet, Role, RoleGrant, RoleRecord, RoleSummary, SeedOutcome,
    SeedPlan,
};
use shor_core::{RoleId, UserId};

use super::{
    action_id_col, audit_from_row, commit, decode, grant_from_row, insert_audit, parse_col,
    permission_col, rollback, PostgresStore,
};
use crate::error::{map_sqlx_error, StoreError};
use crate::model::{AuditContext, AuditEntry, AuditQuery, NewAuditEntry};
use crate::repository::{
    audit, AuditLogRepository, CatalogRepository, GrantRepository, StoreResult,
};

const ROLE_COLUMNS: &str =
    "id, name, description, is_active, created_at, updated_at";
const ACTION_COLUMNS: &str =
    "id, name, description, category, table_name, operation, is_active, created_at";
const GRANT_COLUMNS: &str = "ur.id, ur.user_id, ur.role_id, r.name AS role_name, ur.assigned_by, \
    ur.assigned_at, ur.is_active, ur.notes";

fn role_from_row(row: &PgRow) -> Result<RoleRecord, sqlx::Error> {
    Ok(RoleRecord {
        id: RoleId::new(row.try_get("id")?),
        name: Role::new(row.try_get::<String, _>("name")?),
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn action_from_row(row: &PgRow) -> Result<ActionRecord, sqlx::Error> {
    Ok(ActionRecord {
        id: action_id_col(row, "id")?,
        name: permission_col(row, "name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        table_name: row.try_get("table_name")?,
        operation: parse_col(row, "operation")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

impl PostgresStore {
    async fn catalog_actions(&self) -> StoreResult<Vec<CatalogAction>> {
        let rows = sqlx::query("SELECT name, is_active FROM actions")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("catalog_actions", e))?;
        decode("catalog_actions", rows, |r| {
            Ok(CatalogAction {
                name: permission_col(r, "name")?,
                is_active: r.try_get("is_active")?,
            })
        })
    }

    /// Explicit (active) role → action links for the given roles.
    async fn role_actions(&self, role_ids: &[i32]) -> StoreResult<HashMap<i32, Vec<Permission>>> {
        let rows = sqlx::query(
            r#"
            SELECT rp.role_id, a.name
            FROM role_permissions rp
            JOIN actions a ON a.id = rp.action_id
            WHERE rp.is_active AND rp.role_id = ANY($1)
            "#,
        )
        .bind(role_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("role_actions", e))?;

        let pairs = decode("role_actions", rows, |r| {
            Ok((r.try_get::<i32, _>("role_id")?, permission_col(r, "name")?))
        })?;
        let mut by_role: HashMap<i32, Vec<Permission>> = HashMap::new();
        for (role_id, name) in pairs {
            by_role.entry(role_id).or_default().push(name);
        }
        Ok(by_role)
    }

    async fn held_roles(&self, user: UserId) -> StoreResult<Vec<HeldRole>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, ur.is_active AS grant_active, r.is_active AS role_active
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(*user.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("held_roles", e))?;

        let roles = decode("held_roles", rows, |r| {
            Ok((
                r.try_get::<i32, _>("id")?,
                HeldRole {
                    name: Role::new(r.try_get::<String, _>("name")?),
                    grant_active: r.try_get("grant_active")?,
                    role_active: r.try_get("role_active")?,
                    actions: Vec::new(),
                },
            ))
        })?;
        let ids: Vec<i32> = roles.iter().map(|(id, _)| *id).collect();
        let mut actions = self.role_actions(&ids).await?;
        Ok(roles
            .into_iter()
            .map(|(id, mut held)| {
                held.actions = actions.remove(&id).unwrap_or_default();
                held
            })
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CatalogRepository for PostgresStore {
    #[instrument(skip(self, plan), fields(roles = plan.roles.len(), actions = plan.actions.len()), err)]
    async fn seed_catalog(&self, plan: &SeedPlan) -> StoreResult<SeedOutcome> {
        let span = Span::current();
        span.record("operation", "seed_catalog");

        let mut tx = self.begin().await?;

        // Serialize concurrent seeders; the lock is released at commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('shor_catalog_seed'))")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_lock", e))?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_count_roles", e))?;
        if existing > 0 {
            rollback(tx).await?;
            info!(existing_roles = existing, "catalog already seeded");
            return Ok(SeedOutcome::Skipped);
        }

        let mut action_ids: HashMap<&str, i32> = HashMap::with_capacity(plan.actions.len());
        for a in &plan.actions {
            let id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO actions (name, description, category, table_name, operation)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(a.name.as_str())
            .bind(&a.description)
            .bind(&a.category)
            .bind(&a.table_name)
            .bind(a.operation.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_insert_action", e))?;
            action_ids.insert(a.name.as_str(), id);
        }

        let mut grants = 0;
        for r in &plan.roles {
            let role_id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO roles (name, description)
                VALUES ($1, $2)
                RETURNING id
                "#,
            )
            .bind(r.name.as_str())
            .bind(&r.description)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_insert_role", e))?;

            for p in &r.actions {
                let Some(action_id) = action_ids.get(p.as_str()) else {
                    rollback(tx).await?;
                    return Err(StoreError::referential(format!(
                        "role '{}' grants unknown action '{p}'",
                        r.name
                    )));
                };
                sqlx::query("INSERT INTO role_permissions (role_id, action_id) VALUES ($1, $2)")
                    .bind(role_id)
                    .bind(action_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("seed_insert_grant", e))?;
                grants += 1;
            }
        }

        commit(tx).await?;
        span.record("grants", grants);
        Ok(SeedOutcome::Seeded {
            roles: plan.roles.len(),
            actions: plan.actions.len(),
            grants,
        })
    }

    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> StoreResult<Vec<RoleSummary>> {
        Span::current().record("operation", "list_roles");
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        let roles = decode("list_roles", rows, role_from_row)?;

        let ids: Vec<i32> = roles.iter().map(|r| r.id.get()).collect();
        let mut actions = self.role_actions(&ids).await?;
        let catalog = self.catalog_actions().await?;

        Ok(roles
            .into_iter()
            .map(|role| {
                let held = HeldRole {
                    name: role.name.clone(),
                    grant_active: true,
                    role_active: role.is_active,
                    actions: actions.remove(&role.id.get()).unwrap_or_default(),
                };
                RoleSummary {
                    permissions: resolve_permissions(&[held], &catalog).into_vec(),
                    role,
                }
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn find_role(&self, name: &str) -> StoreResult<Option<RoleRecord>> {
        Span::current().record("operation", "find_role");
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role", e))?;
        row.map(|r| role_from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("find_role", e))
    }

    #[instrument(skip(self), err)]
    async fn list_actions(&self) -> StoreResult<Vec<ActionRecord>> {
        Span::current().record("operation", "list_actions");
        let sql = format!("SELECT {ACTION_COLUMNS} FROM actions ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_actions", e))?;
        decode("list_actions", rows, action_from_row)
    }

    #[instrument(skip(self, ctx), fields(action = %action.name), err)]
    async fn add_action(&self, action: &NewAction, ctx: &AuditContext) -> StoreResult<ActionRecord> {
        Span::current().record("operation", "add_action");

        let mut tx = self.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO actions (name, description, category, table_name, operation)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACTION_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(action.name.as_str())
            .bind(&action.description)
            .bind(&action.category)
            .bind(&action.table_name)
            .bind(action.operation.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_action", e))?;
        let record = action_from_row(&row).map_err(|e| map_sqlx_error("add_action", e))?;
        insert_audit(&mut tx, audit::action_created(ctx, &record)).await?;
        commit(tx).await?;
        Ok(record)
    }

    #[instrument(skip(self), err)]
    async fn roles_granting(&self, permission: &str) -> StoreResult<Vec<Role>> {
        Span::current().record("operation", "roles_granting");
        let rows = sqlx::query(
            r#"
            SELECT r.name
            FROM roles r
            WHERE r.is_active
              AND EXISTS (
                SELECT 1
                FROM role_permissions rp
                JOIN actions a ON a.id = rp.action_id
                WHERE rp.role_id = r.id AND rp.is_active AND a.is_active AND a.name = $1
              )
            ORDER BY r.id
            "#,
        )
        .bind(permission)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_granting", e))?;
        decode("roles_granting", rows, |r| {
            Ok(Role::new(r.try_get::<String, _>("name")?))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grants
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl GrantRepository for PostgresStore {
    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn list_grants(&self, user: UserId) -> StoreResult<Vec<RoleGrant>> {
        Span::current().record("operation", "list_grants");
        let sql = format!(
            "SELECT {GRANT_COLUMNS} FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 ORDER BY ur.id"
        );
        let rows = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_grants", e))?;
        decode("list_grants", rows, grant_from_row)
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn active_roles(&self, user: UserId) -> StoreResult<Vec<Role>> {
        Span::current().record("operation", "active_roles");
        Ok(effective_roles(&self.held_roles(user).await?))
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn resolve_permissions(&self, user: UserId) -> StoreResult<PermissionSet> {
        let span = Span::current();
        span.record("operation", "resolve_permissions");
        let held = self.held_roles(user).await?;
        let catalog = self.catalog_actions().await?;
        let permissions = resolve_permissions(&held, &catalog);
        span.record("permission_count", permissions.len());
        Ok(permissions)
    }

    #[instrument(skip(self, notes, ctx), fields(user_id = %user), err)]
    async fn assign_role(
        &self,
        user: UserId,
        role: &str,
        notes: Option<String>,
        ctx: &AuditContext,
    ) -> StoreResult<RoleGrant> {
        Span::current().record("operation", "assign_role");

        let mut tx = self.begin().await?;

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(*user.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("assign_role", e))?;
        if !user_exists {
            rollback(tx).await?;
            return Err(StoreError::referential(format!("user {user} does not exist")));
        }

        let role_row = sqlx::query("SELECT id, name FROM roles WHERE name = $1")
            .bind(role)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("assign_role", e))?;
        let Some(role_row) = role_row else {
            rollback(tx).await?;
            return Err(StoreError::referential(format!("role '{role}' does not exist")));
        };
        let role_id: i32 = role_row.try_get("id").map_err(|e| map_sqlx_error("assign_role", e))?;

        let sql = format!(
            "SELECT {GRANT_COLUMNS} FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 AND ur.role_id = $2 FOR UPDATE OF ur"
        );
        let existing = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .bind(role_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("assign_role", e))?
            .map(|r| grant_from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("assign_role", e))?;

        if existing.as_ref().is_some_and(|g| g.is_active) {
            rollback(tx).await?;
            return Err(StoreError::conflict(format!("user already holds role '{role}'")));
        }

        let upsert = r#"
            INSERT INTO user_roles (user_id, role_id, assigned_by, notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, role_id) DO UPDATE
            SET is_active = TRUE,
                assigned_by = EXCLUDED.assigned_by,
                assigned_at = NOW(),
                notes = EXCLUDED.notes
            RETURNING id, user_id, role_id, $5::TEXT AS role_name, assigned_by, assigned_at,
                      is_active, notes
        "#;
        let row = sqlx::query(upsert)
            .bind(*user.as_uuid())
            .bind(role_id)
            .bind(ctx.actor.map(|a| *a.as_uuid()))
            .bind(&notes)
            .bind(role)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("assign_role", e))?;
        let grant = grant_from_row(&row).map_err(|e| map_sqlx_error("assign_role", e))?;

        insert_audit(&mut tx, audit::role_assigned(ctx, existing.as_ref(), &grant)).await?;
        commit(tx).await?;
        Ok(grant)
    }

    #[instrument(skip(self, ctx), fields(user_id = %user), err)]
    async fn revoke_role(&self, user: UserId, role: &str, ctx: &AuditContext) -> StoreResult<RoleGrant> {
        Span::current().record("operation", "revoke_role");

        let mut tx = self.begin().await?;
        let sql = format!(
            "SELECT {GRANT_COLUMNS} FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 AND r.name = $2 AND ur.is_active FOR UPDATE OF ur"
        );
        let row = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .bind(role)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("revoke_role", e))?;
        let Some(row) = row else {
            rollback(tx).await?;
            return Err(StoreError::not_found(format!("active grant of '{role}'")));
        };
        let before = grant_from_row(&row).map_err(|e| map_sqlx_error("revoke_role", e))?;

        sqlx::query("UPDATE user_roles SET is_active = FALSE WHERE id = $1")
            .bind(before.id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("revoke_role", e))?;
        let after = RoleGrant {
            is_active: false,
            ..before.clone()
        };

        insert_audit(&mut tx, audit::role_revoked(ctx, &before, &after)).await?;
        commit(tx).await?;
        Ok(after)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit log
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AuditLogRepository for PostgresStore {
    #[instrument(skip(self, entry), fields(action = %entry.action), err)]
    async fn append_audit(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry> {
        Span::current().record("operation", "append_audit");
        let mut tx = self.begin().await?;
        let stored = insert_audit(&mut tx, entry).await?;
        commit(tx).await?;
        Ok(stored)
    }

    #[instrument(skip(self), err)]
    async fn list_audit(&self, query: &AuditQuery) -> StoreResult<Vec<AuditEntry>> {
        Span::current().record("operation", "list_audit");
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, target_user_id, action, entity_type, entity_id,
                   old_values, new_values, metadata, ip_address, user_agent, created_at
            FROM audit_logs
            WHERE ($1::UUID IS NULL OR user_id = $1 OR target_user_id = $1)
              AND ($2::TEXT IS NULL OR action = $2)
            ORDER BY id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.user_id.map(|u| *u.as_uuid()))
        .bind(&query.action)
        .bind(query.page.limit() as i64)
        .bind(query.page.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit", e))?;
        decode("list_audit", rows, audit_from_row)
    }
}
