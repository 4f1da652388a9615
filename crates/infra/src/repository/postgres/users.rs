use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{instrument, Span};

use shor_auth::{ProfileUpdate, UserProfile};
use shor_core::UserId;

use super::{commit, insert_audit, user_from_row, PostgresStore, USER_COLUMNS};
use crate::error::{map_sqlx_error, StoreError};
use crate::model::AuditContext;
use crate::repository::{audit, StoreResult, UserRepository};

impl PostgresStore {
    async fn fetch_user(&self, operation: &str, sql: &str, key: UserKey<'_>) -> StoreResult<Option<UserProfile>> {
        let query = sqlx::query(sql);
        let query = match key {
            UserKey::Id(id) => query.bind(*id.as_uuid()),
            UserKey::Email(email) => query.bind(email.to_string()),
        };
        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.map(|r| user_from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

enum UserKey<'a> {
    Id(UserId),
    Email(&'a str),
}

#[async_trait]
impl UserRepository for PostgresStore {
    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_user(&self, id: UserId) -> StoreResult<Option<UserProfile>> {
        Span::current().record("operation", "find_user");
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_user("find_user", &sql, UserKey::Id(id)).await
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>> {
        Span::current().record("operation", "find_user_by_email");
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.fetch_user("find_user_by_email", &sql, UserKey::Email(email)).await
    }

    #[instrument(skip(self, update), fields(user_id = %id), err)]
    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> StoreResult<UserProfile> {
        Span::current().record("operation", "update_profile");

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_profile", e))?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        let mut user = user_from_row(&row).map_err(|e| map_sqlx_error("update_profile", e))?;
        update.apply(&mut user, Utc::now());

        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, phone = $3, profile_pic = $4, gender = $5,
                instagram = $6, height = $7, bio = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.profile_pic)
        .bind(&user.gender)
        .bind(&user.instagram)
        .bind(&user.height)
        .bind(&user.bio)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_profile", e))?;

        commit(tx).await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        Span::current().record("operation", "record_login");
        sqlx::query("UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("record_login", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn mark_email_verified(&self, id: UserId) -> StoreResult<UserProfile> {
        Span::current().record("operation", "mark_email_verified");
        let sql = format!(
            "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_email_verified", e))?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        user_from_row(&row).map_err(|e| map_sqlx_error("mark_email_verified", e))
    }

    #[instrument(skip(self, ctx), fields(user_id = %id), err)]
    async fn deactivate_user(&self, id: UserId, ctx: &AuditContext) -> StoreResult<UserProfile> {
        Span::current().record("operation", "deactivate_user");

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("deactivate_user", e))?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        let before = user_from_row(&row).map_err(|e| map_sqlx_error("deactivate_user", e))?;

        let mut after = before.clone();
        after.is_active = false;
        after.updated_at = Utc::now();

        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = $2 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(after.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("deactivate_user", e))?;
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("deactivate_user", e))?;
        insert_audit(&mut tx, audit::user_deactivated(ctx, &before)).await?;

        commit(tx).await?;
        Ok(after)
    }
}
