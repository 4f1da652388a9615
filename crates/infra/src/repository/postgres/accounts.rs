use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Row, Transaction};
use tracing::{instrument, Span};

use shor_auth::{Role, RoleGrant, Session};
use shor_core::{ArtistId, RoleGrantId, RoleId, SessionId, StudioId, UserId};

use super::{commit, decode, insert_audit, rollback, session_from_row, user_id_col, PostgresStore};
use crate::error::{is_unique_violation, map_sqlx_error, StoreError};
use crate::model::{
    Artist, AuditContext, NewAccount, NewArtist, NewExtension, NewStudio, ProvisionedAccount,
    Studio, Verification, VerificationKind,
};
use crate::repository::{audit, AccountRepository, StoreResult};

const SESSION_COLUMNS: &str =
    "id, user_id, token, expires_at, created_at, updated_at, ip_address, user_agent";

async fn insert_artist(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    artist: NewArtist,
) -> StoreResult<Artist> {
    let id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO artists (user_id, bio, experience, specialization)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(*user_id.as_uuid())
    .bind(&artist.bio)
    .bind(artist.experience)
    .bind(&artist.specialization)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_artist", e))?;
    Ok(artist.into_artist(ArtistId::new(id), user_id))
}

async fn insert_studio(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    studio: NewStudio,
) -> StoreResult<Studio> {
    let id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO studios (
            user_id, name, address, city, area, capacity, price_per_hour,
            contact_phone, contact_email
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(*user_id.as_uuid())
    .bind(&studio.name)
    .bind(&studio.address)
    .bind(&studio.city)
    .bind(&studio.area)
    .bind(studio.capacity)
    .bind(studio.price_per_hour)
    .bind(&studio.contact_phone)
    .bind(&studio.contact_email)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_studio", e))?;
    Ok(studio.into_studio(StudioId::new(id), user_id))
}

#[async_trait]
impl AccountRepository for PostgresStore {
    #[instrument(skip(self, account), fields(user_id = %account.user_id, role = %account.role), err)]
    async fn provision_account(&self, account: NewAccount) -> StoreResult<ProvisionedAccount> {
        let span = Span::current();
        span.record("operation", "provision_account");

        let mut tx = self.begin().await?;

        let role_id: Option<i32> = sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
            .bind(account.role.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("provision_account", e))?;
        let Some(role_id) = role_id else {
            rollback(tx).await?;
            return Err(StoreError::referential(format!("role '{}' does not exist", account.role)));
        };

        let now = Utc::now();
        let user_id = account.user_id;
        let email = account.user.email.clone();
        let user = account.user.into_profile(user_id, now);

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (
                id, email, name, phone, profile_pic, gender, instagram, height, bio,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            "#,
        )
        .bind(*user_id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.profile_pic)
        .bind(&user.gender)
        .bind(&user.instagram)
        .bind(&user.height)
        .bind(&user.bio)
        .bind(now)
        .execute(&mut *tx)
        .await;
        if let Err(e) = inserted {
            let err = if is_unique_violation(&e) {
                StoreError::conflict(format!("email '{email}' is already registered"))
            } else {
                map_sqlx_error("provision_account", e)
            };
            rollback(tx).await?;
            return Err(err);
        }

        sqlx::query("INSERT INTO accounts (user_id, password_hash) VALUES ($1, $2)")
            .bind(*user_id.as_uuid())
            .bind(&account.password_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("provision_account", e))?;

        let notes = "default role at registration";
        let grant_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO user_roles (user_id, role_id, assigned_at, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(*user_id.as_uuid())
        .bind(role_id)
        .bind(now)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("provision_account", e))?;
        let grant = RoleGrant {
            id: RoleGrantId::new(grant_id),
            user_id,
            role_id: RoleId::new(role_id),
            role_name: Role::new(account.role.as_str().to_string()),
            assigned_by: None,
            assigned_at: now,
            is_active: true,
            notes: Some(notes.to_string()),
        };

        let (mut artist, mut studio) = (None, None);
        match account.extension {
            Some(NewExtension::Artist(a)) => artist = Some(insert_artist(&mut tx, user_id, a).await?),
            Some(NewExtension::Studio(s)) => studio = Some(insert_studio(&mut tx, user_id, s).await?),
            None => {}
        }

        let provisioned = ProvisionedAccount {
            user,
            grant,
            artist,
            studio,
        };
        let ctx = AuditContext::new(Some(user_id), account.client);
        insert_audit(&mut tx, audit::user_registered(&ctx, &provisioned)).await?;

        commit(tx).await?;
        Ok(provisioned)
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn password_hash(&self, user: UserId) -> StoreResult<Option<String>> {
        Span::current().record("operation", "password_hash");
        sqlx::query_scalar("SELECT password_hash FROM accounts WHERE user_id = $1")
            .bind(*user.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("password_hash", e))
    }

    #[instrument(skip(self, hash), fields(user_id = %user), err)]
    async fn set_password_hash(&self, user: UserId, hash: &str) -> StoreResult<()> {
        Span::current().record("operation", "set_password_hash");
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (user_id, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET password_hash = EXCLUDED.password_hash, updated_at = NOW()
            "#,
        )
        .bind(*user.as_uuid())
        .bind(hash)
        .execute(&*self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => match map_sqlx_error("set_password_hash", e) {
                StoreError::Referential(_) => Err(StoreError::not_found(format!("user {user}"))),
                other => Err(other),
            },
        }
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id, session_id = %session.id), err)]
    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        Span::current().record("operation", "insert_session");
        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, user_id, token, expires_at, created_at, updated_at, ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*session.id.as_uuid())
        .bind(*session.user_id.as_uuid())
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_session", e))?;
        Ok(())
    }

    #[instrument(skip(self, token), err)]
    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>> {
        Span::current().record("operation", "find_session");
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token = $1");
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_session", e))?;
        row.map(|r| session_from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("find_session", e))
    }

    #[instrument(skip(self), fields(session_id = %id), err)]
    async fn extend_session(
        &self,
        id: SessionId,
        expires_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        Span::current().record("operation", "extend_session");
        sqlx::query("UPDATE sessions SET expires_at = $2, updated_at = $3 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(expires_at)
            .bind(updated_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("extend_session", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn list_sessions(&self, user: UserId) -> StoreResult<Vec<Session>> {
        Span::current().record("operation", "list_sessions");
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_sessions", e))?;
        decode("list_sessions", rows, session_from_row)
    }

    #[instrument(skip(self, token), err)]
    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        Span::current().record("operation", "delete_session");
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_session", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user, session_id = %id), err)]
    async fn delete_user_session(&self, user: UserId, id: SessionId) -> StoreResult<bool> {
        Span::current().record("operation", "delete_user_session");
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1 AND user_id = $2")
            .bind(*id.as_uuid())
            .bind(*user.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user_session", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn delete_user_sessions(&self, user: UserId, keep: Option<SessionId>) -> StoreResult<u64> {
        Span::current().record("operation", "delete_user_sessions");
        let result = sqlx::query(
            "DELETE FROM sessions WHERE user_id = $1 AND ($2::UUID IS NULL OR id <> $2)",
        )
        .bind(*user.as_uuid())
        .bind(keep.map(|k| *k.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_user_sessions", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, verification), fields(user_id = %verification.user_id), err)]
    async fn insert_verification(&self, verification: &Verification) -> StoreResult<()> {
        Span::current().record("operation", "insert_verification");
        sqlx::query(
            r#"
            INSERT INTO verifications (identifier, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (identifier) DO UPDATE
            SET user_id = EXCLUDED.user_id, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&verification.identifier)
        .bind(*verification.user_id.as_uuid())
        .bind(verification.expires_at)
        .bind(verification.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_verification", e))?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(kind = kind.prefix()), err)]
    async fn take_verification(
        &self,
        kind: VerificationKind,
        token: &str,
    ) -> StoreResult<Option<Verification>> {
        Span::current().record("operation", "take_verification");
        let row = sqlx::query(
            r#"
            DELETE FROM verifications
            WHERE identifier = $1
            RETURNING identifier, user_id, expires_at, created_at
            "#,
        )
        .bind(kind.identifier(token))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("take_verification", e))?;

        row.map(|r| {
            Ok(Verification {
                identifier: r.try_get("identifier")?,
                user_id: user_id_col(&r, "user_id")?,
                expires_at: r.try_get("expires_at")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
        .map_err(|e: sqlx::Error| map_sqlx_error("take_verification", e))
    }
}
