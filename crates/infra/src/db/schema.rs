//! Idempotent DDL for the marketplace schema.
//!
//! Every statement is `IF NOT EXISTS` / `OR REPLACE`, so bootstrapping an
//! already provisioned database is a no-op. Enumerated columns are TEXT with
//! CHECK constraints matching the string forms in `shor_core::vocab`.

use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::{map_sqlx_error, StoreError};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id              UUID PRIMARY KEY,
    email           TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL,
    phone           TEXT,
    profile_pic     TEXT,
    gender          TEXT,
    instagram       TEXT,
    height          TEXT,
    bio             TEXT,
    image           TEXT,
    email_verified  BOOLEAN NOT NULL DEFAULT FALSE,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    last_login_at   TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS accounts (
    user_id         UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    provider_id     TEXT NOT NULL DEFAULT 'credential',
    password_hash   TEXT NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS sessions (
    id              UUID PRIMARY KEY,
    user_id         UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token           TEXT NOT NULL UNIQUE,
    expires_at      TIMESTAMPTZ NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL,
    ip_address      TEXT,
    user_agent      TEXT
);
CREATE INDEX IF NOT EXISTS sessions_user_idx ON sessions (user_id);

CREATE TABLE IF NOT EXISTS verifications (
    identifier      TEXT PRIMARY KEY,
    user_id         UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    expires_at      TIMESTAMPTZ NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS roles (
    id              SERIAL PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE,
    description     TEXT,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS actions (
    id              SERIAL PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE,
    description     TEXT,
    category        TEXT NOT NULL,
    table_name      TEXT,
    operation       TEXT NOT NULL CHECK (operation IN ('create', 'read', 'update', 'delete', 'manage')),
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS role_permissions (
    id              SERIAL PRIMARY KEY,
    role_id         INTEGER NOT NULL REFERENCES roles(id),
    action_id       INTEGER NOT NULL REFERENCES actions(id),
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    UNIQUE (role_id, action_id)
);

CREATE TABLE IF NOT EXISTS user_roles (
    id              SERIAL PRIMARY KEY,
    user_id         UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id         INTEGER NOT NULL REFERENCES roles(id),
    assigned_by     UUID REFERENCES users(id),
    assigned_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    notes           TEXT,
    UNIQUE (user_id, role_id)
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id              SERIAL PRIMARY KEY,
    user_id         UUID,
    target_user_id  UUID,
    action          TEXT NOT NULL,
    entity_type     TEXT NOT NULL,
    entity_id       TEXT,
    old_values      JSONB,
    new_values      JSONB,
    metadata        JSONB,
    ip_address      TEXT,
    user_agent      TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE OR REPLACE FUNCTION audit_logs_append_only() RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'audit_logs is append-only';
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS audit_logs_no_mutation ON audit_logs;
CREATE TRIGGER audit_logs_no_mutation
    BEFORE UPDATE OR DELETE ON audit_logs
    FOR EACH ROW EXECUTE FUNCTION audit_logs_append_only();

CREATE TABLE IF NOT EXISTS artists (
    id              SERIAL PRIMARY KEY,
    user_id         UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    bio             TEXT NOT NULL,
    experience      INTEGER NOT NULL DEFAULT 0,
    specialization  TEXT NOT NULL,
    portfolio       TEXT,
    rate_per_hour   INTEGER,
    rate_per_class  INTEGER,
    teaching_style  TEXT,
    is_verified     BOOLEAN NOT NULL DEFAULT FALSE,
    rating          REAL NOT NULL DEFAULT 0,
    total_ratings   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS studios (
    id                    SERIAL PRIMARY KEY,
    user_id               UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    name                  TEXT NOT NULL,
    address               TEXT NOT NULL,
    city                  TEXT NOT NULL,
    area                  TEXT NOT NULL,
    pincode               TEXT,
    capacity              INTEGER NOT NULL CHECK (capacity >= 0),
    price_per_hour        INTEGER NOT NULL CHECK (price_per_hour >= 0),
    rental_fee_per_class  INTEGER NOT NULL DEFAULT 20000,
    description           TEXT,
    contact_phone         TEXT NOT NULL,
    contact_email         TEXT NOT NULL,
    latitude              DOUBLE PRECISION,
    longitude             DOUBLE PRECISION,
    is_verified           BOOLEAN NOT NULL DEFAULT FALSE,
    is_active             BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS students (
    id                     SERIAL PRIMARY KEY,
    user_id                UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    dance_experience       TEXT,
    preferred_dance_forms  TEXT[] NOT NULL DEFAULT '{}',
    skill_level            TEXT CHECK (skill_level IN ('beginner', 'intermediate', 'advanced', 'all')),
    goals                  TEXT,
    is_active              BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS classes (
    id                    SERIAL PRIMARY KEY,
    title                 TEXT NOT NULL,
    class_type            TEXT NOT NULL CHECK (class_type IN ('workshop', 'regular', 'bundle')),
    style                 TEXT NOT NULL,
    level                 TEXT NOT NULL CHECK (level IN ('beginner', 'intermediate', 'advanced', 'all')),
    artist_id             INTEGER NOT NULL REFERENCES artists(id),
    studio_id             INTEGER NOT NULL REFERENCES studios(id),
    date                  DATE NOT NULL,
    start_time            TIME NOT NULL,
    end_time              TIME NOT NULL,
    early_bird_price      INTEGER,
    regular_price         INTEGER NOT NULL CHECK (regular_price >= 0),
    group_price           INTEGER,
    max_participants      INTEGER NOT NULL CHECK (max_participants > 0),
    current_participants  INTEGER NOT NULL DEFAULT 0 CHECK (current_participants >= 0),
    description           TEXT NOT NULL,
    image                 TEXT,
    is_active             BOOLEAN NOT NULL DEFAULT TRUE,
    created_at            TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CHECK (current_participants <= max_participants),
    CHECK (end_time > start_time)
);

CREATE TABLE IF NOT EXISTS class_bookings (
    id              SERIAL PRIMARY KEY,
    user_id         UUID NOT NULL REFERENCES users(id),
    class_id        INTEGER NOT NULL REFERENCES classes(id),
    price           INTEGER NOT NULL,
    status          TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'cancelled', 'completed')),
    booking_code    TEXT NOT NULL UNIQUE,
    notes           TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE UNIQUE INDEX IF NOT EXISTS class_bookings_active_idx
    ON class_bookings (class_id, user_id)
    WHERE status IN ('pending', 'confirmed');

CREATE TABLE IF NOT EXISTS studio_bookings (
    id              SERIAL PRIMARY KEY,
    user_id         UUID NOT NULL REFERENCES users(id),
    studio_id       INTEGER NOT NULL REFERENCES studios(id),
    booking_date    DATE NOT NULL,
    start_time      TIME NOT NULL,
    end_time        TIME NOT NULL,
    price           INTEGER NOT NULL,
    status          TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'cancelled', 'completed')),
    booking_code    TEXT NOT NULL UNIQUE,
    notes           TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CHECK (end_time > start_time)
);

CREATE TABLE IF NOT EXISTS gigs (
    id              SERIAL PRIMARY KEY,
    host_id         UUID NOT NULL REFERENCES users(id),
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    requirements    TEXT NOT NULL,
    location        TEXT NOT NULL,
    city            TEXT NOT NULL,
    date            DATE NOT NULL,
    start_time      TIME,
    end_time        TIME,
    payment         INTEGER,
    spots           INTEGER NOT NULL CHECK (spots > 0),
    filled_spots    INTEGER NOT NULL DEFAULT 0,
    status          TEXT NOT NULL CHECK (status IN ('open', 'closed', 'filled', 'cancelled')),
    dance_form      TEXT,
    skill_level     TEXT,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CHECK (filled_spots <= spots)
);

CREATE TABLE IF NOT EXISTS gig_applications (
    id                SERIAL PRIMARY KEY,
    gig_id            INTEGER NOT NULL REFERENCES gigs(id),
    user_id           UUID NOT NULL REFERENCES users(id),
    status            TEXT NOT NULL CHECK (status IN ('applied', 'accepted', 'rejected')),
    applied_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    message           TEXT,
    portfolio         TEXT,
    experience        TEXT,
    expected_payment  INTEGER,
    reviewed_at       TIMESTAMPTZ,
    reviewed_by       UUID REFERENCES users(id),
    review_notes      TEXT,
    UNIQUE (gig_id, user_id)
);
"#;

/// Apply [`SCHEMA`] to the database.
#[instrument(skip(pool), err)]
pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("bootstrap_schema", e))?;
    info!("database schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent_ddl() {
        for line in SCHEMA.lines().map(str::trim) {
            if line.starts_with("CREATE TABLE") || line.starts_with("CREATE UNIQUE INDEX") || line.starts_with("CREATE INDEX") {
                assert!(line.contains("IF NOT EXISTS"), "non-idempotent statement: {line}");
            }
        }
    }

    #[test]
    fn audit_log_is_guarded_against_mutation() {
        assert!(SCHEMA.contains("BEFORE UPDATE OR DELETE ON audit_logs"));
    }
}
