use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{instrument, Span};

use shor_auth::RecentActivity;
use shor_auth::session::RECENT_ACTIVITY_LIMIT;
use shor_core::{ArtistId, ClassLevel, DanceForm, StudentId, StudioId, UserId};

use super::{commit, parse_opt_col, user_id_col, PostgresStore};
use crate::error::{map_sqlx_error, StoreError};
use crate::model::{Artist, ArtistUpdate, Student, StudentUpdate, Studio, StudioUpdate};
use crate::repository::{ProfileRepository, StoreResult};

const ARTIST_COLUMNS: &str = "id, user_id, bio, experience, specialization, portfolio, \
    rate_per_hour, rate_per_class, teaching_style, is_verified, rating, total_ratings";
pub(super) const STUDIO_COLUMNS: &str = "id, user_id, name, address, city, area, pincode, \
    capacity, price_per_hour, rental_fee_per_class, description, contact_phone, contact_email, \
    latitude, longitude, is_verified, is_active";
const STUDENT_COLUMNS: &str =
    "id, user_id, dance_experience, preferred_dance_forms, skill_level, goals, is_active";

fn artist_from_row(row: &PgRow) -> Result<Artist, sqlx::Error> {
    Ok(Artist {
        id: ArtistId::new(row.try_get("id")?),
        user_id: user_id_col(row, "user_id")?,
        bio: row.try_get("bio")?,
        experience: row.try_get("experience")?,
        specialization: row.try_get("specialization")?,
        portfolio: row.try_get("portfolio")?,
        rate_per_hour: row.try_get("rate_per_hour")?,
        rate_per_class: row.try_get("rate_per_class")?,
        teaching_style: row.try_get("teaching_style")?,
        is_verified: row.try_get("is_verified")?,
        rating: row.try_get("rating")?,
        total_ratings: row.try_get("total_ratings")?,
    })
}

pub(super) fn studio_from_row(row: &PgRow) -> Result<Studio, sqlx::Error> {
    Ok(Studio {
        id: StudioId::new(row.try_get("id")?),
        user_id: user_id_col(row, "user_id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        area: row.try_get("area")?,
        pincode: row.try_get("pincode")?,
        capacity: row.try_get("capacity")?,
        price_per_hour: row.try_get("price_per_hour")?,
        rental_fee_per_class: row.try_get("rental_fee_per_class")?,
        description: row.try_get("description")?,
        contact_phone: row.try_get("contact_phone")?,
        contact_email: row.try_get("contact_email")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        is_verified: row.try_get("is_verified")?,
        is_active: row.try_get("is_active")?,
    })
}

fn student_from_row(row: &PgRow) -> Result<Student, sqlx::Error> {
    let forms: Vec<String> = row.try_get("preferred_dance_forms")?;
    let preferred_dance_forms = forms
        .iter()
        .map(|f| f.parse::<DanceForm>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "preferred_dance_forms".into(),
            source: Box::new(e),
        })?;
    Ok(Student {
        id: StudentId::new(row.try_get("id")?),
        user_id: user_id_col(row, "user_id")?,
        dance_experience: row.try_get("dance_experience")?,
        preferred_dance_forms,
        skill_level: parse_opt_col::<ClassLevel>(row, "skill_level")?,
        goals: row.try_get("goals")?,
        is_active: row.try_get("is_active")?,
    })
}

impl PostgresStore {
    async fn fetch_by_user<T>(
        &self,
        operation: &str,
        sql: &str,
        user: UserId,
        f: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<Option<T>> {
        let row = sqlx::query(sql)
            .bind(*user.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.map(|r| f(&r))
            .transpose()
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn count_recent(&self, operation: &str, sql: &str, user: UserId) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar(sql)
            .bind(*user.as_uuid())
            .bind(RECENT_ACTIVITY_LIMIT as i64)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl ProfileRepository for PostgresStore {
    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn find_artist_by_user(&self, user: UserId) -> StoreResult<Option<Artist>> {
        Span::current().record("operation", "find_artist_by_user");
        let sql = format!("SELECT {ARTIST_COLUMNS} FROM artists WHERE user_id = $1");
        self.fetch_by_user("find_artist_by_user", &sql, user, artist_from_row).await
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn find_studio_by_user(&self, user: UserId) -> StoreResult<Option<Studio>> {
        Span::current().record("operation", "find_studio_by_user");
        let sql = format!("SELECT {STUDIO_COLUMNS} FROM studios WHERE user_id = $1");
        self.fetch_by_user("find_studio_by_user", &sql, user, studio_from_row).await
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn find_student_by_user(&self, user: UserId) -> StoreResult<Option<Student>> {
        Span::current().record("operation", "find_student_by_user");
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE user_id = $1");
        self.fetch_by_user("find_student_by_user", &sql, user, student_from_row).await
    }

    #[instrument(skip(self, update), fields(user_id = %user), err)]
    async fn update_artist(&self, user: UserId, update: &ArtistUpdate) -> StoreResult<Artist> {
        Span::current().record("operation", "update_artist");

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {ARTIST_COLUMNS} FROM artists WHERE user_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_artist", e))?
            .ok_or_else(|| StoreError::not_found("artist profile"))?;
        let mut artist = artist_from_row(&row).map_err(|e| map_sqlx_error("update_artist", e))?;
        update.apply(&mut artist);

        sqlx::query(
            r#"
            UPDATE artists
            SET bio = $2, experience = $3, specialization = $4, portfolio = $5,
                rate_per_hour = $6, rate_per_class = $7, teaching_style = $8
            WHERE id = $1
            "#,
        )
        .bind(artist.id.get())
        .bind(&artist.bio)
        .bind(artist.experience)
        .bind(&artist.specialization)
        .bind(&artist.portfolio)
        .bind(artist.rate_per_hour)
        .bind(artist.rate_per_class)
        .bind(&artist.teaching_style)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_artist", e))?;

        commit(tx).await?;
        Ok(artist)
    }

    #[instrument(skip(self, update), fields(user_id = %user), err)]
    async fn update_studio(&self, user: UserId, update: &StudioUpdate) -> StoreResult<Studio> {
        Span::current().record("operation", "update_studio");

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {STUDIO_COLUMNS} FROM studios WHERE user_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_studio", e))?
            .ok_or_else(|| StoreError::not_found("studio profile"))?;
        let mut studio = studio_from_row(&row).map_err(|e| map_sqlx_error("update_studio", e))?;
        update.apply(&mut studio);

        sqlx::query(
            r#"
            UPDATE studios
            SET name = $2, address = $3, city = $4, area = $5, pincode = $6, capacity = $7,
                price_per_hour = $8, rental_fee_per_class = $9, description = $10,
                contact_phone = $11, contact_email = $12, latitude = $13, longitude = $14
            WHERE id = $1
            "#,
        )
        .bind(studio.id.get())
        .bind(&studio.name)
        .bind(&studio.address)
        .bind(&studio.city)
        .bind(&studio.area)
        .bind(&studio.pincode)
        .bind(studio.capacity)
        .bind(studio.price_per_hour)
        .bind(studio.rental_fee_per_class)
        .bind(&studio.description)
        .bind(&studio.contact_phone)
        .bind(&studio.contact_email)
        .bind(studio.latitude)
        .bind(studio.longitude)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_studio", e))?;

        commit(tx).await?;
        Ok(studio)
    }

    #[instrument(skip(self, update), fields(user_id = %user), err)]
    async fn upsert_student(&self, user: UserId, update: &StudentUpdate) -> StoreResult<Student> {
        Span::current().record("operation", "upsert_student");

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE user_id = $1 FOR UPDATE");
        let existing = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_student", e))?
            .map(|r| student_from_row(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("upsert_student", e))?;

        let student = match existing {
            Some(mut s) => {
                update.apply(&mut s);
                s
            }
            // id comes back from the insert below
            None => update.into_student(StudentId::new(0), user),
        };
        let forms: Vec<&str> = student.preferred_dance_forms.iter().map(|f| f.as_str()).collect();

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO students (user_id, dance_experience, preferred_dance_forms, skill_level, goals)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET dance_experience = EXCLUDED.dance_experience,
                preferred_dance_forms = EXCLUDED.preferred_dance_forms,
                skill_level = EXCLUDED.skill_level,
                goals = EXCLUDED.goals
            RETURNING id
            "#,
        )
        .bind(*user.as_uuid())
        .bind(&student.dance_experience)
        .bind(&forms)
        .bind(student.skill_level.map(|l| l.as_str()))
        .bind(&student.goals)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_student", e))?;

        commit(tx).await?;
        Ok(Student {
            id: StudentId::new(id),
            ..student
        })
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn recent_activity(&self, user: UserId) -> StoreResult<RecentActivity> {
        Span::current().record("operation", "recent_activity");
        let class_bookings = self
            .count_recent(
                "recent_class_bookings",
                "SELECT COUNT(*) FROM (SELECT 1 FROM class_bookings WHERE user_id = $1 LIMIT $2) t",
                user,
            )
            .await?;
        let studio_bookings = self
            .count_recent(
                "recent_studio_bookings",
                "SELECT COUNT(*) FROM (SELECT 1 FROM studio_bookings WHERE user_id = $1 LIMIT $2) t",
                user,
            )
            .await?;
        let gig_applications = self
            .count_recent(
                "recent_gig_applications",
                "SELECT COUNT(*) FROM (SELECT 1 FROM gig_applications WHERE user_id = $1 LIMIT $2) t",
                user,
            )
            .await?;
        Ok(RecentActivity::capped(class_bookings, studio_bookings, gig_applications))
    }
}
