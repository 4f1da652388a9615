use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{instrument, Span};

use shor_core::{
    ApplicationStatus, ArtistId, BookingStatus, ClassBookingId, ClassId, GigApplicationId, GigId,
    StudioBookingId, StudioId, UserId,
};

use super::profiles::{studio_from_row, STUDIO_COLUMNS};
use super::{
    commit, decode, opt_user_id_col, parse_col, parse_opt_col, rollback, user_id_col,
    PostgresStore,
};
use crate::error::{is_unique_violation, map_sqlx_error, StoreError};
use crate::model::marketplace::booking_code;
use crate::model::{
    ApplicationReview, Class, ClassBooking, ClassFilter, Gig, GigApplication, GigFilter, NewClass,
    NewClassBooking, NewGig, NewGigApplication, NewStudioBooking, Page, Studio, StudioBooking,
    StudioFilter,
};
use crate::repository::{MarketplaceRepository, StoreResult};

const CLASS_COLUMNS: &str = "id, title, class_type, style, level, artist_id, studio_id, date, \
    start_time, end_time, early_bird_price, regular_price, group_price, max_participants, \
    current_participants, description, image, is_active, created_at";
const CLASS_BOOKING_COLUMNS: &str =
    "id, user_id, class_id, price, status, booking_code, notes, created_at";
const STUDIO_BOOKING_COLUMNS: &str = "id, user_id, studio_id, booking_date, start_time, end_time, \
    price, status, booking_code, notes, created_at";
const GIG_COLUMNS: &str = "id, host_id, title, description, requirements, location, city, date, \
    start_time, end_time, payment, spots, filled_spots, status, dance_form, skill_level, \
    is_active, created_at";
const APPLICATION_COLUMNS: &str = "id, gig_id, user_id, status, applied_at, message, portfolio, \
    experience, expected_payment, reviewed_at, reviewed_by, review_notes";

fn class_from_row(row: &PgRow) -> Result<Class, sqlx::Error> {
    Ok(Class {
        id: ClassId::new(row.try_get("id")?),
        title: row.try_get("title")?,
        class_type: parse_col(row, "class_type")?,
        style: parse_col(row, "style")?,
        level: parse_col(row, "level")?,
        artist_id: ArtistId::new(row.try_get("artist_id")?),
        studio_id: StudioId::new(row.try_get("studio_id")?),
        date: row.try_get("date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        early_bird_price: row.try_get("early_bird_price")?,
        regular_price: row.try_get("regular_price")?,
        group_price: row.try_get("group_price")?,
        max_participants: row.try_get("max_participants")?,
        current_participants: row.try_get("current_participants")?,
        description: row.try_get("description")?,
        image: row.try_get("image")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn class_booking_from_row(row: &PgRow) -> Result<ClassBooking, sqlx::Error> {
    Ok(ClassBooking {
        id: ClassBookingId::new(row.try_get("id")?),
        user_id: user_id_col(row, "user_id")?,
        class_id: ClassId::new(row.try_get("class_id")?),
        price: row.try_get("price")?,
        status: parse_col(row, "status")?,
        booking_code: row.try_get("booking_code")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn studio_booking_from_row(row: &PgRow) -> Result<StudioBooking, sqlx::Error> {
    Ok(StudioBooking {
        id: StudioBookingId::new(row.try_get("id")?),
        user_id: user_id_col(row, "user_id")?,
        studio_id: StudioId::new(row.try_get("studio_id")?),
        booking_date: row.try_get("booking_date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        price: row.try_get("price")?,
        status: parse_col(row, "status")?,
        booking_code: row.try_get("booking_code")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn gig_from_row(row: &PgRow) -> Result<Gig, sqlx::Error> {
    Ok(Gig {
        id: GigId::new(row.try_get("id")?),
        host_id: user_id_col(row, "host_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        requirements: row.try_get("requirements")?,
        location: row.try_get("location")?,
        city: row.try_get("city")?,
        date: row.try_get("date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        payment: row.try_get("payment")?,
        spots: row.try_get("spots")?,
        filled_spots: row.try_get("filled_spots")?,
        status: parse_col(row, "status")?,
        dance_form: parse_opt_col(row, "dance_form")?,
        skill_level: parse_opt_col(row, "skill_level")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn application_from_row(row: &PgRow) -> Result<GigApplication, sqlx::Error> {
    Ok(GigApplication {
        id: GigApplicationId::new(row.try_get("id")?),
        gig_id: GigId::new(row.try_get("gig_id")?),
        user_id: user_id_col(row, "user_id")?,
        status: parse_col(row, "status")?,
        applied_at: row.try_get("applied_at")?,
        message: row.try_get("message")?,
        portfolio: row.try_get("portfolio")?,
        experience: row.try_get("experience")?,
        expected_payment: row.try_get("expected_payment")?,
        reviewed_at: row.try_get("reviewed_at")?,
        reviewed_by: opt_user_id_col(row, "reviewed_by")?,
        review_notes: row.try_get("review_notes")?,
    })
}

impl PostgresStore {
    /// `SELECT <columns> FROM <table> WHERE id = $1`.
    async fn find_by_id<T>(
        &self,
        operation: &str,
        columns: &str,
        table: &str,
        id: i32,
        f: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<Option<T>> {
        let sql = format!("SELECT {columns} FROM {table} WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.map(|r| f(&r))
            .transpose()
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Rows owned by `user`, newest first.
    async fn list_by_user<T>(
        &self,
        operation: &str,
        columns: &str,
        table: &str,
        user: UserId,
        f: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<Vec<T>> {
        let sql = format!("SELECT {columns} FROM {table} WHERE user_id = $1 ORDER BY id DESC");
        let rows = sqlx::query(&sql)
            .bind(*user.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        decode(operation, rows, f)
    }
}

#[async_trait]
impl MarketplaceRepository for PostgresStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Studios
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self), err)]
    async fn list_studios(&self, filter: &StudioFilter, page: Page) -> StoreResult<Vec<Studio>> {
        Span::current().record("operation", "list_studios");
        let sql = format!(
            r#"
            SELECT {STUDIO_COLUMNS}
            FROM studios
            WHERE is_active AND ($1::TEXT IS NULL OR LOWER(city) = LOWER($1))
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(&filter.city)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_studios", e))?;
        decode("list_studios", rows, studio_from_row)
    }

    #[instrument(skip(self), fields(studio_id = %id), err)]
    async fn find_studio(&self, id: StudioId) -> StoreResult<Option<Studio>> {
        Span::current().record("operation", "find_studio");
        self.find_by_id("find_studio", STUDIO_COLUMNS, "studios", id.get(), studio_from_row)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Classes
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self), err)]
    async fn list_classes(&self, filter: &ClassFilter, page: Page) -> StoreResult<Vec<Class>> {
        Span::current().record("operation", "list_classes");
        let sql = format!(
            r#"
            SELECT {CLASS_COLUMNS}
            FROM classes
            WHERE is_active
              AND ($1::TEXT IS NULL OR style = $1)
              AND ($2::TEXT IS NULL OR level = $2)
              AND ($3::INTEGER IS NULL OR studio_id = $3)
              AND ($4::INTEGER IS NULL OR artist_id = $4)
            ORDER BY date, start_time, id
            LIMIT $5 OFFSET $6
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.style.map(|s| s.as_str()))
            .bind(filter.level.map(|l| l.as_str()))
            .bind(filter.studio_id.map(|s| s.get()))
            .bind(filter.artist_id.map(|a| a.get()))
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_classes", e))?;
        decode("list_classes", rows, class_from_row)
    }

    #[instrument(skip(self), fields(class_id = %id), err)]
    async fn find_class(&self, id: ClassId) -> StoreResult<Option<Class>> {
        Span::current().record("operation", "find_class");
        self.find_by_id("find_class", CLASS_COLUMNS, "classes", id.get(), class_from_row)
            .await
    }

    #[instrument(skip(self, class), fields(studio_id = %class.studio_id), err)]
    async fn create_class(&self, class: NewClass) -> StoreResult<Class> {
        Span::current().record("operation", "create_class");
        class.validate()?;
        let artist_id = class.artist()?;

        let mut tx = self.begin().await?;
        let studio_active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM studios WHERE id = $1")
            .bind(class.studio_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_class", e))?;
        if studio_active != Some(true) {
            rollback(tx).await?;
            return Err(StoreError::referential(format!("studio {} does not exist", class.studio_id)));
        }

        let sql = format!(
            r#"
            INSERT INTO classes (
                title, class_type, style, level, artist_id, studio_id, date, start_time, end_time,
                early_bird_price, regular_price, group_price, max_participants, description, image
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {CLASS_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&class.title)
            .bind(class.class_type.as_str())
            .bind(class.style.as_str())
            .bind(class.level.as_str())
            .bind(artist_id.get())
            .bind(class.studio_id.get())
            .bind(class.date)
            .bind(class.start_time)
            .bind(class.end_time)
            .bind(class.early_bird_price)
            .bind(class.regular_price)
            .bind(class.group_price)
            .bind(class.max_participants)
            .bind(&class.description)
            .bind(&class.image)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_class", e))?;
        let created = class_from_row(&row).map_err(|e| map_sqlx_error("create_class", e))?;

        commit(tx).await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(class_id = %id), err)]
    async fn deactivate_class(&self, id: ClassId) -> StoreResult<Class> {
        Span::current().record("operation", "deactivate_class");
        let sql = format!("UPDATE classes SET is_active = FALSE WHERE id = $1 RETURNING {CLASS_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("deactivate_class", e))?
            .ok_or_else(|| StoreError::not_found(format!("class {id}")))?;
        class_from_row(&row).map_err(|e| map_sqlx_error("deactivate_class", e))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Class bookings
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, booking), fields(class_id = %booking.class_id, user_id = %booking.user_id), err)]
    async fn book_class(&self, booking: NewClassBooking) -> StoreResult<ClassBooking> {
        Span::current().record("operation", "book_class");

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1 AND is_active FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(booking.class_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("book_class", e))?;
        let Some(row) = row else {
            rollback(tx).await?;
            return Err(StoreError::not_found(format!("class {}", booking.class_id)));
        };
        let class = class_from_row(&row).map_err(|e| map_sqlx_error("book_class", e))?;

        let already: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM class_bookings
                WHERE class_id = $1 AND user_id = $2 AND status IN ('pending', 'confirmed')
            )
            "#,
        )
        .bind(class.id.get())
        .bind(*booking.user_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("book_class", e))?;
        if already {
            rollback(tx).await?;
            return Err(StoreError::conflict("class already booked"));
        }
        if !class.has_seat() {
            rollback(tx).await?;
            return Err(StoreError::conflict("class is full"));
        }

        sqlx::query("UPDATE classes SET current_participants = current_participants + 1 WHERE id = $1")
            .bind(class.id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("book_class", e))?;

        let sql = format!(
            r#"
            INSERT INTO class_bookings (user_id, class_id, price, status, booking_code, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CLASS_BOOKING_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(*booking.user_id.as_uuid())
            .bind(class.id.get())
            .bind(class.regular_price)
            .bind(BookingStatus::Confirmed.as_str())
            .bind(booking_code("CB"))
            .bind(&booking.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("book_class", e))?;
        let created = class_booking_from_row(&row).map_err(|e| map_sqlx_error("book_class", e))?;

        commit(tx).await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(booking_id = %id), err)]
    async fn find_class_booking(&self, id: ClassBookingId) -> StoreResult<Option<ClassBooking>> {
        Span::current().record("operation", "find_class_booking");
        self.find_by_id(
            "find_class_booking",
            CLASS_BOOKING_COLUMNS,
            "class_bookings",
            id.get(),
            class_booking_from_row,
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn list_class_bookings(&self, user: UserId) -> StoreResult<Vec<ClassBooking>> {
        Span::current().record("operation", "list_class_bookings");
        self.list_by_user(
            "list_class_bookings",
            CLASS_BOOKING_COLUMNS,
            "class_bookings",
            user,
            class_booking_from_row,
        )
        .await
    }

    #[instrument(skip(self), fields(booking_id = %id), err)]
    async fn cancel_class_booking(&self, id: ClassBookingId) -> StoreResult<ClassBooking> {
        Span::current().record("operation", "cancel_class_booking");

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {CLASS_BOOKING_COLUMNS} FROM class_bookings WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("cancel_class_booking", e))?;
        let Some(row) = row else {
            rollback(tx).await?;
            return Err(StoreError::not_found(format!("class booking {id}")));
        };
        let mut booking =
            class_booking_from_row(&row).map_err(|e| map_sqlx_error("cancel_class_booking", e))?;
        if !booking.status.is_active() {
            rollback(tx).await?;
            return Err(StoreError::conflict(format!("booking is already {}", booking.status)));
        }
        booking.status = BookingStatus::Cancelled;

        sqlx::query("UPDATE class_bookings SET status = $2 WHERE id = $1")
            .bind(id.get())
            .bind(booking.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("cancel_class_booking", e))?;
        sqlx::query(
            "UPDATE classes SET current_participants = GREATEST(current_participants - 1, 0) WHERE id = $1",
        )
        .bind(booking.class_id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("cancel_class_booking", e))?;

        commit(tx).await?;
        Ok(booking)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Studio bookings
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, booking), fields(studio_id = %booking.studio_id, user_id = %booking.user_id), err)]
    async fn book_studio(&self, booking: NewStudioBooking) -> StoreResult<StudioBooking> {
        Span::current().record("operation", "book_studio");
        booking.validate()?;

        let mut tx = self.begin().await?;
        // Locking the studio row serializes concurrent bookings of the same studio.
        let sql = format!("SELECT {STUDIO_COLUMNS} FROM studios WHERE id = $1 AND is_active FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(booking.studio_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("book_studio", e))?;
        let Some(row) = row else {
            rollback(tx).await?;
            return Err(StoreError::not_found(format!("studio {}", booking.studio_id)));
        };
        let studio = studio_from_row(&row).map_err(|e| map_sqlx_error("book_studio", e))?;

        let clash: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM studio_bookings
                WHERE studio_id = $1
                  AND booking_date = $2
                  AND status IN ('pending', 'confirmed')
                  AND start_time < $4
                  AND $3 < end_time
            )
            "#,
        )
        .bind(studio.id.get())
        .bind(booking.booking_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("book_studio", e))?;
        if clash {
            rollback(tx).await?;
            return Err(StoreError::conflict("studio is already booked for that slot"));
        }

        let sql = format!(
            r#"
            INSERT INTO studio_bookings (
                user_id, studio_id, booking_date, start_time, end_time, price, status,
                booking_code, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {STUDIO_BOOKING_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(*booking.user_id.as_uuid())
            .bind(studio.id.get())
            .bind(booking.booking_date)
            .bind(booking.start_time)
            .bind(booking.end_time)
            .bind(booking.price(studio.price_per_hour))
            .bind(BookingStatus::Confirmed.as_str())
            .bind(booking_code("SB"))
            .bind(&booking.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("book_studio", e))?;
        let created = studio_booking_from_row(&row).map_err(|e| map_sqlx_error("book_studio", e))?;

        commit(tx).await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(booking_id = %id), err)]
    async fn find_studio_booking(&self, id: StudioBookingId) -> StoreResult<Option<StudioBooking>> {
        Span::current().record("operation", "find_studio_booking");
        self.find_by_id(
            "find_studio_booking",
            STUDIO_BOOKING_COLUMNS,
            "studio_bookings",
            id.get(),
            studio_booking_from_row,
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn list_studio_bookings(&self, user: UserId) -> StoreResult<Vec<StudioBooking>> {
        Span::current().record("operation", "list_studio_bookings");
        self.list_by_user(
            "list_studio_bookings",
            STUDIO_BOOKING_COLUMNS,
            "studio_bookings",
            user,
            studio_booking_from_row,
        )
        .await
    }

    #[instrument(skip(self), fields(booking_id = %id), err)]
    async fn cancel_studio_booking(&self, id: StudioBookingId) -> StoreResult<StudioBooking> {
        Span::current().record("operation", "cancel_studio_booking");
        let sql = format!(
            r#"
            UPDATE studio_bookings SET status = 'cancelled'
            WHERE id = $1 AND status IN ('pending', 'confirmed')
            RETURNING {STUDIO_BOOKING_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("cancel_studio_booking", e))?;
        match row {
            Some(r) => studio_booking_from_row(&r).map_err(|e| map_sqlx_error("cancel_studio_booking", e)),
            None => match self.find_studio_booking(id).await? {
                Some(existing) => Err(StoreError::conflict(format!(
                    "booking is already {}",
                    existing.status
                ))),
                None => Err(StoreError::not_found(format!("studio booking {id}"))),
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gigs
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self), err)]
    async fn list_gigs(&self, filter: &GigFilter, page: Page) -> StoreResult<Vec<Gig>> {
        Span::current().record("operation", "list_gigs");
        let sql = format!(
            r#"
            SELECT {GIG_COLUMNS}
            FROM gigs
            WHERE is_active
              AND ($1::TEXT IS NULL OR LOWER(city) = LOWER($1))
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR dance_form = $3)
            ORDER BY date, id
            LIMIT $4 OFFSET $5
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(&filter.city)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.dance_form.map(|d| d.as_str()))
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_gigs", e))?;
        decode("list_gigs", rows, gig_from_row)
    }

    #[instrument(skip(self), fields(gig_id = %id), err)]
    async fn find_gig(&self, id: GigId) -> StoreResult<Option<Gig>> {
        Span::current().record("operation", "find_gig");
        self.find_by_id("find_gig", GIG_COLUMNS, "gigs", id.get(), gig_from_row)
            .await
    }

    #[instrument(skip(self, gig), err)]
    async fn create_gig(&self, gig: NewGig) -> StoreResult<Gig> {
        Span::current().record("operation", "create_gig");
        gig.validate()?;
        let host = gig.host()?;

        let sql = format!(
            r#"
            INSERT INTO gigs (
                host_id, title, description, requirements, location, city, date, start_time,
                end_time, payment, spots, status, dance_form, skill_level
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'open', $12, $13)
            RETURNING {GIG_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(*host.as_uuid())
            .bind(&gig.title)
            .bind(&gig.description)
            .bind(&gig.requirements)
            .bind(&gig.location)
            .bind(&gig.city)
            .bind(gig.date)
            .bind(gig.start_time)
            .bind(gig.end_time)
            .bind(gig.payment)
            .bind(gig.spots)
            .bind(gig.dance_form.map(|d| d.as_str()))
            .bind(gig.skill_level.map(|l| l.as_str()))
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_gig", e))?;
        gig_from_row(&row).map_err(|e| map_sqlx_error("create_gig", e))
    }

    #[instrument(skip(self), fields(gig_id = %id), err)]
    async fn cancel_gig(&self, id: GigId) -> StoreResult<Gig> {
        Span::current().record("operation", "cancel_gig");
        let sql = format!(
            "UPDATE gigs SET status = 'cancelled', is_active = FALSE WHERE id = $1 RETURNING {GIG_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("cancel_gig", e))?
            .ok_or_else(|| StoreError::not_found(format!("gig {id}")))?;
        gig_from_row(&row).map_err(|e| map_sqlx_error("cancel_gig", e))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gig applications
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, application), err)]
    async fn apply_to_gig(&self, application: NewGigApplication) -> StoreResult<GigApplication> {
        Span::current().record("operation", "apply_to_gig");
        let (gig_id, user_id) = application.keys()?;

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {GIG_COLUMNS} FROM gigs WHERE id = $1 AND is_active FOR SHARE");
        let row = sqlx::query(&sql)
            .bind(gig_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("apply_to_gig", e))?;
        let Some(row) = row else {
            rollback(tx).await?;
            return Err(StoreError::not_found(format!("gig {gig_id}")));
        };
        let gig = gig_from_row(&row).map_err(|e| map_sqlx_error("apply_to_gig", e))?;
        if gig.status != shor_core::GigStatus::Open {
            rollback(tx).await?;
            return Err(StoreError::conflict(format!("gig is {}", gig.status)));
        }

        let sql = format!(
            r#"
            INSERT INTO gig_applications (
                gig_id, user_id, status, message, portfolio, experience, expected_payment
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {APPLICATION_COLUMNS}
            "#
        );
        let inserted = sqlx::query(&sql)
            .bind(gig_id.get())
            .bind(*user_id.as_uuid())
            .bind(ApplicationStatus::Applied.as_str())
            .bind(&application.message)
            .bind(&application.portfolio)
            .bind(&application.experience)
            .bind(application.expected_payment)
            .fetch_one(&mut *tx)
            .await;
        let row = match inserted {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                rollback(tx).await?;
                return Err(StoreError::conflict("already applied to this gig"));
            }
            Err(e) => return Err(map_sqlx_error("apply_to_gig", e)),
        };
        let created = application_from_row(&row).map_err(|e| map_sqlx_error("apply_to_gig", e))?;

        commit(tx).await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(application_id = %id), err)]
    async fn find_gig_application(&self, id: GigApplicationId) -> StoreResult<Option<GigApplication>> {
        Span::current().record("operation", "find_gig_application");
        self.find_by_id(
            "find_gig_application",
            APPLICATION_COLUMNS,
            "gig_applications",
            id.get(),
            application_from_row,
        )
        .await
    }

    #[instrument(skip(self), fields(gig_id = %gig), err)]
    async fn list_gig_applications(&self, gig: GigId) -> StoreResult<Vec<GigApplication>> {
        Span::current().record("operation", "list_gig_applications");
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM gig_applications WHERE gig_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(gig.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_gig_applications", e))?;
        decode("list_gig_applications", rows, application_from_row)
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn list_user_applications(&self, user: UserId) -> StoreResult<Vec<GigApplication>> {
        Span::current().record("operation", "list_user_applications");
        self.list_by_user(
            "list_user_applications",
            APPLICATION_COLUMNS,
            "gig_applications",
            user,
            application_from_row,
        )
        .await
    }

    #[instrument(skip(self, review), fields(application_id = %id, decision = %review.decision), err)]
    async fn review_application(
        &self,
        id: GigApplicationId,
        review: &ApplicationReview,
    ) -> StoreResult<(GigApplication, Gig)> {
        Span::current().record("operation", "review_application");
        review.validate()?;

        let mut tx = self.begin().await?;
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM gig_applications WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("review_application", e))?;
        let Some(row) = row else {
            rollback(tx).await?;
            return Err(StoreError::not_found(format!("gig application {id}")));
        };
        let mut application =
            application_from_row(&row).map_err(|e| map_sqlx_error("review_application", e))?;

        let sql = format!("SELECT {GIG_COLUMNS} FROM gigs WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(application.gig_id.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("review_application", e))?;
        let mut gig = gig_from_row(&row).map_err(|e| map_sqlx_error("review_application", e))?;

        let now = Utc::now();
        if let Err(e) = review.apply(&mut application, now) {
            rollback(tx).await?;
            return Err(e.into());
        }
        if application.status == ApplicationStatus::Accepted {
            if let Err(e) = gig.fill_spot() {
                rollback(tx).await?;
                return Err(e.into());
            }
            sqlx::query("UPDATE gigs SET filled_spots = $2, status = $3 WHERE id = $1")
                .bind(gig.id.get())
                .bind(gig.filled_spots)
                .bind(gig.status.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("review_application", e))?;
        }

        sqlx::query(
            r#"
            UPDATE gig_applications
            SET status = $2, reviewed_at = $3, reviewed_by = $4, review_notes = $5
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(application.status.as_str())
        .bind(application.reviewed_at)
        .bind(application.reviewed_by.map(|u| *u.as_uuid()))
        .bind(&application.review_notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("review_application", e))?;

        commit(tx).await?;
        Ok((application, gig))
    }
}
