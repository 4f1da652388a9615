//! Classes, bookings, gigs and gig applications.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shor_core::{
    ApplicationStatus, ArtistId, BookingStatus, ClassBookingId, ClassId, ClassLevel, ClassType,
    DanceForm, DomainError, GigApplicationId, GigId, GigStatus, StudioBookingId, StudioId, UserId,
};

/// Human-friendly unique booking reference, e.g. `CB-3F9A1C07D2`.
pub fn booking_code(prefix: &str) -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{prefix}-{}", &raw[..10])
}

fn ensure_time_window(start: NaiveTime, end: NaiveTime) -> Result<(), DomainError> {
    if end <= start {
        return Err(DomainError::validation("end time must be after start time"));
    }
    Ok(())
}

/// Half-open interval overlap on the same day.
pub fn overlaps(a: (NaiveTime, NaiveTime), b: (NaiveTime, NaiveTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: ClassId,
    pub title: String,
    #[serde(rename = "type")]
    pub class_type: ClassType,
    pub style: DanceForm,
    pub level: ClassLevel,
    pub artist_id: ArtistId,
    pub studio_id: StudioId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub early_bird_price: Option<i32>,
    pub regular_price: i32,
    pub group_price: Option<i32>,
    pub max_participants: i32,
    pub current_participants: i32,
    pub description: String,
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Class {
    pub fn has_seat(&self) -> bool {
        self.current_participants < self.max_participants
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub title: String,
    #[serde(rename = "type")]
    pub class_type: ClassType,
    pub style: DanceForm,
    pub level: ClassLevel,
    #[serde(skip)]
    pub artist_id: Option<ArtistId>,
    pub studio_id: StudioId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub early_bird_price: Option<i32>,
    pub regular_price: i32,
    pub group_price: Option<i32>,
    pub max_participants: i32,
    pub description: String,
    pub image: Option<String>,
}

impl NewClass {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        ensure_time_window(self.start_time, self.end_time)?;
        if self.max_participants <= 0 {
            return Err(DomainError::validation("maxParticipants must be positive"));
        }
        let prices = [Some(self.regular_price), self.early_bird_price, self.group_price];
        if prices.iter().flatten().any(|p| *p < 0) {
            return Err(DomainError::validation("prices must not be negative"));
        }
        if self.artist_id.is_none() {
            return Err(DomainError::invariant("class must be attached to an artist"));
        }
        Ok(())
    }

    /// Artist id, checked by [`NewClass::validate`].
    pub fn artist(&self) -> Result<ArtistId, DomainError> {
        self.artist_id
            .ok_or_else(|| DomainError::invariant("class must be attached to an artist"))
    }

    pub fn into_class(self, id: ClassId, artist_id: ArtistId, now: DateTime<Utc>) -> Class {
        Class {
            id,
            title: self.title,
            class_type: self.class_type,
            style: self.style,
            level: self.level,
            artist_id,
            studio_id: self.studio_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            early_bird_price: self.early_bird_price,
            regular_price: self.regular_price,
            group_price: self.group_price,
            max_participants: self.max_participants,
            current_participants: 0,
            description: self.description,
            image: self.image,
            is_active: true,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassFilter {
    pub style: Option<DanceForm>,
    pub level: Option<ClassLevel>,
    pub studio_id: Option<StudioId>,
    pub artist_id: Option<ArtistId>,
}

impl ClassFilter {
    pub fn matches(&self, class: &Class) -> bool {
        class.is_active
            && self.style.is_none_or(|s| class.style == s)
            && self.level.is_none_or(|l| class.level == l)
            && self.studio_id.is_none_or(|s| class.studio_id == s)
            && self.artist_id.is_none_or(|a| class.artist_id == a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassBooking {
    pub id: ClassBookingId,
    pub user_id: UserId,
    pub class_id: ClassId,
    pub price: i32,
    pub status: BookingStatus,
    pub booking_code: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClassBooking {
    pub class_id: ClassId,
    pub user_id: UserId,
    pub notes: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Studio bookings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StudioFilter {
    pub city: Option<String>,
}

impl StudioFilter {
    pub fn matches(&self, studio: &super::Studio) -> bool {
        studio.is_active
            && self
                .city
                .as_deref()
                .is_none_or(|c| studio.city.eq_ignore_ascii_case(c))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioBooking {
    pub id: StudioBookingId,
    pub user_id: UserId,
    pub studio_id: StudioId,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: i32,
    pub status: BookingStatus,
    pub booking_code: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudioBooking {
    pub studio_id: StudioId,
    pub user_id: UserId,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub notes: Option<String>,
}

impl NewStudioBooking {
    pub fn validate(&self) -> Result<(), DomainError> {
        ensure_time_window(self.start_time, self.end_time)
    }

    /// Hourly price prorated by the booked minutes, in paise.
    pub fn price(&self, price_per_hour: i32) -> i32 {
        let minutes = (self.end_time - self.start_time).num_minutes().max(0);
        let total = i64::from(price_per_hour) * minutes / 60;
        i32::try_from(total).unwrap_or(i32::MAX)
    }

    pub fn clashes_with(&self, other: &StudioBooking) -> bool {
        other.studio_id == self.studio_id
            && other.status.is_active()
            && other.booking_date == self.booking_date
            && overlaps(
                (self.start_time, self.end_time),
                (other.start_time, other.end_time),
            )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gigs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gig {
    pub id: GigId,
    pub host_id: UserId,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub location: String,
    pub city: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub payment: Option<i32>,
    pub spots: i32,
    pub filled_spots: i32,
    pub status: GigStatus,
    pub dance_form: Option<DanceForm>,
    pub skill_level: Option<ClassLevel>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Gig {
    /// Fill one spot for an accepted application; the gig becomes `filled`
    /// once every spot is taken.
    pub fn fill_spot(&mut self) -> Result<(), DomainError> {
        if self.status != GigStatus::Open {
            return Err(DomainError::conflict(format!("gig is {}", self.status)));
        }
        if self.filled_spots >= self.spots {
            return Err(DomainError::conflict("gig has no spots left"));
        }
        self.filled_spots += 1;
        if self.filled_spots == self.spots {
            self.status = GigStatus::Filled;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGig {
    #[serde(skip)]
    pub host_id: Option<UserId>,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub location: String,
    pub city: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub payment: Option<i32>,
    pub spots: i32,
    pub dance_form: Option<DanceForm>,
    pub skill_level: Option<ClassLevel>,
}

impl NewGig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        if self.spots <= 0 {
            return Err(DomainError::validation("spots must be positive"));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            ensure_time_window(start, end)?;
        }
        if self.payment.is_some_and(|p| p < 0) {
            return Err(DomainError::validation("payment must not be negative"));
        }
        Ok(())
    }

    pub fn host(&self) -> Result<UserId, DomainError> {
        self.host_id
            .ok_or_else(|| DomainError::invariant("gig must have a host"))
    }

    pub fn into_gig(self, id: GigId, host_id: UserId, now: DateTime<Utc>) -> Gig {
        Gig {
            id,
            host_id,
            title: self.title,
            description: self.description,
            requirements: self.requirements,
            location: self.location,
            city: self.city,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            payment: self.payment,
            spots: self.spots,
            filled_spots: 0,
            status: GigStatus::Open,
            dance_form: self.dance_form,
            skill_level: self.skill_level,
            is_active: true,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GigFilter {
    pub city: Option<String>,
    pub status: Option<GigStatus>,
    pub dance_form: Option<DanceForm>,
}

impl GigFilter {
    pub fn matches(&self, gig: &Gig) -> bool {
        gig.is_active
            && self.city.as_deref().is_none_or(|c| gig.city.eq_ignore_ascii_case(c))
            && self.status.is_none_or(|s| gig.status == s)
            && self.dance_form.is_none_or(|d| gig.dance_form == Some(d))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GigApplication {
    pub id: GigApplicationId,
    pub gig_id: GigId,
    pub user_id: UserId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub message: Option<String>,
    pub portfolio: Option<String>,
    pub experience: Option<String>,
    pub expected_payment: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGigApplication {
    #[serde(skip)]
    pub gig_id: Option<GigId>,
    #[serde(skip)]
    pub user_id: Option<UserId>,
    pub message: Option<String>,
    pub portfolio: Option<String>,
    pub experience: Option<String>,
    pub expected_payment: Option<i32>,
}

impl NewGigApplication {
    pub fn keys(&self) -> Result<(GigId, UserId), DomainError> {
        match (self.gig_id, self.user_id) {
            (Some(g), Some(u)) => Ok((g, u)),
            _ => Err(DomainError::invariant("application needs a gig and an applicant")),
        }
    }

    pub fn into_application(
        self,
        id: GigApplicationId,
        gig_id: GigId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> GigApplication {
        GigApplication {
            id,
            gig_id,
            user_id,
            status: ApplicationStatus::Applied,
            applied_at: now,
            message: self.message,
            portfolio: self.portfolio,
            experience: self.experience,
            expected_payment: self.expected_payment,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
        }
    }
}

/// Host decision on an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationReview {
    pub decision: ApplicationStatus,
    pub reviewer: UserId,
    pub notes: Option<String>,
}

impl ApplicationReview {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.decision == ApplicationStatus::Applied {
            return Err(DomainError::validation("decision must be accepted or rejected"));
        }
        Ok(())
    }

    /// Apply to an application that is still pending review.
    pub fn apply(&self, application: &mut GigApplication, now: DateTime<Utc>) -> Result<(), DomainError> {
        if application.status != ApplicationStatus::Applied {
            return Err(DomainError::conflict(format!(
                "application already {}",
                application.status
            )));
        }
        application.status = self.decision;
        application.reviewed_at = Some(now);
        application.reviewed_by = Some(self.reviewer);
        application.review_notes = self.notes.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn gig(spots: i32) -> Gig {
        NewGig {
            host_id: Some(UserId::new()),
            title: "Sangeet night".into(),
            description: "Wedding performance".into(),
            requirements: "Bollywood".into(),
            location: "Hall 2".into(),
            city: "Mumbai".into(),
            date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            start_time: None,
            end_time: None,
            payment: Some(500_000),
            spots,
            dance_form: Some(DanceForm::Bollywood),
            skill_level: None,
        }
        .into_gig(GigId::new(1), UserId::new(), Utc::now())
    }

    #[test]
    fn studio_price_is_prorated_by_minutes() {
        let booking = NewStudioBooking {
            studio_id: StudioId::new(1),
            user_id: UserId::new(),
            booking_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            start_time: t(10, 0),
            end_time: t(11, 30),
            notes: None,
        };
        assert_eq!(booking.price(100_000), 150_000);
    }

    #[test]
    fn adjacent_slots_do_not_overlap() {
        assert!(!overlaps((t(10, 0), t(11, 0)), (t(11, 0), t(12, 0))));
        assert!(overlaps((t(10, 0), t(11, 1)), (t(11, 0), t(12, 0))));
    }

    #[test]
    fn filling_the_last_spot_marks_gig_filled() {
        let mut g = gig(2);
        g.fill_spot().unwrap();
        assert_eq!(g.status, GigStatus::Open);
        g.fill_spot().unwrap();
        assert_eq!(g.status, GigStatus::Filled);
        assert!(matches!(g.fill_spot(), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn reviewed_applications_cannot_be_reviewed_again() {
        let mut app = NewGigApplication {
            gig_id: None,
            user_id: None,
            message: None,
            portfolio: None,
            experience: None,
            expected_payment: None,
        }
        .into_application(GigApplicationId::new(1), GigId::new(1), UserId::new(), Utc::now());
        let review = ApplicationReview {
            decision: ApplicationStatus::Rejected,
            reviewer: UserId::new(),
            notes: None,
        };
        review.apply(&mut app, Utc::now()).unwrap();
        assert!(review.apply(&mut app, Utc::now()).is_err());
    }

    #[test]
    fn booking_codes_are_prefixed_and_unique() {
        let a = booking_code("CB");
        let b = booking_code("CB");
        assert!(a.starts_with("CB-"));
        assert_eq!(a.len(), 13);
        assert_ne!(a, b);
    }
}
