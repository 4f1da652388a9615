//! Per-entity repository contracts.
//!
//! Each trait is implemented by [`memory::InMemoryStore`] (tests, local dev)
//! and [`postgres::PostgresStore`]. Mutations that must be audited take an
//! [`AuditContext`] and write their audit entry in the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shor_auth::{
    ActionRecord, NewAction, PermissionSet, ProfileUpdate, RecentActivity, Role, RoleGrant,
    RoleRecord, RoleSummary, SeedOutcome, SeedPlan, Session, UserProfile,
};
use shor_core::{
    ClassBookingId, ClassId, GigApplicationId, GigId, SessionId, StudioBookingId, StudioId, UserId,
};

use crate::error::StoreError;
use crate::model::{
    ApplicationReview, Artist, ArtistUpdate, AuditContext, AuditEntry, AuditQuery, Class,
    ClassBooking, ClassFilter, Gig, GigApplication, GigFilter, NewAccount, NewAuditEntry, NewClass,
    NewClassBooking, NewGig, NewGigApplication, NewStudioBooking, Page, ProvisionedAccount, Student,
    StudentUpdate, Studio, StudioBooking, StudioFilter, StudioUpdate, Verification,
    VerificationKind,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<UserProfile>>;

    /// Lookup by normalized email.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>>;

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> StoreResult<UserProfile>;

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()>;

    async fn mark_email_verified(&self, id: UserId) -> StoreResult<UserProfile>;

    /// Soft-deactivate a user and drop their sessions (audited).
    async fn deactivate_user(&self, id: UserId, ctx: &AuditContext) -> StoreResult<UserProfile>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Write the plan in one transaction, unless any role already exists.
    async fn seed_catalog(&self, plan: &SeedPlan) -> StoreResult<SeedOutcome>;

    async fn list_roles(&self) -> StoreResult<Vec<RoleSummary>>;

    async fn find_role(&self, name: &str) -> StoreResult<Option<RoleRecord>>;

    async fn list_actions(&self) -> StoreResult<Vec<ActionRecord>>;

    /// Add an action after seeding (audited). Duplicate names conflict.
    async fn add_action(&self, action: &NewAction, ctx: &AuditContext) -> StoreResult<ActionRecord>;

    /// Active roles holding an active row for `permission`.
    async fn roles_granting(&self, permission: &str) -> StoreResult<Vec<Role>>;
}

#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Every grant of the user, including revoked ones.
    async fn list_grants(&self, user: UserId) -> StoreResult<Vec<RoleGrant>>;

    /// Names of active roles held through active grants.
    async fn active_roles(&self, user: UserId) -> StoreResult<Vec<Role>>;

    async fn resolve_permissions(&self, user: UserId) -> StoreResult<PermissionSet>;

    /// Grant a role (audited). Re-activates a revoked grant; an already active
    /// grant conflicts; unknown users/roles are referential failures.
    async fn assign_role(
        &self,
        user: UserId,
        role: &str,
        notes: Option<String>,
        ctx: &AuditContext,
    ) -> StoreResult<RoleGrant>;

    /// Soft-revoke an active grant (audited).
    async fn revoke_role(&self, user: UserId, role: &str, ctx: &AuditContext) -> StoreResult<RoleGrant>;
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append_audit(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry>;

    async fn list_audit(&self, query: &AuditQuery) -> StoreResult<Vec<AuditEntry>>;
}

/// Persistence behind the identity provider.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Registration: user, credential, role grant, extension row and audit
    /// entry, all or nothing.
    async fn provision_account(&self, account: NewAccount) -> StoreResult<ProvisionedAccount>;

    async fn password_hash(&self, user: UserId) -> StoreResult<Option<String>>;

    async fn set_password_hash(&self, user: UserId, hash: &str) -> StoreResult<()>;

    async fn insert_session(&self, session: &Session) -> StoreResult<()>;

    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>>;

    async fn extend_session(
        &self,
        id: SessionId,
        expires_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn list_sessions(&self, user: UserId) -> StoreResult<Vec<Session>>;

    async fn delete_session(&self, token: &str) -> StoreResult<bool>;

    async fn delete_user_session(&self, user: UserId, id: SessionId) -> StoreResult<bool>;

    async fn delete_user_sessions(&self, user: UserId, keep: Option<SessionId>) -> StoreResult<u64>;

    async fn insert_verification(&self, verification: &Verification) -> StoreResult<()>;

    /// Remove and return the token's row, if any (expired rows included).
    async fn take_verification(
        &self,
        kind: VerificationKind,
        token: &str,
    ) -> StoreResult<Option<Verification>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_artist_by_user(&self, user: UserId) -> StoreResult<Option<Artist>>;

    async fn find_studio_by_user(&self, user: UserId) -> StoreResult<Option<Studio>>;

    async fn find_student_by_user(&self, user: UserId) -> StoreResult<Option<Student>>;

    async fn update_artist(&self, user: UserId, update: &ArtistUpdate) -> StoreResult<Artist>;

    async fn update_studio(&self, user: UserId, update: &StudioUpdate) -> StoreResult<Studio>;

    async fn upsert_student(&self, user: UserId, update: &StudentUpdate) -> StoreResult<Student>;

    async fn recent_activity(&self, user: UserId) -> StoreResult<RecentActivity>;
}

#[async_trait]
pub trait MarketplaceRepository: Send + Sync {
    async fn list_studios(&self, filter: &StudioFilter, page: Page) -> StoreResult<Vec<Studio>>;

    async fn find_studio(&self, id: StudioId) -> StoreResult<Option<Studio>>;

    async fn list_classes(&self, filter: &ClassFilter, page: Page) -> StoreResult<Vec<Class>>;

    async fn find_class(&self, id: ClassId) -> StoreResult<Option<Class>>;

    async fn create_class(&self, class: NewClass) -> StoreResult<Class>;

    async fn deactivate_class(&self, id: ClassId) -> StoreResult<Class>;

    /// Take a seat atomically; full or inactive classes conflict.
    async fn book_class(&self, booking: NewClassBooking) -> StoreResult<ClassBooking>;

    async fn find_class_booking(&self, id: ClassBookingId) -> StoreResult<Option<ClassBooking>>;

    async fn list_class_bookings(&self, user: UserId) -> StoreResult<Vec<ClassBooking>>;

    /// Mark cancelled and free the seat.
    async fn cancel_class_booking(&self, id: ClassBookingId) -> StoreResult<ClassBooking>;

    /// Price is the studio's hourly price prorated; overlapping active
    /// bookings of the same studio conflict.
    async fn book_studio(&self, booking: NewStudioBooking) -> StoreResult<StudioBooking>;

    async fn find_studio_booking(&self, id: StudioBookingId) -> StoreResult<Option<StudioBooking>>;

    async fn list_studio_bookings(&self, user: UserId) -> StoreResult<Vec<StudioBooking>>;

    async fn cancel_studio_booking(&self, id: StudioBookingId) -> StoreResult<StudioBooking>;

    async fn list_gigs(&self, filter: &GigFilter, page: Page) -> StoreResult<Vec<Gig>>;

    async fn find_gig(&self, id: GigId) -> StoreResult<Option<Gig>>;

    async fn create_gig(&self, gig: NewGig) -> StoreResult<Gig>;

    /// Status becomes cancelled and the gig is hidden from listings.
    async fn cancel_gig(&self, id: GigId) -> StoreResult<Gig>;

    /// One application per user per gig; the gig must be open.
    async fn apply_to_gig(&self, application: NewGigApplication) -> StoreResult<GigApplication>;

    async fn find_gig_application(&self, id: GigApplicationId) -> StoreResult<Option<GigApplication>>;

    async fn list_gig_applications(&self, gig: GigId) -> StoreResult<Vec<GigApplication>>;

    async fn list_user_applications(&self, user: UserId) -> StoreResult<Vec<GigApplication>>;

    /// Accepting fills a spot on the gig (and marks it filled when full).
    async fn review_application(
        &self,
        id: GigApplicationId,
        review: &ApplicationReview,
    ) -> StoreResult<(GigApplication, Gig)>;
}

/// Everything the services need from one backend.
pub trait Store:
    UserRepository
    + CatalogRepository
    + GrantRepository
    + AuditLogRepository
    + AccountRepository
    + ProfileRepository
    + MarketplaceRepository
{
}

impl<T> Store for T where
    T: UserRepository
        + CatalogRepository
        + GrantRepository
        + AuditLogRepository
        + AccountRepository
        + ProfileRepository
        + MarketplaceRepository
{
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit entries shared by both backends
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) mod audit {
    use serde_json::json;

    use shor_auth::{ActionRecord, RoleGrant, UserProfile};

    use crate::model::{audit_actions as actions, AuditContext, NewAuditEntry, ProvisionedAccount};

    pub fn user_registered(ctx: &AuditContext, account: &ProvisionedAccount) -> NewAuditEntry {
        NewAuditEntry::new(ctx, actions::USER_REGISTERED, "users")
            .target(account.user.id)
            .entity(account.user.id)
            .new_values(&json!({
                "email": account.user.email,
                "role": account.grant.role_name,
                "artistId": account.artist.as_ref().map(|a| a.id),
                "studioId": account.studio.as_ref().map(|s| s.id),
            }))
    }

    pub fn user_deactivated(ctx: &AuditContext, before: &UserProfile) -> NewAuditEntry {
        NewAuditEntry::new(ctx, actions::USER_DEACTIVATED, "users")
            .target(before.id)
            .entity(before.id)
            .old(&json!({ "isActive": before.is_active }))
            .new_values(&json!({ "isActive": false }))
    }

    pub fn role_assigned(ctx: &AuditContext, previous: Option<&RoleGrant>, grant: &RoleGrant) -> NewAuditEntry {
        let entry = NewAuditEntry::new(ctx, actions::ROLE_ASSIGNED, "user_roles")
            .target(grant.user_id)
            .entity(grant.id)
            .new_values(grant);
        match previous {
            Some(p) => entry.old(p),
            None => entry,
        }
    }

    pub fn role_revoked(ctx: &AuditContext, before: &RoleGrant, after: &RoleGrant) -> NewAuditEntry {
        NewAuditEntry::new(ctx, actions::ROLE_REVOKED, "user_roles")
            .target(after.user_id)
            .entity(after.id)
            .old(before)
            .new_values(after)
    }

    pub fn action_created(ctx: &AuditContext, action: &ActionRecord) -> NewAuditEntry {
        NewAuditEntry::new(ctx, actions::ACTION_CREATED, "actions")
            .entity(action.id)
            .new_values(action)
    }
}
