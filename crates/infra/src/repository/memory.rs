//! In-memory backend for tests and local development.
//!
//! All tables live behind one `RwLock`, so every trait method is atomic:
//! multi-row mutations (seeding, registration, seat booking) either apply
//! completely or not at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shor_auth::{
    resolve::effective_roles, resolve_permissions, ActionRecord, CatalogAction, HeldRole, NewAction,
    Permission, PermissionSet, ProfileUpdate, RecentActivity, Role, RoleGrant, RoleRecord,
    RoleSummary, SeedOutcome, SeedPlan, Session, UserProfile,
};
use shor_core::{
    ActionId, ArtistId, AuditEntryId, BookingStatus, ClassBookingId, ClassId, GigApplicationId,
    GigId, GigStatus, RoleGrantId, RoleId, SessionId, StudentId, StudioBookingId, StudioId, UserId,
};

use super::{
    audit, AccountRepository, AuditLogRepository, CatalogRepository, GrantRepository,
    MarketplaceRepository, ProfileRepository, StoreResult, UserRepository,
};
use crate::error::StoreError;
use crate::model::marketplace::booking_code;
use crate::model::{
    ApplicationReview, Artist, ArtistUpdate, AuditContext, AuditEntry, AuditQuery, Class,
    ClassBooking, ClassFilter, Gig, GigApplication, GigFilter, NewAccount, NewAuditEntry,
    NewClass, NewClassBooking, NewExtension, NewGig, NewGigApplication, NewStudioBooking, Page,
    ProvisionedAccount, Student, StudentUpdate, Studio, StudioBooking, StudioFilter, StudioUpdate,
    Verification, VerificationKind,
};

#[derive(Debug, Clone)]
struct RolePermissionRow {
    role_id: RoleId,
    action_id: ActionId,
    is_active: bool,
}

#[derive(Debug, Default)]
struct Sequences {
    role: i32,
    action: i32,
    grant: i32,
    audit: i32,
    artist: i32,
    studio: i32,
    student: i32,
    class: i32,
    class_booking: i32,
    studio_booking: i32,
    gig: i32,
    gig_application: i32,
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserProfile>,
    credentials: HashMap<UserId, String>,
    sessions: HashMap<String, Session>,
    verifications: HashMap<String, Verification>,
    roles: Vec<RoleRecord>,
    actions: Vec<ActionRecord>,
    role_permissions: Vec<RolePermissionRow>,
    grants: Vec<RoleGrant>,
    audit: Vec<AuditEntry>,
    artists: Vec<Artist>,
    studios: Vec<Studio>,
    students: Vec<Student>,
    classes: Vec<Class>,
    class_bookings: Vec<ClassBooking>,
    studio_bookings: Vec<StudioBooking>,
    gigs: Vec<Gig>,
    gig_applications: Vec<GigApplication>,
    seq: Sequences,
}

impl Tables {
    fn push_audit(&mut self, entry: NewAuditEntry) -> AuditEntry {
        let id = AuditEntryId::new(next(&mut self.seq.audit));
        let stored = entry.into_entry(id, Utc::now());
        self.audit.push(stored.clone());
        stored
    }

    fn role_by_name(&self, name: &str) -> Option<&RoleRecord> {
        self.roles.iter().find(|r| r.name.as_str() == name)
    }

    fn role_actions(&self, role_id: RoleId) -> Vec<Permission> {
        self.role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id && rp.is_active)
            .filter_map(|rp| self.actions.iter().find(|a| a.id == rp.action_id))
            .map(|a| a.name.clone())
            .collect()
    }

    fn held_roles(&self, user: UserId) -> Vec<HeldRole> {
        self.grants
            .iter()
            .filter(|g| g.user_id == user)
            .filter_map(|g| {
                let role = self.roles.iter().find(|r| r.id == g.role_id)?;
                Some(HeldRole {
                    name: role.name.clone(),
                    grant_active: g.is_active,
                    role_active: role.is_active,
                    actions: self.role_actions(role.id),
                })
            })
            .collect()
    }

    fn catalog(&self) -> Vec<CatalogAction> {
        self.actions
            .iter()
            .map(|a| CatalogAction {
                name: a.name.clone(),
                is_active: a.is_active,
            })
            .collect()
    }

    fn user_mut(&mut self, id: UserId) -> StoreResult<&mut UserProfile> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }
}

/// In-memory implementation of every repository trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<UserProfile>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> StoreResult<UserProfile> {
        let mut t = self.write()?;
        let user = t.user_mut(id)?;
        update.apply(user, Utc::now());
        Ok(user.clone())
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.write()?;
        let user = t.user_mut(id)?;
        user.last_login_at = Some(at);
        user.updated_at = at;
        Ok(())
    }

    async fn mark_email_verified(&self, id: UserId) -> StoreResult<UserProfile> {
        let mut t = self.write()?;
        let user = t.user_mut(id)?;
        user.email_verified = true;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn deactivate_user(&self, id: UserId, ctx: &AuditContext) -> StoreResult<UserProfile> {
        let mut t = self.write()?;
        let user = t.user_mut(id)?;
        let before = user.clone();
        user.is_active = false;
        user.updated_at = Utc::now();
        let after = user.clone();
        t.sessions.retain(|_, s| s.user_id != id);
        t.push_audit(audit::user_deactivated(ctx, &before));
        Ok(after)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog and grants
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn seed_catalog(&self, plan: &SeedPlan) -> StoreResult<SeedOutcome> {
        let mut t = self.write()?;
        if !t.roles.is_empty() {
            return Ok(SeedOutcome::Skipped);
        }
        let now = Utc::now();

        for a in &plan.actions {
            let id = ActionId::new(next(&mut t.seq.action));
            t.actions.push(ActionRecord {
                id,
                name: a.name.clone(),
                description: Some(a.description.clone()),
                category: a.category.clone(),
                table_name: Some(a.table_name.clone()),
                operation: a.operation,
                is_active: true,
                created_at: now,
            });
        }

        let mut grants = 0;
        for r in &plan.roles {
            let role_id = RoleId::new(next(&mut t.seq.role));
            t.roles.push(RoleRecord {
                id: role_id,
                name: r.name.clone(),
                description: Some(r.description.clone()),
                is_active: true,
                created_at: now,
                updated_at: now,
            });
            for p in &r.actions {
                let action_id = t
                    .actions
                    .iter()
                    .find(|a| a.name == *p)
                    .map(|a| a.id)
                    .ok_or_else(|| StoreError::referential(format!("action '{p}' is not in the catalog")))?;
                t.role_permissions.push(RolePermissionRow {
                    role_id,
                    action_id,
                    is_active: true,
                });
                grants += 1;
            }
        }

        Ok(SeedOutcome::Seeded {
            roles: plan.roles.len(),
            actions: plan.actions.len(),
            grants,
        })
    }

    async fn list_roles(&self) -> StoreResult<Vec<RoleSummary>> {
        let t = self.read()?;
        let catalog = t.catalog();
        Ok(t.roles
            .iter()
            .map(|role| {
                let held = HeldRole {
                    name: role.name.clone(),
                    grant_active: true,
                    role_active: role.is_active,
                    actions: t.role_actions(role.id),
                };
                RoleSummary {
                    role: role.clone(),
                    permissions: resolve_permissions(&[held], &catalog).into_vec(),
                }
            })
            .collect())
    }

    async fn find_role(&self, name: &str) -> StoreResult<Option<RoleRecord>> {
        Ok(self.read()?.role_by_name(name).cloned())
    }

    async fn list_actions(&self) -> StoreResult<Vec<ActionRecord>> {
        Ok(self.read()?.actions.clone())
    }

    async fn add_action(&self, action: &NewAction, ctx: &AuditContext) -> StoreResult<ActionRecord> {
        let mut t = self.write()?;
        if t.actions.iter().any(|a| a.name == action.name) {
            return Err(StoreError::conflict(format!("action '{}' already exists", action.name)));
        }
        let record = ActionRecord {
            id: ActionId::new(next(&mut t.seq.action)),
            name: action.name.clone(),
            description: action.description.clone(),
            category: action.category.clone(),
            table_name: action.table_name.clone(),
            operation: action.operation,
            is_active: true,
            created_at: Utc::now(),
        };
        t.actions.push(record.clone());
        t.push_audit(audit::action_created(ctx, &record));
        Ok(record)
    }

    async fn roles_granting(&self, permission: &str) -> StoreResult<Vec<Role>> {
        let t = self.read()?;
        let active_action = t.actions.iter().any(|a| a.name.as_str() == permission && a.is_active);
        if !active_action {
            return Ok(Vec::new());
        }
        Ok(t.roles
            .iter()
            .filter(|r| r.is_active)
            .filter(|r| t.role_actions(r.id).iter().any(|p| p.as_str() == permission))
            .map(|r| r.name.clone())
            .collect())
    }
}

#[async_trait]
impl GrantRepository for InMemoryStore {
    async fn list_grants(&self, user: UserId) -> StoreResult<Vec<RoleGrant>> {
        Ok(self.read()?.grants.iter().filter(|g| g.user_id == user).cloned().collect())
    }

    async fn active_roles(&self, user: UserId) -> StoreResult<Vec<Role>> {
        Ok(effective_roles(&self.read()?.held_roles(user)))
    }

    async fn resolve_permissions(&self, user: UserId) -> StoreResult<PermissionSet> {
        let t = self.read()?;
        Ok(resolve_permissions(&t.held_roles(user), &t.catalog()))
    }

    async fn assign_role(
        &self,
        user: UserId,
        role: &str,
        notes: Option<String>,
        ctx: &AuditContext,
    ) -> StoreResult<RoleGrant> {
        let mut t = self.write()?;
        if !t.users.contains_key(&user) {
            return Err(StoreError::referential(format!("user {user} does not exist")));
        }
        let role = t
            .role_by_name(role)
            .cloned()
            .ok_or_else(|| StoreError::referential(format!("role '{role}' does not exist")))?;

        let existing = t
            .grants
            .iter()
            .position(|g| g.user_id == user && g.role_id == role.id);
        let now = Utc::now();
        let (previous, grant) = match existing {
            Some(idx) if t.grants[idx].is_active => {
                return Err(StoreError::conflict(format!("user already holds role '{}'", role.name)));
            }
            Some(idx) => {
                let previous = t.grants[idx].clone();
                let g = &mut t.grants[idx];
                g.is_active = true;
                g.assigned_by = ctx.actor;
                g.assigned_at = now;
                g.notes = notes;
                (Some(previous), g.clone())
            }
            None => {
                let grant = RoleGrant {
                    id: RoleGrantId::new(next(&mut t.seq.grant)),
                    user_id: user,
                    role_id: role.id,
                    role_name: role.name.clone(),
                    assigned_by: ctx.actor,
                    assigned_at: now,
                    is_active: true,
                    notes,
                };
                t.grants.push(grant.clone());
                (None, grant)
            }
        };
        t.push_audit(audit::role_assigned(ctx, previous.as_ref(), &grant));
        Ok(grant)
    }

    async fn revoke_role(&self, user: UserId, role: &str, ctx: &AuditContext) -> StoreResult<RoleGrant> {
        let mut t = self.write()?;
        let idx = t
            .grants
            .iter()
            .position(|g| g.user_id == user && g.role_name.as_str() == role && g.is_active)
            .ok_or_else(|| StoreError::not_found(format!("active grant of '{role}'")))?;
        let before = t.grants[idx].clone();
        t.grants[idx].is_active = false;
        let after = t.grants[idx].clone();
        t.push_audit(audit::role_revoked(ctx, &before, &after));
        Ok(after)
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryStore {
    async fn append_audit(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry> {
        Ok(self.write()?.push_audit(entry))
    }

    async fn list_audit(&self, query: &AuditQuery) -> StoreResult<Vec<AuditEntry>> {
        let t = self.read()?;
        Ok(query
            .page
            .slice(t.audit.iter().rev().filter(|e| query.matches(e)).cloned()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Accounts, sessions and verification tokens
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn provision_account(&self, account: NewAccount) -> StoreResult<ProvisionedAccount> {
        let mut t = self.write()?;

        // Every check happens before the first insert, so a failure leaves
        // the tables untouched.
        let role = t
            .role_by_name(account.role.as_str())
            .cloned()
            .ok_or_else(|| StoreError::referential(format!("role '{}' does not exist", account.role)))?;
        if t.users.values().any(|u| u.email == account.user.email) {
            return Err(StoreError::conflict(format!("email '{}' is already registered", account.user.email)));
        }
        if t.users.contains_key(&account.user_id) {
            return Err(StoreError::conflict(format!("user {} already exists", account.user_id)));
        }

        let now = Utc::now();
        let user_id = account.user_id;
        let user = account.user.into_profile(user_id, now);
        t.users.insert(user_id, user.clone());
        t.credentials.insert(user_id, account.password_hash);

        let grant = RoleGrant {
            id: RoleGrantId::new(next(&mut t.seq.grant)),
            user_id,
            role_id: role.id,
            role_name: role.name.clone(),
            assigned_by: None,
            assigned_at: now,
            is_active: true,
            notes: Some("default role at registration".into()),
        };
        t.grants.push(grant.clone());

        let (mut artist, mut studio) = (None, None);
        match account.extension {
            Some(NewExtension::Artist(a)) => {
                let row = a.into_artist(ArtistId::new(next(&mut t.seq.artist)), user_id);
                t.artists.push(row.clone());
                artist = Some(row);
            }
            Some(NewExtension::Studio(s)) => {
                let row = s.into_studio(StudioId::new(next(&mut t.seq.studio)), user_id);
                t.studios.push(row.clone());
                studio = Some(row);
            }
            None => {}
        }

        let provisioned = ProvisionedAccount {
            user,
            grant,
            artist,
            studio,
        };
        let ctx = AuditContext::new(Some(user_id), account.client);
        t.push_audit(audit::user_registered(&ctx, &provisioned));
        Ok(provisioned)
    }

    async fn password_hash(&self, user: UserId) -> StoreResult<Option<String>> {
        Ok(self.read()?.credentials.get(&user).cloned())
    }

    async fn set_password_hash(&self, user: UserId, hash: &str) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.users.contains_key(&user) {
            return Err(StoreError::not_found(format!("user {user}")));
        }
        t.credentials.insert(user, hash.to_string());
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.sessions.contains_key(&session.token) {
            return Err(StoreError::conflict("session token already exists"));
        }
        t.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token: &str) -> StoreResult<Option<Session>> {
        Ok(self.read()?.sessions.get(token).cloned())
    }

    async fn extend_session(
        &self,
        id: SessionId,
        expires_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        if let Some(s) = t.sessions.values_mut().find(|s| s.id == id) {
            s.expires_at = expires_at;
            s.updated_at = updated_at;
        }
        Ok(())
    }

    async fn list_sessions(&self, user: UserId) -> StoreResult<Vec<Session>> {
        let t = self.read()?;
        let mut sessions: Vec<Session> = t.sessions.values().filter(|s| s.user_id == user).cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        Ok(self.write()?.sessions.remove(token).is_some())
    }

    async fn delete_user_session(&self, user: UserId, id: SessionId) -> StoreResult<bool> {
        let mut t = self.write()?;
        let before = t.sessions.len();
        t.sessions.retain(|_, s| !(s.user_id == user && s.id == id));
        Ok(t.sessions.len() < before)
    }

    async fn delete_user_sessions(&self, user: UserId, keep: Option<SessionId>) -> StoreResult<u64> {
        let mut t = self.write()?;
        let before = t.sessions.len();
        t.sessions
            .retain(|_, s| s.user_id != user || Some(s.id) == keep);
        Ok((before - t.sessions.len()) as u64)
    }

    async fn insert_verification(&self, verification: &Verification) -> StoreResult<()> {
        self.write()?
            .verifications
            .insert(verification.identifier.clone(), verification.clone());
        Ok(())
    }

    async fn take_verification(
        &self,
        kind: VerificationKind,
        token: &str,
    ) -> StoreResult<Option<Verification>> {
        Ok(self.write()?.verifications.remove(&kind.identifier(token)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiles
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn find_artist_by_user(&self, user: UserId) -> StoreResult<Option<Artist>> {
        Ok(self.read()?.artists.iter().find(|a| a.user_id == user).cloned())
    }

    async fn find_studio_by_user(&self, user: UserId) -> StoreResult<Option<Studio>> {
        Ok(self.read()?.studios.iter().find(|s| s.user_id == user).cloned())
    }

    async fn find_student_by_user(&self, user: UserId) -> StoreResult<Option<Student>> {
        Ok(self.read()?.students.iter().find(|s| s.user_id == user).cloned())
    }

    async fn update_artist(&self, user: UserId, update: &ArtistUpdate) -> StoreResult<Artist> {
        let mut t = self.write()?;
        let artist = t
            .artists
            .iter_mut()
            .find(|a| a.user_id == user)
            .ok_or_else(|| StoreError::not_found("artist profile"))?;
        update.apply(artist);
        Ok(artist.clone())
    }

    async fn update_studio(&self, user: UserId, update: &StudioUpdate) -> StoreResult<Studio> {
        let mut t = self.write()?;
        let studio = t
            .studios
            .iter_mut()
            .find(|s| s.user_id == user)
            .ok_or_else(|| StoreError::not_found("studio profile"))?;
        update.apply(studio);
        Ok(studio.clone())
    }

    async fn upsert_student(&self, user: UserId, update: &StudentUpdate) -> StoreResult<Student> {
        let mut t = self.write()?;
        if !t.users.contains_key(&user) {
            return Err(StoreError::referential(format!("user {user} does not exist")));
        }
        if let Some(student) = t.students.iter_mut().find(|s| s.user_id == user) {
            update.apply(student);
            return Ok(student.clone());
        }
        let student = update.into_student(StudentId::new(next(&mut t.seq.student)), user);
        t.students.push(student.clone());
        Ok(student)
    }

    async fn recent_activity(&self, user: UserId) -> StoreResult<RecentActivity> {
        let t = self.read()?;
        Ok(RecentActivity::capped(
            t.class_bookings.iter().filter(|b| b.user_id == user).count(),
            t.studio_bookings.iter().filter(|b| b.user_id == user).count(),
            t.gig_applications.iter().filter(|a| a.user_id == user).count(),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Marketplace
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl MarketplaceRepository for InMemoryStore {
    async fn list_studios(&self, filter: &StudioFilter, page: Page) -> StoreResult<Vec<Studio>> {
        let t = self.read()?;
        Ok(page.slice(t.studios.iter().filter(|s| filter.matches(s)).cloned()))
    }

    async fn find_studio(&self, id: StudioId) -> StoreResult<Option<Studio>> {
        Ok(self.read()?.studios.iter().find(|s| s.id == id).cloned())
    }

    async fn list_classes(&self, filter: &ClassFilter, page: Page) -> StoreResult<Vec<Class>> {
        let t = self.read()?;
        let mut classes: Vec<&Class> = t.classes.iter().filter(|c| filter.matches(c)).collect();
        classes.sort_by_key(|c| (c.date, c.start_time, c.id));
        Ok(page.slice(classes.into_iter().cloned()))
    }

    async fn find_class(&self, id: ClassId) -> StoreResult<Option<Class>> {
        Ok(self.read()?.classes.iter().find(|c| c.id == id).cloned())
    }

    async fn create_class(&self, class: NewClass) -> StoreResult<Class> {
        class.validate()?;
        let artist_id = class.artist()?;
        let mut t = self.write()?;
        if !t.artists.iter().any(|a| a.id == artist_id) {
            return Err(StoreError::referential(format!("artist {artist_id} does not exist")));
        }
        if !t.studios.iter().any(|s| s.id == class.studio_id && s.is_active) {
            return Err(StoreError::referential(format!("studio {} does not exist", class.studio_id)));
        }
        let id = ClassId::new(next(&mut t.seq.class));
        let row = class.into_class(id, artist_id, Utc::now());
        t.classes.push(row.clone());
        Ok(row)
    }

    async fn deactivate_class(&self, id: ClassId) -> StoreResult<Class> {
        let mut t = self.write()?;
        let class = t
            .classes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found(format!("class {id}")))?;
        class.is_active = false;
        Ok(class.clone())
    }

    async fn book_class(&self, booking: NewClassBooking) -> StoreResult<ClassBooking> {
        let mut t = self.write()?;
        let already = t.class_bookings.iter().any(|b| {
            b.class_id == booking.class_id && b.user_id == booking.user_id && b.status.is_active()
        });
        let class = t
            .classes
            .iter_mut()
            .find(|c| c.id == booking.class_id && c.is_active)
            .ok_or_else(|| StoreError::not_found(format!("class {}", booking.class_id)))?;
        if already {
            return Err(StoreError::conflict("class already booked"));
        }
        if !class.has_seat() {
            return Err(StoreError::conflict("class is full"));
        }
        class.current_participants += 1;
        let price = class.regular_price;

        let row = ClassBooking {
            id: ClassBookingId::new(next(&mut t.seq.class_booking)),
            user_id: booking.user_id,
            class_id: booking.class_id,
            price,
            status: BookingStatus::Confirmed,
            booking_code: booking_code("CB"),
            notes: booking.notes,
            created_at: Utc::now(),
        };
        t.class_bookings.push(row.clone());
        Ok(row)
    }

    async fn find_class_booking(&self, id: ClassBookingId) -> StoreResult<Option<ClassBooking>> {
        Ok(self.read()?.class_bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn list_class_bookings(&self, user: UserId) -> StoreResult<Vec<ClassBooking>> {
        let t = self.read()?;
        Ok(t.class_bookings.iter().rev().filter(|b| b.user_id == user).cloned().collect())
    }

    async fn cancel_class_booking(&self, id: ClassBookingId) -> StoreResult<ClassBooking> {
        let mut t = self.write()?;
        let booking = t
            .class_bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::not_found(format!("class booking {id}")))?;
        if !booking.status.is_active() {
            return Err(StoreError::conflict(format!("booking is already {}", booking.status)));
        }
        booking.status = BookingStatus::Cancelled;
        let cancelled = booking.clone();
        if let Some(class) = t.classes.iter_mut().find(|c| c.id == cancelled.class_id) {
            class.current_participants = (class.current_participants - 1).max(0);
        }
        Ok(cancelled)
    }

    async fn book_studio(&self, booking: NewStudioBooking) -> StoreResult<StudioBooking> {
        booking.validate()?;
        let mut t = self.write()?;
        let studio = t
            .studios
            .iter()
            .find(|s| s.id == booking.studio_id && s.is_active)
            .ok_or_else(|| StoreError::not_found(format!("studio {}", booking.studio_id)))?;
        let price = booking.price(studio.price_per_hour);
        if t.studio_bookings.iter().any(|b| booking.clashes_with(b)) {
            return Err(StoreError::conflict("studio is already booked for that slot"));
        }
        let row = StudioBooking {
            id: StudioBookingId::new(next(&mut t.seq.studio_booking)),
            user_id: booking.user_id,
            studio_id: booking.studio_id,
            booking_date: booking.booking_date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            price,
            status: BookingStatus::Confirmed,
            booking_code: booking_code("SB"),
            notes: booking.notes,
            created_at: Utc::now(),
        };
        t.studio_bookings.push(row.clone());
        Ok(row)
    }

    async fn find_studio_booking(&self, id: StudioBookingId) -> StoreResult<Option<StudioBooking>> {
        Ok(self.read()?.studio_bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn list_studio_bookings(&self, user: UserId) -> StoreResult<Vec<StudioBooking>> {
        let t = self.read()?;
        Ok(t.studio_bookings.iter().rev().filter(|b| b.user_id == user).cloned().collect())
    }

    async fn cancel_studio_booking(&self, id: StudioBookingId) -> StoreResult<StudioBooking> {
        let mut t = self.write()?;
        let booking = t
            .studio_bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::not_found(format!("studio booking {id}")))?;
        if !booking.status.is_active() {
            return Err(StoreError::conflict(format!("booking is already {}", booking.status)));
        }
        booking.status = BookingStatus::Cancelled;
        Ok(booking.clone())
    }

    async fn list_gigs(&self, filter: &GigFilter, page: Page) -> StoreResult<Vec<Gig>> {
        let t = self.read()?;
        let mut gigs: Vec<&Gig> = t.gigs.iter().filter(|g| filter.matches(g)).collect();
        gigs.sort_by_key(|g| (g.date, g.id));
        Ok(page.slice(gigs.into_iter().cloned()))
    }

    async fn find_gig(&self, id: GigId) -> StoreResult<Option<Gig>> {
        Ok(self.read()?.gigs.iter().find(|g| g.id == id).cloned())
    }

    async fn create_gig(&self, gig: NewGig) -> StoreResult<Gig> {
        gig.validate()?;
        let host = gig.host()?;
        let mut t = self.write()?;
        if !t.users.contains_key(&host) {
            return Err(StoreError::referential(format!("user {host} does not exist")));
        }
        let row = gig.into_gig(GigId::new(next(&mut t.seq.gig)), host, Utc::now());
        t.gigs.push(row.clone());
        Ok(row)
    }

    async fn cancel_gig(&self, id: GigId) -> StoreResult<Gig> {
        let mut t = self.write()?;
        let gig = t
            .gigs
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| StoreError::not_found(format!("gig {id}")))?;
        gig.status = GigStatus::Cancelled;
        gig.is_active = false;
        Ok(gig.clone())
    }

    async fn apply_to_gig(&self, application: NewGigApplication) -> StoreResult<GigApplication> {
        let (gig_id, user_id) = application.keys()?;
        let mut t = self.write()?;
        let gig = t
            .gigs
            .iter()
            .find(|g| g.id == gig_id && g.is_active)
            .ok_or_else(|| StoreError::not_found(format!("gig {gig_id}")))?;
        if gig.status != GigStatus::Open {
            return Err(StoreError::conflict(format!("gig is {}", gig.status)));
        }
        if t.gig_applications.iter().any(|a| a.gig_id == gig_id && a.user_id == user_id) {
            return Err(StoreError::conflict("already applied to this gig"));
        }
        let id = GigApplicationId::new(next(&mut t.seq.gig_application));
        let row = application.into_application(id, gig_id, user_id, Utc::now());
        t.gig_applications.push(row.clone());
        Ok(row)
    }

    async fn find_gig_application(&self, id: GigApplicationId) -> StoreResult<Option<GigApplication>> {
        Ok(self.read()?.gig_applications.iter().find(|a| a.id == id).cloned())
    }

    async fn list_gig_applications(&self, gig: GigId) -> StoreResult<Vec<GigApplication>> {
        let t = self.read()?;
        Ok(t.gig_applications.iter().filter(|a| a.gig_id == gig).cloned().collect())
    }

    async fn list_user_applications(&self, user: UserId) -> StoreResult<Vec<GigApplication>> {
        let t = self.read()?;
        Ok(t.gig_applications.iter().rev().filter(|a| a.user_id == user).cloned().collect())
    }

    async fn review_application(
        &self,
        id: GigApplicationId,
        review: &ApplicationReview,
    ) -> StoreResult<(GigApplication, Gig)> {
        review.validate()?;
        let mut t = self.write()?;
        let app_idx = t
            .gig_applications
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| StoreError::not_found(format!("gig application {id}")))?;
        let gig_id = t.gig_applications[app_idx].gig_id;
        let gig_idx = t
            .gigs
            .iter()
            .position(|g| g.id == gig_id)
            .ok_or_else(|| StoreError::referential(format!("gig {gig_id} does not exist")))?;

        // Work on copies so a rejected transition leaves both rows untouched.
        let now = Utc::now();
        let mut application = t.gig_applications[app_idx].clone();
        let mut gig = t.gigs[gig_idx].clone();
        review.apply(&mut application, now)?;
        if application.status == shor_core::ApplicationStatus::Accepted {
            gig.fill_spot()?;
        }
        t.gig_applications[app_idx] = application.clone();
        t.gigs[gig_idx] = gig.clone();
        Ok((application, gig))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shor_auth::{ClientInfo, RegistrationRole};

    use crate::model::{NewArtist, NewUser};

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .seed_catalog(&SeedPlan::from_catalog().unwrap())
            .await
            .unwrap();
        store
    }

    fn account(email: &str, role: RegistrationRole) -> NewAccount {
        NewAccount {
            user_id: UserId::new(),
            user: NewUser {
                email: email.to_string(),
                name: "Test User".into(),
                phone: Some("9876543210".into()),
                profile_pic: None,
                gender: None,
                instagram: None,
                height: None,
                bio: None,
            },
            password_hash: "hash".into(),
            role: role.role(),
            extension: match role {
                RegistrationRole::Artist => Some(NewExtension::Artist(NewArtist::placeholder())),
                _ => None,
            },
            client: ClientInfo::default(),
        }
    }

    #[tokio::test]
    async fn seeding_twice_is_a_no_op() {
        let store = seeded().await;
        let again = store
            .seed_catalog(&SeedPlan::from_catalog().unwrap())
            .await
            .unwrap();
        assert_eq!(again, SeedOutcome::Skipped);
        assert_eq!(store.list_actions().await.unwrap().len(), 34);
        assert_eq!(store.list_roles().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn provisioning_without_catalog_writes_nothing() {
        let store = InMemoryStore::new();
        let acct = account("a@b.co", RegistrationRole::Artist);
        let user_id = acct.user_id;
        let err = store.provision_account(acct).await.unwrap_err();
        assert!(matches!(err, StoreError::Referential(_)));
        assert!(store.find_user(user_id).await.unwrap().is_none());
        assert!(store.find_artist_by_user(user_id).await.unwrap().is_none());
        assert!(store.list_audit(&AuditQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = seeded().await;
        store.provision_account(account("a@b.co", RegistrationRole::Student)).await.unwrap();
        let err = store
            .provision_account(account("a@b.co", RegistrationRole::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn revoked_grant_stops_contributing_but_stays_listed() {
        let store = seeded().await;
        let acct = store
            .provision_account(account("a@b.co", RegistrationRole::Student))
            .await
            .unwrap();
        let user = acct.user.id;
        assert_eq!(store.resolve_permissions(user).await.unwrap().len(), 17);

        store.revoke_role(user, "student", &AuditContext::system()).await.unwrap();
        assert!(store.resolve_permissions(user).await.unwrap().is_empty());
        let grants = store.list_grants(user).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert!(!grants[0].is_active);
    }

    #[tokio::test]
    async fn reassigning_a_revoked_role_reactivates_the_row() {
        let store = seeded().await;
        let acct = store
            .provision_account(account("a@b.co", RegistrationRole::Student))
            .await
            .unwrap();
        let user = acct.user.id;
        let ctx = AuditContext::system();
        store.revoke_role(user, "student", &ctx).await.unwrap();
        let grant = store.assign_role(user, "student", None, &ctx).await.unwrap();
        assert_eq!(grant.id, acct.grant.id);
        assert!(matches!(
            store.assign_role(user, "student", None, &ctx).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn admin_keeps_its_seed_time_snapshot() {
        let store = seeded().await;
        let acct = store
            .provision_account(account("root@b.co", RegistrationRole::Student))
            .await
            .unwrap();
        let user = acct.user.id;
        let ctx = AuditContext::system();
        store.assign_role(user, "admin", None, &ctx).await.unwrap();
        assert_eq!(store.resolve_permissions(user).await.unwrap().len(), 34);

        store
            .add_action(
                &NewAction {
                    name: Permission::new("export_reports"),
                    description: None,
                    category: "system".into(),
                    table_name: None,
                    operation: shor_auth::Operation::Read,
                },
                &ctx,
            )
            .await
            .unwrap();
        let perms = store.resolve_permissions(user).await.unwrap();
        assert_eq!(perms.len(), 34);
        assert!(!perms.contains_str("export_reports"));
        assert!(store.roles_granting("export_reports").await.unwrap().is_empty());
        assert_eq!(
            store.roles_granting("read_audit_log").await.unwrap(),
            vec![Role::ADMIN]
        );
    }
}
