//! Catalog seeding.

use thiserror::Error;
use tracing::{info, instrument};

use shor_auth::{CatalogError, SeedOutcome, SeedPlan};

use crate::error::StoreError;
use crate::repository::CatalogRepository;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeedError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Seed the built-in roles, actions and default grants, once.
///
/// The plan is validated before the store is touched; the store writes it in
/// one transaction or skips entirely if roles already exist.
#[instrument(skip(store), err)]
pub async fn seed<S>(store: &S) -> Result<SeedOutcome, SeedError>
where
    S: CatalogRepository + ?Sized,
{
    let plan = SeedPlan::from_catalog()?;
    let outcome = store.seed_catalog(&plan).await?;
    match outcome {
        SeedOutcome::Seeded {
            roles,
            actions,
            grants,
        } => info!(roles, actions, grants, "seeded role/action catalog"),
        SeedOutcome::Skipped => info!("role/action catalog already present, seed skipped"),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditContext, NewAccount, NewUser};
    use crate::repository::{AccountRepository, GrantRepository, InMemoryStore};
    use shor_auth::{ClientInfo, NewAction, Operation, Permission, Role};
    use shor_core::UserId;

    #[tokio::test]
    async fn seeds_then_skips() {
        let store = InMemoryStore::new();
        let first = seed(&store).await.unwrap();
        assert_eq!(
            first,
            SeedOutcome::Seeded {
                roles: 4,
                actions: 34,
                grants: 94
            }
        );
        assert_eq!(seed(&store).await.unwrap(), SeedOutcome::Skipped);
    }

    #[tokio::test]
    async fn admin_is_written_as_one_row_per_action() {
        let store = InMemoryStore::new();
        seed(&store).await.unwrap();
        let roles = store.list_roles().await.unwrap();
        let admin = roles.iter().find(|r| r.role.name == Role::ADMIN).unwrap();
        assert_eq!(admin.permissions.len(), 34);
        assert_eq!(store.roles_granting("read_audit_log").await.unwrap(), vec![Role::ADMIN]);
        // Nobody has been granted anything yet.
        let nobody = shor_core::UserId::new();
        assert!(store.resolve_permissions(nobody).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn actions_added_after_seeding_do_not_reach_admin() {
        let store = InMemoryStore::arc();
        seed(store.as_ref()).await.unwrap();
        let acct = store
            .provision_account(NewAccount {
                user_id: UserId::new(),
                user: NewUser {
                    email: "root@example.com".into(),
                    name: "Root".into(),
                    phone: None,
                    profile_pic: None,
                    gender: None,
                    instagram: None,
                    height: None,
                    bio: None,
                },
                password_hash: "x".into(),
                role: Role::STUDENT,
                extension: None,
                client: ClientInfo::default(),
            })
            .await
            .unwrap();
        let user = acct.user.id;
        let ctx = AuditContext::system();
        store.assign_role(user, "admin", None, &ctx).await.unwrap();
        let at_seed = store.resolve_permissions(user).await.unwrap();
        assert_eq!(at_seed.len(), 34);

        store
            .add_action(
                &NewAction {
                    name: Permission::new("export_reports"),
                    description: None,
                    category: "system".into(),
                    table_name: None,
                    operation: Operation::Read,
                },
                &ctx,
            )
            .await
            .unwrap();

        let after = store.resolve_permissions(user).await.unwrap();
        assert_eq!(after, at_seed);
        assert!(!after.contains_str("export_reports"));
    }
}
