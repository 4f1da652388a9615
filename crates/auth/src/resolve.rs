//! Grant resolution: user → active roles → active actions → permission set.
//!
//! Pure and deterministic. Storage backends gather the rows and call
//! [`resolve_permissions`]; the Postgres backend performs the same join in SQL.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::permissions::Permission;
use crate::roles::Role;

/// Ordered, duplicate-free set of permission names attached to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.0.contains(permission)
    }

    pub fn contains_str(&self, permission: &str) -> bool {
        self.0.iter().any(|p| p.as_str() == permission)
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Permission> {
        self.0.into_iter().collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An action as seen by resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogAction {
    pub name: Permission,
    pub is_active: bool,
}

/// One role held by a user, with everything resolution needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldRole {
    pub name: Role,
    /// The user → role grant is active (not revoked).
    pub grant_active: bool,
    /// The role row itself is active.
    pub role_active: bool,
    /// Actions of the role's active role → action rows.
    pub actions: Vec<Permission>,
}

/// Union the permissions of every effective role.
///
/// A role contributes only when both the grant and the role are active, and
/// then only its role→action rows whose action is still active. Zero held
/// roles resolve to the empty set.
pub fn resolve_permissions(held: &[HeldRole], catalog: &[CatalogAction]) -> PermissionSet {
    let active: BTreeSet<&Permission> = catalog
        .iter()
        .filter(|a| a.is_active)
        .map(|a| &a.name)
        .collect();

    let mut out = PermissionSet::new();
    for role in held.iter().filter(|r| r.grant_active && r.role_active) {
        for p in role.actions.iter().filter(|p| active.contains(p)) {
            out.insert(p.clone());
        }
    }
    out
}

/// Names of roles that currently contribute to resolution, sorted and deduplicated.
pub fn effective_roles(held: &[HeldRole]) -> Vec<Role> {
    let names: BTreeSet<Role> = held
        .iter()
        .filter(|r| r.grant_active && r.role_active)
        .map(|r| r.name.clone())
        .collect();
    names.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::ACTION_CATALOG;
    use crate::roles::ROLE_CATALOG;
    use proptest::prelude::*;

    fn catalog() -> Vec<CatalogAction> {
        ACTION_CATALOG
            .iter()
            .map(|a| CatalogAction {
                name: a.name.clone(),
                is_active: true,
            })
            .collect()
    }

    fn held(name: &str, grant_active: bool) -> HeldRole {
        let def = crate::roles::find_role(name).unwrap();
        HeldRole {
            name: def.name.clone(),
            grant_active,
            role_active: true,
            actions: def.grants.expand(ACTION_CATALOG),
        }
    }

    #[test]
    fn zero_grants_resolve_to_empty_set() {
        assert!(resolve_permissions(&[], &catalog()).is_empty());
    }

    #[test]
    fn revoked_grant_contributes_nothing() {
        let perms = resolve_permissions(&[held("artist", false)], &catalog());
        assert!(perms.is_empty());
    }

    #[test]
    fn wildcard_is_fixed_at_seed_time() {
        let mut cat = catalog();
        cat.push(CatalogAction {
            name: Permission::new("export_reports"),
            is_active: true,
        });
        let perms = resolve_permissions(&[held("admin", true)], &cat);
        assert_eq!(perms.len(), 34);
        assert!(!perms.contains_str("export_reports"));
    }

    #[test]
    fn inactive_actions_are_excluded_even_for_explicit_grants() {
        let mut cat = catalog();
        for a in cat.iter_mut().filter(|a| a.name.as_str() == "read_class") {
            a.is_active = false;
        }
        let perms = resolve_permissions(&[held("student", true)], &cat);
        assert!(!perms.contains_str("read_class"));
        assert_eq!(perms.len(), 16);
    }

    #[test]
    fn overlapping_roles_do_not_duplicate() {
        let perms = resolve_permissions(&[held("student", true), held("artist", true)], &catalog());
        assert_eq!(perms.len(), 23);
    }

    proptest! {
        #[test]
        fn resolution_is_the_union_of_active_role_grants(
            mask in proptest::collection::vec(any::<(bool, bool)>(), ROLE_CATALOG.len())
        ) {
            let roles: Vec<HeldRole> = ROLE_CATALOG
                .iter()
                .zip(mask.iter())
                .filter(|(_, (held_it, _))| *held_it)
                .map(|(def, (_, active))| held(def.name.as_str(), *active))
                .collect();
            let resolved = resolve_permissions(&roles, &catalog());

            let mut expected = PermissionSet::new();
            for r in roles.iter().filter(|r| r.grant_active) {
                for p in &r.actions {
                    expected.insert(p.clone());
                }
            }
            prop_assert_eq!(resolved, expected);
        }

        #[test]
        fn resolution_is_order_independent(mut order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()) {
            let names = ["student", "artist", "studio_owner", "admin"];
            let forward: Vec<HeldRole> = names.iter().map(|n| held(n, true)).collect();
            order.truncate(3);
            let shuffled: Vec<HeldRole> = order.iter().map(|i| held(names[*i], true)).collect();
            let subset: Vec<HeldRole> = forward
                .iter()
                .filter(|r| shuffled.iter().any(|s| s.name == r.name))
                .cloned()
                .collect();
            prop_assert_eq!(
                resolve_permissions(&shuffled, &catalog()),
                resolve_permissions(&subset, &catalog())
            );
        }
    }
}
