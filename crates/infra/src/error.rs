//! Storage error model and SQLx error mapping.
//!
//! | SQLx error | SQLSTATE | StoreError |
//! |------------|----------|------------|
//! | unique violation | `23505` | `Conflict` |
//! | foreign key violation | `23503` | `Referential` |
//! | check violation | `23514` | `Validation` |
//! | other database error | any | `Storage` |
//! | row not found | n/a | `NotFound` naming the entity |
//! | pool closed, IO, decode | n/a | `Storage` |

use thiserror::Error;

use shor_core::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Uniqueness or state conflict (duplicate email, class full, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A row references something that does not exist.
    #[error("referential failure: {0}")]
    Referential(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn referential(what: impl Into<String>) -> Self {
        Self::Referential(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(m) | DomainError::InvalidId(m) => StoreError::Validation(m),
            DomainError::Conflict(m) => StoreError::Conflict(m),
            DomainError::NotFound(m) => StoreError::NotFound(m),
            DomainError::InvariantViolation(m) => StoreError::Storage(format!("invariant violated: {m}")),
        }
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::Referential(msg),
                Some("23514") => StoreError::Validation(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(entity_of(operation)),
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

const VERBS: &[&str] = &[
    "add", "apply", "assign", "book", "cancel", "create", "deactivate", "delete", "extend",
    "find", "insert", "list", "mark", "record", "review", "revoke", "seed", "set", "take",
    "to", "update", "upsert",
];

/// The thing an operation looks up: `find_user_by_email` becomes `user`.
fn entity_of(operation: &str) -> String {
    let subject = operation.split("_by_").next().unwrap_or(operation);
    let mut words: Vec<&str> = subject.split('_').collect();
    while words.len() > 1 && VERBS.contains(&words[0]) {
        words.remove(0);
    }
    words.join(" ")
}

/// Check if an error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_onto_store_errors() {
        assert!(matches!(
            StoreError::from(DomainError::conflict("full")),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            StoreError::from(DomainError::validation("bad")),
            StoreError::Validation(_)
        ));
    }

    #[test]
    fn non_database_errors_are_storage_failures() {
        let err = map_sqlx_error("find_user", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Storage(m) if m.contains("find_user")));
    }

    #[test]
    fn missing_rows_name_the_entity() {
        let err = map_sqlx_error("find_user", sqlx::Error::RowNotFound);
        assert_eq!(err, StoreError::NotFound("user".into()));
        assert_eq!(err.to_string(), "not found: user");

        assert_eq!(entity_of("find_user_by_email"), "user");
        assert_eq!(entity_of("apply_to_gig"), "gig");
        assert_eq!(entity_of("cancel_class_booking"), "class booking");
        assert_eq!(entity_of("seed_insert_role"), "role");
        assert_eq!(entity_of("password_hash"), "password hash");
    }
}
