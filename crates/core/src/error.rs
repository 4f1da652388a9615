//! Domain error model.

use thiserror::Error;

/// Failures of pure domain logic: bad input, broken invariants, unparseable
/// ids and state conflicts. Storage and transport errors live in their own
/// layers and convert from this one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input (unknown role selector, negative price).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Path or body id that does not parse, or a serial id ≤ 0.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The row exists but its state forbids the change (full class, closed gig).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// True for errors caused by the caller's input rather than server state.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::InvariantViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        assert_eq!(DomainError::not_found("class 7").to_string(), "class 7 not found");
        assert_eq!(
            DomainError::validation("phone too short").to_string(),
            "validation failed: phone too short"
        );
    }

    #[test]
    fn only_invariant_violations_are_server_side() {
        assert!(DomainError::conflict("class is full").is_client_error());
        assert!(DomainError::invalid_id("abc").is_client_error());
        assert!(!DomainError::invariant("class without artist").is_client_error());
    }
}
