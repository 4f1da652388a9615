//! Strongly-typed identifiers used across the marketplace.
//!
//! Users and sessions are keyed by UUIDs (the identity provider mints them);
//! catalog, grant and marketplace rows use database serials.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a user account (the join anchor for every other entity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of an authenticated session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(SessionId, "SessionId");

macro_rules! serial_ids {
    ($($(#[$meta:meta])* $t:ident => $name:literal),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $t(i32);

            impl $t {
                pub fn new(value: i32) -> Self {
                    Self(value)
                }

                pub fn get(self) -> i32 {
                    self.0
                }
            }

            impl core::fmt::Display for $t {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    core::fmt::Display::fmt(&self.0, f)
                }
            }

            impl From<i32> for $t {
                fn from(value: i32) -> Self {
                    Self(value)
                }
            }

            impl From<$t> for i32 {
                fn from(value: $t) -> Self {
                    value.0
                }
            }

            impl FromStr for $t {
                type Err = DomainError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    let value = s
                        .parse::<i32>()
                        .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                    if value <= 0 {
                        return Err(DomainError::invalid_id(format!("{}: must be positive", $name)));
                    }
                    Ok(Self(value))
                }
            }
        )+
    };
}

serial_ids! {
    /// Row id in the role catalog.
    RoleId => "RoleId",
    /// Row id in the action (permission) catalog.
    ActionId => "ActionId",
    /// Row id of a user → role grant.
    RoleGrantId => "RoleGrantId",
    AuditEntryId => "AuditEntryId",
    ArtistId => "ArtistId",
    StudioId => "StudioId",
    StudentId => "StudentId",
    ClassId => "ClassId",
    ClassBookingId => "ClassBookingId",
    StudioBookingId => "StudioBookingId",
    GigId => "GigId",
    GigApplicationId => "GigApplicationId",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_ids_reject_non_positive_values() {
        assert!("0".parse::<ClassId>().is_err());
        assert!("-4".parse::<GigId>().is_err());
        assert_eq!("17".parse::<StudioId>().unwrap().get(), 17);
    }

    #[test]
    fn user_id_parse_error_names_the_type() {
        let err = "not-a-uuid".parse::<UserId>().unwrap_err();
        assert!(err.to_string().contains("UserId"));
    }
}
