//! Closed vocabularies shared by the marketplace tables.
//!
//! Every enum serializes to the lowercase/kebab wire string stored in the
//! database, so the same value round-trips through JSON bodies and SQL text
//! columns.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(DomainError::validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum! {
    /// Derived classification of an account, based on which extension row exists.
    UserType {
        Artist => "artist",
        Studio => "studio",
        Student => "student",
        Basic => "basic",
    }
}

string_enum! {
    ClassLevel {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        All => "all",
    }
}

string_enum! {
    DanceForm {
        Contemporary => "contemporary",
        HipHop => "hip-hop",
        Ballet => "ballet",
        Jazz => "jazz",
        Kathak => "kathak",
        Bharatanatyam => "bharatanatyam",
        Bollywood => "bollywood",
        Salsa => "salsa",
        Freestyle => "freestyle",
        Breaking => "breaking",
        Urban => "urban",
        Classical => "classical",
        Folk => "folk",
        Tango => "tango",
        Bachata => "bachata",
        Other => "other",
    }
}

string_enum! {
    ClassType {
        Workshop => "workshop",
        Regular => "regular",
        Bundle => "bundle",
    }
}

string_enum! {
    /// Lifecycle of class and studio bookings.
    BookingStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Cancelled => "cancelled",
        Completed => "completed",
    }
}

string_enum! {
    GigStatus {
        Open => "open",
        Closed => "closed",
        Filled => "filled",
        Cancelled => "cancelled",
    }
}

string_enum! {
    ApplicationStatus {
        Applied => "applied",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Pending
    }
}

impl Default for GigStatus {
    fn default() -> Self {
        GigStatus::Open
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        ApplicationStatus::Applied
    }
}

impl BookingStatus {
    /// Cancelled and completed bookings no longer occupy a seat or a slot.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_round_trip_through_from_str() {
        for form in DanceForm::ALL {
            assert_eq!(form.as_str().parse::<DanceForm>().unwrap(), *form);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&DanceForm::HipHop).unwrap();
        assert_eq!(json, "\"hip-hop\"");
        let level: ClassLevel = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(level, ClassLevel::All);
    }

    #[test]
    fn unknown_values_are_validation_errors() {
        let err = "waltz".parse::<DanceForm>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn only_pending_and_confirmed_bookings_are_active() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
        assert!(!BookingStatus::Completed.is_active());
    }
}
