//! `shor-core`: shared building blocks for the studio marketplace.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod vocab;

pub use error::DomainError;
pub use id::{
    ActionId, ArtistId, AuditEntryId, ClassBookingId, ClassId, GigApplicationId, GigId, RoleGrantId,
    RoleId, SessionId, StudentId, StudioBookingId, StudioId, UserId,
};
pub use vocab::{
    ApplicationStatus, BookingStatus, ClassLevel, ClassType, DanceForm, GigStatus, UserType,
};
