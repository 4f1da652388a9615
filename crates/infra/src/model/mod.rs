//! Row types persisted by the repositories.

pub mod account;
pub mod audit;
pub mod marketplace;
pub mod profiles;

pub use account::{
    NewAccount, NewExtension, NewUser, ProvisionedAccount, Verification, VerificationKind,
};
pub use audit::{actions as audit_actions, AuditContext, AuditEntry, AuditQuery, NewAuditEntry};
pub use marketplace::{
    ApplicationReview, Class, ClassBooking, ClassFilter, Gig, GigApplication, GigFilter, NewClass,
    NewClassBooking, NewGig, NewGigApplication, NewStudioBooking, StudioBooking, StudioFilter,
};
pub use profiles::{
    Artist, ArtistUpdate, NewArtist, NewStudio, Student, StudentUpdate, Studio, StudioUpdate,
};

use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One-based pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Clamp to `page >= 1` and `1 <= limit <= 100`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }

    pub fn limit(&self) -> usize {
        self.limit as usize
    }

    /// Apply the window to an already ordered iterator.
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.offset()).take(self.limit()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        assert_eq!(Page::new(0, 500), Page { page: 1, limit: 100 });
        assert_eq!(Page::new(3, 0).limit, 1);
    }

    #[test]
    fn slice_skips_previous_pages() {
        let page = Page::new(2, 2);
        assert_eq!(page.slice(1..=5), vec![3, 4]);
    }
}
