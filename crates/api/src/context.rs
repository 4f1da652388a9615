use shor_auth::{EnrichedSession, EnrichedUser, Principal, Session};
use shor_core::{SessionId, UserId};

/// The authenticated caller of a request.
///
/// Inserted by the auth middleware; immutable for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session: EnrichedSession,
    principal: Principal,
}

impl SessionContext {
    pub fn new(session: EnrichedSession) -> Self {
        let principal = session.user.principal();
        Self { session, principal }
    }

    pub fn user_id(&self) -> UserId {
        self.session.user.profile.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session.session.id
    }

    pub fn user(&self) -> &EnrichedUser {
        &self.session.user
    }

    pub fn session(&self) -> &Session {
        &self.session.session
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn enriched(&self) -> &EnrichedSession {
        &self.session
    }
}
