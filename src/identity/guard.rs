use std::sync::Arc;

use crate::error::SessionError;

use super::record::Identity;
use super::session::SessionManager;

/// Outcome of the request-time authorization check.
#[derive(Debug, Clone)]
pub enum Access {
    Allow(Identity),
    Deny { redirect_to: &'static str },
}

/// Gates protected operations on session validity. Stateless: consults the
/// session manager and performs no mutation.
pub struct AccessGuard {
    sessions: Arc<SessionManager>,
}

impl AccessGuard {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub fn authorize(&self, token: Option<&str>) -> Access {
        let Some(token) = token else {
            return Access::Deny { redirect_to: "/login" };
        };
        match self.sessions.resolve(token) {
            Ok(identity) => Access::Allow(identity),
            // Any session failure denies identically; the caller learns
            // nothing about why.
            Err(SessionError::NoSession | SessionError::Expired | SessionError::IdentityVanished) => {
                Access::Deny { redirect_to: "/login" }
            }
        }
    }
}
