use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::info;

use crate::error::SessionError;

use super::record::{Identity, IdentityId};
use super::store::IdentityStore;

pub type SessionToken = String;

/// Ephemeral proof of a successful authentication. Holds only a weak
/// reference to the identity; the full record is refetched on every
/// resolution so profile mutations are visible without refreshing sessions.
#[derive(Debug, Clone)]
pub struct Session {
    /// Non-secret id used in logs; never grants access.
    pub session_id: String,
    pub token: SessionToken,
    pub identity_ref: IdentityId,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

/// 256-bit random token, base64url without padding. Cryptographic randomness
/// makes reuse within any practical collision window negligible; no counter,
/// no locking. A failed RNG read aborts rather than hand out a guessable
/// token.
pub(crate) fn gen_token() -> String {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).expect("system RNG unavailable");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Owns the session store lifecycle. Constructed once at process start and
/// handed to every request handler through `AppState`; sessions are created
/// only from an authenticated [`Identity`] and destroyed on logout or expiry.
pub struct SessionManager {
    ttl: Duration,
    store: IdentityStore,
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

impl SessionManager {
    pub fn new(store: IdentityStore) -> Self {
        Self::with_ttl(store, Duration::from_secs(60 * 60))
    }

    pub fn with_ttl(store: IdentityStore, ttl: Duration) -> Self {
        Self { ttl, store, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn create(&self, identity: &Identity) -> Session {
        let now = Instant::now();
        let session = Session {
            session_id: gen_token(),
            token: gen_token(),
            identity_ref: identity.id,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(session.token.clone(), session.clone());
        info!(identity = %identity.id, sid = %session.session_id, ttl_secs = self.ttl.as_secs(), "session.create");
        session
    }

    /// Resolve a token back to the current identity. Expired entries are
    /// dropped on observation; the identity is always refetched from the
    /// store, never served from a serialized copy.
    pub fn resolve(&self, token: &str) -> Result<Identity, SessionError> {
        let now = Instant::now();
        let identity_ref = {
            let sessions = self.sessions.read();
            let Some(session) = sessions.get(token) else {
                return Err(SessionError::NoSession);
            };
            if session.expires_at <= now {
                None
            } else {
                Some(session.identity_ref)
            }
        };
        let Some(identity_ref) = identity_ref else {
            self.sessions.write().remove(token);
            return Err(SessionError::Expired);
        };
        self.store
            .find_by_id(&identity_ref)
            .ok_or(SessionError::IdentityVanished)
    }

    /// Remove a session. Idempotent: invalidating an unknown or
    /// already-invalidated token is a no-op.
    pub fn invalidate(&self, token: &str) {
        if let Some(session) = self.sessions.write().remove(token) {
            info!(sid = %session.session_id, "session.invalidate");
        }
    }

    /// Drop every expired session; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn live_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_distinct_and_urlsafe() {
        let a = gen_token();
        let b = gen_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43); // 32 bytes, base64url, no padding
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // Never the all-zero buffer a swallowed RNG failure would produce.
        let zeroed = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode([0u8; 32]);
        assert_ne!(a, zeroed);
    }

    #[test]
    fn expired_sessions_fail_and_are_swept() {
        let store = IdentityStore::new();
        let identity = store.create_local("ada", "phc".into()).unwrap();
        let sm = SessionManager::with_ttl(store, Duration::from_secs(0));
        let session = sm.create(&identity);
        assert_eq!(sm.resolve(&session.token), Err(SessionError::Expired));
        // The expired entry was dropped on observation.
        assert_eq!(sm.resolve(&session.token), Err(SessionError::NoSession));
        let other = sm.create(&identity);
        assert_eq!(sm.sweep_expired(), 1);
        assert_eq!(sm.live_count(), 0);
        drop(other);
    }
}
