//! Unified error taxonomy for the authentication core.
//! Lower components return these typed errors unchanged; only the HTTP
//! boundary in `server` translates them into user-facing redirects or status
//! codes, so internal detail (e.g. whether a username exists) never leaks.

use thiserror::Error;

/// Errors produced while establishing who the caller is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no such identity")]
    NoSuchIdentity,
    /// The identity exists but was created via the federated strategy only.
    #[error("identity has no local credential")]
    NoLocalCredential,
    #[error("secret verification failed")]
    BadSecret,
    #[error("username already registered")]
    DuplicateUsername,
    #[error("provider code exchange failed")]
    ProviderExchangeFailed,
    #[error("provider profile unavailable")]
    ProviderProfileUnavailable,
    /// Callback carried an unknown, expired, or already-redeemed state token.
    #[error("handshake state mismatch")]
    StateMismatch,
    /// Too many recent failures for this username; retry after the backoff window.
    #[error("login attempts throttled")]
    Throttled,
    /// A collaborator (store, provider transport) failed unexpectedly.
    /// Always surfaced, never swallowed: a failed lookup is a denial.
    #[error("upstream unavailable")]
    UpstreamUnavailable,
}

/// Errors produced while resolving a session token back to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no session for token")]
    NoSession,
    #[error("session expired")]
    Expired,
    /// The session was live but the identity it referenced no longer exists.
    #[error("identity vanished")]
    IdentityVanished,
}

impl AuthError {
    /// Map to an HTTP status code for non-redirect boundaries.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::NoSuchIdentity
            | AuthError::NoLocalCredential
            | AuthError::BadSecret => 401,
            AuthError::DuplicateUsername => 409,
            AuthError::StateMismatch => 403,
            AuthError::Throttled => 429,
            AuthError::ProviderExchangeFailed
            | AuthError::ProviderProfileUnavailable
            | AuthError::UpstreamUnavailable => 503,
        }
    }
}

impl SessionError {
    pub fn http_status(&self) -> u16 {
        match self {
            SessionError::NoSession | SessionError::Expired => 401,
            SessionError::IdentityVanished => 401,
        }
    }
}
