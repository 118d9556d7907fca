//! Authentication and session-identity core: identity records, credential
//! verification, the federated handshake, and session lifecycle.
//! Keep the public surface thin and split implementation across sub-modules.

mod authenticator;
mod federated;
mod guard;
mod record;
pub mod store;
mod session;
mod verifier;

pub use authenticator::{AuthGrant, Authenticator};
pub use federated::{
    FederatedExchange, HttpProviderService, ProviderConfig, ProviderService, RedirectTarget,
};
pub use guard::{Access, AccessGuard};
pub use record::{Identity, IdentityId, ProviderProfile};
pub use session::{Session, SessionManager, SessionToken};
pub use store::IdentityStore;
pub use verifier::{hash_secret, verify_hash, CredentialVerifier, LoginThrottle};
