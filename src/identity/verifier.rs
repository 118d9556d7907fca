use std::collections::HashMap;
use std::time::{Duration, Instant};

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use parking_lot::Mutex;
use password_hash::{PasswordHash, SaltString};
use tracing::warn;

use crate::error::AuthError;

use super::record::Identity;
use super::store::IdentityStore;

/// Hash a secret with Argon2 and a fresh random salt, PHC string output.
pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|_| AuthError::UpstreamUnavailable)?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|_| AuthError::UpstreamUnavailable)?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|_| AuthError::UpstreamUnavailable)?
        .to_string();
    Ok(phc)
}

/// Verify a presented secret against a stored PHC hash. Argon2 recomputes the
/// hash under the stored parameters and compares in constant time, so this
/// does not leak timing relative to the correct hash.
pub fn verify_hash(phc: &str, presented: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(phc) {
        let argon2 = Argon2::default();
        argon2.verify_password(presented.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

const THROTTLE_BASE: Duration = Duration::from_millis(250);
const THROTTLE_CAP: Duration = Duration::from_secs(60);

struct ThrottleEntry {
    failures: u32,
    locked_until: Instant,
}

/// Per-username exponential backoff on failed verifications. A failure locks
/// the username for `BASE * 2^(failures-1)` capped at `CAP`; success clears
/// the entry. Entries are dropped once their window is a full cap in the
/// past, so the map stays bounded under normal operation.
#[derive(Default)]
pub struct LoginThrottle {
    entries: Mutex<HashMap<String, ThrottleEntry>>,
}

impl LoginThrottle {
    pub fn check(&self, username: &str) -> Result<(), AuthError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, e| now < e.locked_until + THROTTLE_CAP);
        match entries.get(username) {
            Some(e) if now < e.locked_until => Err(AuthError::Throttled),
            _ => Ok(()),
        }
    }

    pub fn record_failure(&self, username: &str) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(username.to_string()).or_insert(ThrottleEntry {
            failures: 0,
            locked_until: Instant::now(),
        });
        entry.failures = entry.failures.saturating_add(1);
        let delay = THROTTLE_BASE
            .checked_mul(1u32 << (entry.failures - 1).min(20))
            .unwrap_or(THROTTLE_CAP)
            .min(THROTTLE_CAP);
        entry.locked_until = Instant::now() + delay;
    }

    pub fn clear(&self, username: &str) {
        self.entries.lock().remove(username);
    }
}

/// Validates locally-presented credentials against the identity store.
/// Performs no mutation beyond throttle bookkeeping and never logs the
/// presented secret.
pub struct CredentialVerifier {
    store: IdentityStore,
    throttle: LoginThrottle,
}

impl CredentialVerifier {
    pub fn new(store: IdentityStore) -> Self {
        Self { store, throttle: LoginThrottle::default() }
    }

    pub fn verify(&self, username: &str, presented_secret: &str) -> Result<Identity, AuthError> {
        self.throttle.check(username)?;
        let Some(identity) = self.store.find_by_username(username) else {
            self.throttle.record_failure(username);
            return Err(AuthError::NoSuchIdentity);
        };
        let Some(phc) = identity.password_hash.as_deref() else {
            // Federated-only account; a secret can never match it.
            self.throttle.record_failure(username);
            return Err(AuthError::NoLocalCredential);
        };
        if !verify_hash(phc, presented_secret) {
            warn!(username, "auth.verify failed");
            self.throttle.record_failure(username);
            return Err(AuthError::BadSecret);
        }
        self.throttle.clear(username);
        Ok(identity)
    }
}
