use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::AuthError;

use super::record::{Identity, IdentityId, ProviderProfile};

/// Durable record store for identities with secondary lookup by username
/// (local accounts) and by federated subject id.
///
/// All uniqueness checks and the find-or-create path run inside a single
/// write-lock critical section, which gives the compare-and-create guarantee
/// concurrent callbacks rely on: exactly one winner per new federated
/// subject, losers observe the winner's record.
#[derive(Default)]
struct Inner {
    by_id: HashMap<IdentityId, Identity>,
    username_index: HashMap<String, IdentityId>,
    subject_index: HashMap<String, IdentityId>,
}

#[derive(Clone, Default)]
pub struct IdentityStore(Arc<RwLock<Inner>>);

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_id(&self, id: &IdentityId) -> Option<Identity> {
        self.0.read().by_id.get(id).cloned()
    }

    pub fn find_by_username(&self, username: &str) -> Option<Identity> {
        let inner = self.0.read();
        let id = inner.username_index.get(username)?;
        inner.by_id.get(id).cloned()
    }

    pub fn find_by_federated_subject(&self, subject_id: &str) -> Option<Identity> {
        let inner = self.0.read();
        let id = inner.subject_index.get(subject_id)?;
        inner.by_id.get(id).cloned()
    }

    /// Create a local-strategy identity. Fails with `DuplicateUsername` if the
    /// username is already registered; the existing identity is unaffected.
    pub fn create_local(&self, username: &str, password_hash: String) -> Result<Identity, AuthError> {
        let mut inner = self.0.write();
        if inner.username_index.contains_key(username) {
            return Err(AuthError::DuplicateUsername);
        }
        let identity = Identity::new_local(username.to_string(), password_hash);
        inner.username_index.insert(username.to_string(), identity.id);
        inner.by_id.insert(identity.id, identity.clone());
        info!(identity = %identity.id, "identity.create_local");
        Ok(identity)
    }

    /// Find-or-create for the federated strategy: maps a provider subject id
    /// to an existing identity or creates one with no local credential.
    /// Atomic; N concurrent calls for a never-seen subject produce exactly
    /// one identity and all callers receive it.
    pub fn find_or_create_federated(&self, profile: &ProviderProfile) -> Identity {
        let mut inner = self.0.write();
        if let Some(id) = inner.subject_index.get(&profile.subject_id) {
            if let Some(existing) = inner.by_id.get(id) {
                return existing.clone();
            }
        }
        let identity = Identity::new_federated(profile.subject_id.clone());
        inner.subject_index.insert(profile.subject_id.clone(), identity.id);
        inner.by_id.insert(identity.id, identity.clone());
        info!(identity = %identity.id, "identity.create_federated");
        identity
    }

    /// Persist mutated fields of an existing identity. The id, username and
    /// federated subject are fixed at creation and not rewritable here.
    pub fn update(&self, identity: &Identity) -> Result<(), AuthError> {
        let mut inner = self.0.write();
        let Some(slot) = inner.by_id.get_mut(&identity.id) else {
            return Err(AuthError::NoSuchIdentity);
        };
        slot.password_hash = identity.password_hash.clone();
        slot.secret = identity.secret.clone();
        Ok(())
    }

    /// Remove an identity. Used by account-deletion paths and tests; sessions
    /// referencing it will fail resolution with `IdentityVanished`.
    pub fn remove(&self, id: &IdentityId) -> bool {
        let mut inner = self.0.write();
        let Some(identity) = inner.by_id.remove(id) else { return false };
        if let Some(u) = &identity.username {
            inner.username_index.remove(u);
        }
        if let Some(s) = &identity.federated_subject {
            inner.subject_index.remove(s);
        }
        true
    }

    /// All identities carrying a non-empty application payload, for the
    /// read-only listing endpoint.
    pub fn with_secrets(&self) -> Vec<Identity> {
        self.0
            .read()
            .by_id
            .values()
            .filter(|i| i.secret.as_deref().is_some_and(|s| !s.is_empty()))
            .cloned()
            .collect()
    }
}
