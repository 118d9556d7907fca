use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque stable identifier for an [`Identity`]; assigned once on creation.
pub type IdentityId = Uuid;

/// The durable principal record.
///
/// At least one of `password_hash` (local strategy) or `federated_subject`
/// (federated strategy) is present; the store enforces this on creation and
/// keeps `username` / `federated_subject` unique across identities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: IdentityId,
    /// Login name for local accounts; absent for federated-only identities.
    pub username: Option<String>,
    /// Salted PHC-format hash of the local secret. Never plaintext.
    pub password_hash: Option<String>,
    /// Provider-issued stable subject id, set when created or linked via
    /// federated login.
    pub federated_subject: Option<String>,
    /// Free-form payload owned by the application layer; passed through
    /// untouched by the auth core.
    pub secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub(crate) fn new_local(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: Some(username),
            password_hash: Some(password_hash),
            federated_subject: None,
            secret: None,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn new_federated(subject_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: None,
            password_hash: None,
            federated_subject: Some(subject_id),
            secret: None,
            created_at: Utc::now(),
        }
    }
}

/// Snapshot of what the provider asserted about the user. Transient: consumed
/// by reconciliation and discarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider-stable subject identifier (the reconciliation key).
    pub subject_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}
