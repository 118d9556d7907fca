use std::sync::Arc;

use tracing::info;

use crate::error::AuthError;

use super::federated::FederatedExchange;
use super::record::{Identity, ProviderProfile};
use super::verifier::CredentialVerifier;

/// One-shot authentication evidence. Consumed by [`Authenticator`] and
/// discarded; never persisted.
#[derive(Debug, Clone)]
pub enum AuthGrant {
    Local { username: String, presented_secret: String },
    /// Handshake already completed upstream; carries the provider's profile.
    Federated { profile: ProviderProfile },
}

/// The single point where "authentication succeeded" is declared. Session
/// creation must only ever happen from an identity returned here, never from
/// a raw grant. Errors pass through unchanged for boundary translation; no
/// retries.
pub struct Authenticator {
    verifier: CredentialVerifier,
    federated: Arc<FederatedExchange>,
}

impl Authenticator {
    pub fn new(verifier: CredentialVerifier, federated: Arc<FederatedExchange>) -> Self {
        Self { verifier, federated }
    }

    pub fn authenticate(&self, grant: AuthGrant) -> Result<Identity, AuthError> {
        match grant {
            AuthGrant::Local { username, presented_secret } => {
                let identity = self.verifier.verify(&username, &presented_secret)?;
                info!(identity = %identity.id, "auth.local ok");
                Ok(identity)
            }
            AuthGrant::Federated { profile } => {
                let identity = self.federated.reconcile(&profile);
                info!(identity = %identity.id, subject = %profile.subject_id, "auth.federated ok");
                Ok(identity)
            }
        }
    }
}
