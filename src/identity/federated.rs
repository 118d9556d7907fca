use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AuthError;

use super::record::{Identity, ProviderProfile};
use super::session::gen_token;
use super::store::IdentityStore;

/// Anti-forgery state tokens are redeemable once, within this window. An
/// abandoned handshake leaks nothing beyond an unredeemed entry, which the
/// lazy sweep in `begin_handshake` reclaims.
const STATE_TTL: Duration = Duration::from_secs(600);

/// Provider endpoints and client credentials, read from the environment at
/// startup.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub redirect_uri: String,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let var = |k: &str, d: &str| std::env::var(k).unwrap_or_else(|_| d.to_string());
        Self {
            client_id: var("HUSHGATE_PROVIDER_CLIENT_ID", "hushgate-dev"),
            client_secret: var("HUSHGATE_PROVIDER_CLIENT_SECRET", ""),
            auth_url: var("HUSHGATE_PROVIDER_AUTH_URL", "https://accounts.example.com/o/oauth2/auth"),
            token_url: var("HUSHGATE_PROVIDER_TOKEN_URL", "https://accounts.example.com/o/oauth2/token"),
            profile_url: var("HUSHGATE_PROVIDER_PROFILE_URL", "https://accounts.example.com/oauth2/v3/userinfo"),
            redirect_uri: var("HUSHGATE_CALLBACK_URL", "http://localhost:3000/auth/provider/callback"),
        }
    }
}

/// Transport seam for the provider handshake. All transport failures are
/// collapsed into the two typed exchange errors; the core never inspects
/// provider-specific detail.
#[async_trait]
pub trait ProviderService: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<String, AuthError>;
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    sub: String,
    #[serde(default)]
    name: Option<String>,
}

/// Production [`ProviderService`] over HTTPS.
pub struct HttpProviderService {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl HttpProviderService {
    pub fn new(config: ProviderConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { config, http }
    }
}

#[async_trait]
impl ProviderService for HttpProviderService {
    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!("provider token exchange transport error: {e}");
                AuthError::ProviderExchangeFailed
            })?;
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "provider token exchange rejected");
            return Err(AuthError::ProviderExchangeFailed);
        }
        let token: TokenResponse = resp.json().await.map_err(|_| AuthError::ProviderExchangeFailed)?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError> {
        let resp = self
            .http
            .get(&self.config.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!("provider profile fetch transport error: {e}");
                AuthError::ProviderProfileUnavailable
            })?;
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "provider profile fetch rejected");
            return Err(AuthError::ProviderProfileUnavailable);
        }
        let profile: ProfileResponse = resp.json().await.map_err(|_| AuthError::ProviderProfileUnavailable)?;
        Ok(ProviderProfile { subject_id: profile.sub, display_name: profile.name })
    }
}

/// Where to send the browser, plus the state token bound to the callback.
#[derive(Debug, Clone)]
pub struct RedirectTarget {
    pub url: String,
    pub state: String,
}

/// Drives the provider handshake: redirect-out, code exchange, profile
/// fetch, then link-or-create against the identity store.
pub struct FederatedExchange {
    config: ProviderConfig,
    service: Arc<dyn ProviderService>,
    store: IdentityStore,
    pending_states: Mutex<HashMap<String, Instant>>,
}

impl FederatedExchange {
    pub fn new(config: ProviderConfig, service: Arc<dyn ProviderService>, store: IdentityStore) -> Self {
        Self { config, service, store, pending_states: Mutex::new(HashMap::new()) }
    }

    /// Build the provider authorization URL and record a fresh anti-forgery
    /// state token the callback must present.
    pub fn begin_handshake(&self, scopes: &[&str]) -> RedirectTarget {
        let state = gen_token();
        {
            let now = Instant::now();
            let mut pending = self.pending_states.lock();
            pending.retain(|_, issued| now.duration_since(*issued) < STATE_TTL);
            pending.insert(state.clone(), now);
        }
        let scope = scopes.join(" ");
        let params = [
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state.as_str()),
        ];
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?{}", self.config.auth_url, query);
        info!("federated.begin scopes={:?}", scopes);
        RedirectTarget { url, state }
    }

    /// Redeem the state token (once), then exchange the authorization code
    /// and fetch the provider profile.
    pub async fn complete_handshake(&self, code: &str, state: &str) -> Result<ProviderProfile, AuthError> {
        let issued = self.pending_states.lock().remove(state);
        match issued {
            Some(at) if at.elapsed() < STATE_TTL => {}
            Some(_) => {
                warn!("federated.complete expired state token");
                return Err(AuthError::StateMismatch);
            }
            None => {
                warn!("federated.complete unknown or reused state token");
                return Err(AuthError::StateMismatch);
            }
        }
        let access_token = self.service.exchange_code(code).await?;
        let profile = self.service.fetch_profile(&access_token).await?;
        info!(subject = %profile.subject_id, "federated.complete");
        Ok(profile)
    }

    /// Link-or-create: exactly one identity per provider subject, even under
    /// concurrent callbacks (the store's find-or-create is atomic).
    pub fn reconcile(&self, profile: &ProviderProfile) -> Identity {
        self.store.find_or_create_federated(profile)
    }
}
