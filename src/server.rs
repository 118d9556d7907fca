//!
//! hushgate HTTP server
//! --------------------
//! Axum-based HTTP surface for the authentication gateway.
//!
//! Responsibilities:
//! - Session cookie handling (opaque token only; framing stays here, the
//!   core only ever sees the token value).
//! - Login/register/logout endpoints backed by the `identity` core.
//! - Federated handshake endpoints (redirect-out and provider callback).
//! - The guarded secret-submission endpoint and the public listing.
//!
//! Every auth or session failure maps to an explicit redirect or status;
//! nothing falls through to a success path on a collaborator error.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::identity::{
    Access, AccessGuard, AuthGrant, Authenticator, CredentialVerifier, FederatedExchange,
    HttpProviderService, Identity, IdentityStore, ProviderConfig, ProviderService, SessionManager,
};
use crate::{error::AuthError, identity::hash_secret};

const SESSION_COOKIE: &str = "hushgate_session";

/// Scopes requested from the identity provider.
const PROVIDER_SCOPES: &[&str] = &["email", "profile"];

/// Shared server state injected into all handlers. Constructed once at
/// process start; no ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub store: IdentityStore,
    pub sessions: Arc<SessionManager>,
    pub authenticator: Arc<Authenticator>,
    pub federated: Arc<FederatedExchange>,
    pub guard: Arc<AccessGuard>,
}

impl AppState {
    /// Wire the core components around a fresh store. The provider transport
    /// is injectable so tests can drive the handshake without a network.
    pub fn new(provider_config: ProviderConfig, provider: Arc<dyn ProviderService>) -> Self {
        let store = IdentityStore::new();
        let sessions = Arc::new(SessionManager::new(store.clone()));
        let federated = Arc::new(FederatedExchange::new(provider_config, provider, store.clone()));
        let authenticator = Arc::new(Authenticator::new(
            CredentialVerifier::new(store.clone()),
            federated.clone(),
        ));
        let guard = Arc::new(AccessGuard::new(sessions.clone()));
        Self { store, sessions, authenticator, federated, guard }
    }

    pub fn with_http_provider(provider_config: ProviderConfig) -> Self {
        let provider = Arc::new(HttpProviderService::new(provider_config.clone()));
        Self::new(provider_config, provider)
    }
}

/// Mount all routes onto a router. Split from `run` so tests can drive the
/// full HTTP surface in-process.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", get(logout))
        .route("/auth/provider", get(auth_provider))
        .route("/auth/provider/callback", get(auth_provider_callback))
        .route("/submit", get(submit_page).post(submit))
        .route("/secrets", get(secrets))
        .with_state(state)
}

/// Start the hushgate HTTP server on the configured port.
pub async fn run() -> anyhow::Result<()> {
    let http_port: u16 = std::env::var("HUSHGATE_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);
    let state = AppState::with_http_provider(ProviderConfig::from_env());

    // Background session sweeper so expired entries do not accumulate
    // between resolutions.
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            loop {
                let removed = sessions.sweep_expired();
                if removed > 0 {
                    tracing::debug!(removed, "session_sweep");
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });
    }

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// --- cookie plumbing -------------------------------------------------------

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // SameSite=Lax rather than Strict: the provider callback arrives as a
    // cross-site redirect and must still see the cookie it just set.
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/",
        SESSION_COOKIE, token
    ))
    .unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Lax; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

/// Mint a session for an authenticated identity and redirect to the listing
/// with the cookie set.
fn session_redirect(state: &AppState, identity: &Identity, to: &str) -> Response {
    let session = state.sessions.create(identity);
    let mut headers = HeaderMap::new();
    headers.insert("Set-Cookie", set_session_cookie(&session.token));
    (headers, Redirect::to(to)).into_response()
}

// --- pages -----------------------------------------------------------------

// Rendering is out of scope; these minimal bodies exist so the redirect
// targets resolve during manual testing.

async fn home() -> Html<&'static str> {
    Html("<h1>hushgate</h1><p><a href=\"/login\">Login</a> | <a href=\"/register\">Register</a> | <a href=\"/auth/provider\">Login with provider</a></p>")
}

async fn login_page() -> Html<&'static str> {
    Html("<form method=\"post\" action=\"/login\"><input name=\"username\"><input type=\"password\" name=\"secret\"><button>Login</button></form>")
}

async fn register_page() -> Html<&'static str> {
    Html("<form method=\"post\" action=\"/register\"><input name=\"username\"><input type=\"password\" name=\"secret\"><button>Register</button></form>")
}

// --- local strategy --------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CredentialPayload {
    pub username: String,
    pub secret: String,
}

async fn login(State(state): State<AppState>, Form(payload): Form<CredentialPayload>) -> Response {
    let grant = AuthGrant::Local {
        username: payload.username,
        presented_secret: payload.secret,
    };
    match state.authenticator.authenticate(grant) {
        Ok(identity) => session_redirect(&state, &identity, "/secrets"),
        Err(AuthError::Throttled) => Redirect::to("/login?error=throttled").into_response(),
        Err(AuthError::UpstreamUnavailable) => upstream_unavailable(),
        // All credential failures redirect identically; no username
        // enumeration through the response shape.
        Err(_) => Redirect::to("/login?error=1").into_response(),
    }
}

async fn register(State(state): State<AppState>, Form(payload): Form<CredentialPayload>) -> Response {
    let phc = match hash_secret(&payload.secret) {
        Ok(phc) => phc,
        Err(e) => {
            error!("register hashing error: {e}");
            return upstream_unavailable();
        }
    };
    if let Err(e) = state.store.create_local(&payload.username, phc) {
        return match e {
            AuthError::DuplicateUsername => Redirect::to("/register?error=taken").into_response(),
            e => {
                error!("register store error: {e}");
                upstream_unavailable()
            }
        };
    }
    // Sessions are minted only from an Authenticator result, so a fresh
    // registration logs in through the same verification path as /login.
    let grant = AuthGrant::Local {
        username: payload.username,
        presented_secret: payload.secret,
    };
    match state.authenticator.authenticate(grant) {
        Ok(identity) => session_redirect(&state, &identity, "/secrets"),
        Err(e) => {
            error!("post-registration authentication failed: {e}");
            Redirect::to("/login?error=1").into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token_from_headers(&headers) {
        state.sessions.invalidate(&token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (h, Redirect::to("/")).into_response()
}

// --- federated strategy ----------------------------------------------------

async fn auth_provider(State(state): State<AppState>) -> Response {
    let target = state.federated.begin_handshake(PROVIDER_SCOPES);
    Redirect::to(&target.url).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

async fn auth_provider_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (Some(code), Some(handshake_state)) = (params.code, params.state) else {
        // Provider declined or the user abandoned; nothing to redeem.
        info!(error = ?params.error, "federated callback without code");
        return Redirect::to("/login").into_response();
    };
    let profile = match state.federated.complete_handshake(&code, &handshake_state).await {
        Ok(profile) => profile,
        Err(e) => {
            error!("federated handshake failed: {e}");
            return Redirect::to("/login").into_response();
        }
    };
    match state.authenticator.authenticate(AuthGrant::Federated { profile }) {
        Ok(identity) => session_redirect(&state, &identity, "/secrets"),
        Err(e) => {
            error!("federated reconcile failed: {e}");
            Redirect::to("/login").into_response()
        }
    }
}

// --- protected surface -----------------------------------------------------

async fn submit_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.guard.authorize(session_token_from_headers(&headers).as_deref()) {
        Access::Allow(_) => Html(
            "<form method=\"post\" action=\"/submit\"><input name=\"secret\"><button>Share</button></form>",
        )
        .into_response(),
        Access::Deny { redirect_to } => Redirect::to(redirect_to).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    pub secret: String,
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(payload): Form<SubmitPayload>,
) -> Response {
    let identity = match state.guard.authorize(session_token_from_headers(&headers).as_deref()) {
        Access::Allow(identity) => identity,
        Access::Deny { redirect_to } => return Redirect::to(redirect_to).into_response(),
    };
    let mut updated = identity;
    updated.secret = Some(payload.secret);
    match state.store.update(&updated) {
        Ok(()) => Redirect::to("/secrets").into_response(),
        // The identity vanished between resolution and write; deny rather
        // than fabricate a success.
        Err(AuthError::NoSuchIdentity) => Redirect::to("/login").into_response(),
        Err(e) => {
            error!("submit store error: {e}");
            upstream_unavailable()
        }
    }
}

/// Read-only listing of every identity carrying a payload. Not part of the
/// auth core; mirrors the upstream listing surface.
async fn secrets(State(state): State<AppState>) -> Response {
    let entries: Vec<serde_json::Value> = state
        .store
        .with_secrets()
        .into_iter()
        .map(|i| json!({"secret": i.secret}))
        .collect();
    Json(json!({ "secrets": entries })).into_response()
}

fn upstream_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"status": "error", "error": "upstream unavailable"})),
    )
        .into_response()
}
