//! Auth session manager.
//!
//! Owns the Unauthenticated → Authenticating → Authenticated state machine,
//! composes the token store, attempt guard and API clients, and exposes the
//! current authenticated identity to the rest of the application.
//!
//! Identity is tracked as two fields: `cached` (what the login response or
//! the persisted slot said) and `confirmed` (what the canonical profile
//! fetch said), merged with a fixed precedence: confirmed avatar/name win
//! when present, cached values survive otherwise. A failed refresh never
//! discards the optimistic state (stale-but-available).
//!
//! There is no cancellation: a profile refresh completing after logout may
//! still write a stale identity snapshot. It cannot resurrect the session,
//! since the bearer token stays cleared.

use crate::api::auth::AuthClient;
use crate::api::profile::ProfileClient;
use crate::api::servers::ServersClient;
use crate::api::{ApiClient, SessionGate};
use crate::auth::rate_limit::AttemptGuard;
use crate::auth::sso::{generate_state, parse_callback, SsoFlow};
use crate::auth::token_store::TokenStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{AuthResponse, Identity, Profile, ProfileUpdate};
use crate::security::{is_strong_password, is_valid_email, sanitize, sanitize_opt};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Session lifecycle label. `Authenticating` tags the in-flight credential
/// exchange only; it never blocks other operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    cached: Option<Identity>,
    confirmed: Option<Identity>,
    provider_session: bool,
}

/// The shared session surface. All API clients hold this through the
/// [`SessionGate`] trait, which is how any endpoint's 403 can invalidate
/// the whole session instead of just its own call.
pub struct SessionHandle {
    store: TokenStore,
    guard: AttemptGuard,
    inner: Mutex<SessionInner>,
}

impl SessionGate for SessionHandle {
    fn token(&self) -> Option<String> {
        self.store.token()
    }

    fn evict(&self) {
        self.store.clear();
        let mut inner = self.inner.lock();
        *inner = SessionInner::default();
        tracing::info!("session evicted");
    }

    fn note_throttle(&self) {
        self.guard.record_server_throttle();
    }
}

/// Partial identity update applied to the client-side cache.
#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct AuthSession {
    handle: Arc<SessionHandle>,
    api: ApiClient,
    auth: AuthClient,
    profile: ProfileClient,
    sso: Option<SsoFlow>,
}

impl AuthSession {
    pub fn new(config: &Config) -> Result<Self> {
        let sso = if config.provider.is_configured() {
            Some(SsoFlow::new(config.provider.clone())?)
        } else {
            None
        };
        Self::assemble(
            TokenStore::open(&config.data_dir()),
            AttemptGuard::new(),
            &config.api_base_url,
            sso,
        )
    }

    fn assemble(
        store: TokenStore,
        guard: AttemptGuard,
        base_url: &str,
        sso: Option<SsoFlow>,
    ) -> Result<Self> {
        let handle = Arc::new(SessionHandle {
            store,
            guard,
            inner: Mutex::new(SessionInner::default()),
        });
        let api = ApiClient::new(base_url, handle.clone() as Arc<dyn SessionGate>)?;
        let session = Self {
            handle,
            auth: AuthClient::new(api.clone()),
            profile: ProfileClient::new(api.clone()),
            api,
            sso,
        };
        session.hydrate();
        Ok(session)
    }

    /// Restore state from the persistent slot. With both a token and a
    /// cached identity present the session is optimistically authenticated
    /// and the canonical profile is re-fetched in the background.
    fn hydrate(&self) {
        let token = self.handle.store.token();
        let identity = self.handle.store.identity();
        match (token, identity) {
            (Some(_), Some(identity)) => {
                {
                    let mut inner = self.handle.inner.lock();
                    inner.state = SessionState::Authenticated;
                    inner.provider_session = identity.sub.is_some();
                    inner.cached = Some(identity.clone());
                }
                tracing::debug!(user = %identity.username, "session hydrated from store");
                self.spawn_profile_refresh(identity.id);
            }
            (Some(_), None) | (None, Some(_)) => {
                // Half a slot is as good as none.
                self.handle.store.clear();
            }
            (None, None) => {}
        }
    }

    // ── Credential flows ────────────────────────────────────────────

    /// Local-credential login. Resolves only after the token is durably
    /// persisted; the profile enrichment that follows is fire-and-forget.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let email = sanitize(email);
        if !is_valid_email(&email) {
            return Err(Error::Validation("Invalid email format".into()));
        }
        if password.is_empty() {
            return Err(Error::Validation("Email and password are required".into()));
        }

        self.handle.guard.check_and_record()?;
        self.set_state(SessionState::Authenticating);

        match self.auth.login(&email, password).await {
            Ok(resp) => self.establish(resp, false),
            Err(e) => {
                self.set_state(SessionState::Unauthenticated);
                Err(e)
            }
        }
    }

    /// Register a new account and open a session with it.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Identity> {
        let username = sanitize(username);
        let email = sanitize(email);
        if username.is_empty() {
            return Err(Error::Validation("All fields are required".into()));
        }
        if !is_valid_email(&email) {
            return Err(Error::Validation("Invalid email format".into()));
        }
        if !is_strong_password(password) {
            return Err(Error::Validation(
                "Password does not meet security requirements".into(),
            ));
        }

        self.handle.guard.check_and_record()?;
        self.set_state(SessionState::Authenticating);

        match self.auth.register(&username, &email, password).await {
            Ok(resp) => self.establish(resp, false),
            Err(e) => {
                self.set_state(SessionState::Unauthenticated);
                Err(e)
            }
        }
    }

    /// Start the provider flow: returns the authorize URL to open in a
    /// browser plus the CSRF state the callback must echo.
    pub fn sso_authorize(&self) -> Result<(String, String)> {
        let sso = self.sso()?;
        let state = generate_state();
        Ok((sso.authorize_url(&state), state))
    }

    /// Finish the provider flow from the callback redirect URL.
    pub async fn sso_complete(&self, callback_url: &str, expected_state: &str) -> Result<Identity> {
        let sso = self.sso()?;
        let params = parse_callback(callback_url)?;
        if params.state != expected_state {
            return Err(Error::Validation(
                "Authentication state mismatch; restart the sign-in".into(),
            ));
        }

        self.set_state(SessionState::Authenticating);
        let result = async {
            let provider_token = sso.exchange_code(&params.code).await?;
            self.auth.login_with_provider(&provider_token).await
        }
        .await;

        match result {
            Ok(resp) => self.establish(resp, true),
            Err(e) => {
                self.set_state(SessionState::Unauthenticated);
                Err(e)
            }
        }
    }

    /// Clear the session unconditionally. For provider-originated sessions
    /// the provider's own sign-out URL is returned so the caller can finish
    /// the redirect.
    pub fn logout(&self) -> Option<String> {
        let was_provider = {
            let mut inner = self.handle.inner.lock();
            let was = inner.provider_session;
            *inner = SessionInner::default();
            was
        };
        self.handle.store.clear();
        tracing::info!("logged out");

        if was_provider {
            if let Some(sso) = &self.sso {
                return Some(sso.logout_url(&self.return_origin()));
            }
        }
        None
    }

    // ── Profile ─────────────────────────────────────────────────────

    /// Re-fetch the canonical profile and merge it in. A failed refresh
    /// keeps the optimistic identity (stale-but-available).
    pub async fn refresh_profile(&self) -> Result<Identity> {
        let cached = self
            .handle
            .inner
            .lock()
            .cached
            .clone()
            .ok_or(Error::NoToken)?;

        match self.profile.fetch(&cached.id).await {
            Ok(profile) => {
                apply_confirmed(&self.handle, &profile);
                Ok(self.current_identity().unwrap_or(cached))
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile refresh failed; keeping cached identity");
                Err(e)
            }
        }
    }

    /// Update the canonical profile, then fold the result into the session
    /// identity.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile> {
        let cached = self
            .handle
            .inner
            .lock()
            .cached
            .clone()
            .ok_or(Error::NoToken)?;
        let profile = self.profile.update(&cached.id, update).await?;
        apply_confirmed(&self.handle, &profile);
        Ok(profile)
    }

    /// Upload a new avatar and point the session identity at it.
    pub async fn upload_avatar(&self, file: &Path) -> Result<String> {
        let cached = self
            .handle
            .inner
            .lock()
            .cached
            .clone()
            .ok_or(Error::NoToken)?;
        let avatar_url = self.profile.upload_avatar(&cached.id, file).await?;
        self.update_identity(IdentityPatch {
            avatar_url: Some(avatar_url.clone()),
            ..Default::default()
        });
        Ok(avatar_url)
    }

    /// Merge a partial update into the client-side identity cache and
    /// persist the merged snapshot.
    pub fn update_identity(&self, patch: IdentityPatch) {
        let snapshot = {
            let mut inner = self.handle.inner.lock();
            let Some(cached) = inner.cached.as_mut() else {
                return;
            };
            if let Some(name) = patch.name {
                cached.name = sanitize_opt(Some(&name));
            }
            if let Some(avatar_url) = patch.avatar_url {
                cached.avatar_url = Some(avatar_url);
            }
            merged_identity(&inner)
        };
        if let Some(snapshot) = snapshot {
            self.handle.store.set_identity(&snapshot);
        }
    }

    /// Change the account password. The new password is validated
    /// client-side; the attempt guard applies like any credential exchange.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        if !is_strong_password(new) {
            return Err(Error::Validation(
                "New password does not meet security requirements".into(),
            ));
        }
        self.handle.guard.check_and_record()?;
        self.auth.change_password(current, new).await
    }

    // ── Observers ───────────────────────────────────────────────────

    /// The merged (cached + confirmed) identity, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        merged_identity(&self.handle.inner.lock())
    }

    pub fn state(&self) -> SessionState {
        self.handle.inner.lock().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Server-list client bound to this session.
    pub fn servers(&self) -> ServersClient {
        ServersClient::new(self.api.clone())
    }

    /// Auth endpoints client bound to this session (token check etc.).
    pub fn auth_client(&self) -> AuthClient {
        self.auth.clone()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn establish(&self, resp: AuthResponse, provider_session: bool) -> Result<Identity> {
        // Token first: the persisted session must be complete before any
        // dependent request is issued.
        self.handle.store.set_token(&resp.token);
        self.handle.store.set_identity(&resp.user);
        {
            let mut inner = self.handle.inner.lock();
            inner.state = SessionState::Authenticated;
            inner.provider_session = provider_session || resp.user.sub.is_some();
            inner.cached = Some(resp.user.clone());
            inner.confirmed = None;
        }
        tracing::info!(user = %resp.user.username, "authenticated");
        self.spawn_profile_refresh(resp.user.id.clone());
        Ok(resp.user)
    }

    /// Best-effort canonical profile fetch; failures are logged, never
    /// surfaced.
    fn spawn_profile_refresh(&self, user_id: String) {
        let profile = self.profile.clone();
        let handle = self.handle.clone();
        let task = async move {
            match profile.fetch(&user_id).await {
                Ok(fetched) => apply_confirmed(&handle, &fetched),
                Err(e) => tracing::warn!(error = %e, "background profile refresh failed"),
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(task);
            }
            Err(_) => tracing::debug!("no async runtime; skipping background profile refresh"),
        }
    }

    fn set_state(&self, state: SessionState) {
        self.handle.inner.lock().state = state;
    }

    fn sso(&self) -> Result<&SsoFlow> {
        self.sso
            .as_ref()
            .ok_or_else(|| Error::Validation("Identity provider is not configured".into()))
    }

    /// Origin the provider should return the browser to after sign-out.
    fn return_origin(&self) -> String {
        let redirect = self
            .sso
            .as_ref()
            .map(|sso| sso.redirect_uri().to_string())
            .unwrap_or_default();
        origin_of(&redirect)
    }
}

/// Fold a fetched profile into the confirmed identity and persist the
/// merged snapshot. Runs on both the background and the explicit refresh
/// paths; it deliberately does not look at the session state (no
/// cancellation — see the module docs).
fn apply_confirmed(handle: &SessionHandle, profile: &Profile) {
    let snapshot = {
        let mut inner = handle.inner.lock();
        let Some(cached) = inner.cached.clone() else {
            return;
        };
        inner.confirmed = Some(confirmed_from_profile(&cached, profile));
        merged_identity(&inner)
    };
    if let Some(snapshot) = snapshot {
        handle.store.set_identity(&snapshot);
    }
}

/// Confirmed identity derived from the canonical profile, keyed off the
/// cached identity for fields the profile does not carry.
fn confirmed_from_profile(cached: &Identity, profile: &Profile) -> Identity {
    Identity {
        id: cached.id.clone(),
        email: profile.email.clone().unwrap_or_else(|| cached.email.clone()),
        username: profile
            .username
            .clone()
            .unwrap_or_else(|| cached.username.clone()),
        name: profile.full_name.clone(),
        avatar_url: profile.avatar_url.clone(),
        picture: profile.picture.clone(),
        nickname: cached.nickname.clone(),
        sub: cached.sub.clone(),
    }
}

/// Merge precedence: confirmed avatar (first-party over provider picture)
/// and confirmed name win when present; everything else comes from the
/// cached identity.
fn merged_identity(inner: &SessionInner) -> Option<Identity> {
    let mut merged = inner.cached.clone()?;
    if let Some(confirmed) = &inner.confirmed {
        if let Some(avatar) = confirmed.effective_avatar() {
            merged.avatar_url = Some(avatar.to_string());
        }
        if let Some(name) = &confirmed.name {
            merged.name = Some(name.clone());
        }
    }
    Some(merged)
}

fn origin_of(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let rest = &url[scheme_end + 3..];
        if let Some(path_start) = rest.find('/') {
            return url[..scheme_end + 3 + path_start].to_string();
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_identity() -> Identity {
        Identity {
            id: "1".into(),
            email: "bob@x.com".into(),
            username: "bob".into(),
            name: None,
            avatar_url: None,
            picture: None,
            nickname: None,
            sub: None,
        }
    }

    fn session_against(tmp: &TempDir, base_url: &str) -> AuthSession {
        AuthSession::assemble(
            TokenStore::open(tmp.path()),
            AttemptGuard::new(),
            base_url,
            None,
        )
        .unwrap()
    }

    async fn mount_profile(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/profile/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn register_stores_token_and_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "tok-reg",
                "user": { "id": 1, "email": "bob@x.com", "username": "bob" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_profile(&server, serde_json::json!({ "user_id": 1 })).await;

        let tmp = TempDir::new().unwrap();
        let session = session_against(&tmp, &server.uri());

        let identity = session
            .register("bob", "bob@x.com", "Abcdef1!")
            .await
            .unwrap();

        assert_eq!(identity.email, "bob@x.com");
        assert_eq!(session.handle.store.token(), Some("tok-reg".to_string()));
        assert_eq!(session.current_identity().unwrap().email, "bob@x.com");
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn register_rejects_weak_password_before_network() {
        let tmp = TempDir::new().unwrap();
        let session = session_against(&tmp, "http://127.0.0.1:9");

        let err = session
            .register("bob", "bob@x.com", "weakpass")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn login_failure_maps_to_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "Invalid email or password"
            })))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let session = session_against(&tmp, &server.uri());

        let err = session.login("bob@x.com", "Wrong1!pw").await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.handle.store.token(), None);
    }

    #[tokio::test]
    async fn sixth_login_attempt_is_guarded_client_side() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .expect(5)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let session = session_against(&tmp, &server.uri());

        for _ in 0..5 {
            let err = session.login("bob@x.com", "Wrong1!pw").await.unwrap_err();
            assert!(matches!(err, Error::InvalidCredentials));
        }

        // Attempt 6 never reaches the network (the mock's expect(5)
        // verifies that on drop).
        let err = session.login("bob@x.com", "Wrong1!pw").await.unwrap_err();
        assert!(matches!(err, Error::TooManyAttempts));
    }

    #[tokio::test]
    async fn session_eviction_on_403_from_server_list() {
        let server = MockServer::start().await;
        mount_profile(&server, serde_json::json!({ "user_id": 1 })).await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let store = TokenStore::open(tmp.path());
        store.set_token("tok-1");
        store.set_identity(&test_identity());

        let session = session_against(&tmp, &server.uri());
        assert_eq!(session.state(), SessionState::Authenticated);

        let servers = session.servers();
        let err = servers.list().await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired));

        assert_eq!(session.handle.store.token(), None);
        assert_eq!(session.state(), SessionState::Unauthenticated);

        // Fail-fast from here on: expect(1) above proves the second call
        // never hit the wire.
        assert!(matches!(servers.list().await, Err(Error::NoToken)));
    }

    #[tokio::test]
    async fn hydration_restores_optimistic_identity() {
        let server = MockServer::start().await;
        mount_profile(&server, serde_json::json!({ "user_id": 1 })).await;

        let tmp = TempDir::new().unwrap();
        let store = TokenStore::open(tmp.path());
        store.set_token("tok-1");
        store.set_identity(&test_identity());

        let session = session_against(&tmp, &server.uri());
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.current_identity().unwrap().username, "bob");
    }

    #[tokio::test]
    async fn half_a_slot_hydrates_unauthenticated() {
        let tmp = TempDir::new().unwrap();
        let store = TokenStore::open(tmp.path());
        store.set_token("tok-1"); // token but no identity

        let session = session_against(&tmp, "http://127.0.0.1:9");
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.handle.store.token(), None);
    }

    #[tokio::test]
    async fn refresh_merges_confirmed_fields() {
        let server = MockServer::start().await;
        mount_profile(
            &server,
            serde_json::json!({
                "user_id": 1,
                "full_name": "Bob Builder",
                "avatar_url": "/uploads/new.png"
            }),
        )
        .await;

        let tmp = TempDir::new().unwrap();
        let store = TokenStore::open(tmp.path());
        store.set_token("tok-1");
        let mut cached = test_identity();
        cached.avatar_url = Some("/uploads/old.png".into());
        store.set_identity(&cached);

        let session = session_against(&tmp, &server.uri());
        let identity = session.refresh_profile().await.unwrap();

        assert_eq!(identity.avatar_url.as_deref(), Some("/uploads/new.png"));
        assert_eq!(identity.name.as_deref(), Some("Bob Builder"));
        // Merged snapshot persisted.
        assert_eq!(
            session.handle.store.identity().unwrap().avatar_url.as_deref(),
            Some("/uploads/new.png")
        );
    }

    #[tokio::test]
    async fn failed_refresh_keeps_optimistic_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profile/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let store = TokenStore::open(tmp.path());
        store.set_token("tok-1");
        store.set_identity(&test_identity());

        let session = session_against(&tmp, &server.uri());
        let err = session.refresh_profile().await.unwrap_err();
        assert!(matches!(err, Error::Server(_)));

        // Stale-but-available: identity and state survive.
        assert_eq!(session.current_identity().unwrap().username, "bob");
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let tmp = TempDir::new().unwrap();
        let store = TokenStore::open(tmp.path());
        store.set_token("tok-1");
        store.set_identity(&test_identity());

        let session = session_against(&tmp, "http://127.0.0.1:9");
        assert!(session.is_authenticated());

        let provider_redirect = session.logout();
        assert_eq!(provider_redirect, None);
        assert_eq!(session.current_identity(), None);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.handle.store.token(), None);
    }

    #[test]
    fn merge_precedence_rules() {
        let mut inner = SessionInner {
            state: SessionState::Authenticated,
            cached: Some(Identity {
                name: Some("Cached Name".into()),
                avatar_url: Some("/uploads/cached.png".into()),
                ..test_identity()
            }),
            confirmed: None,
            provider_session: false,
        };

        // Without a confirmed identity the cache passes through.
        let merged = merged_identity(&inner).unwrap();
        assert_eq!(merged.avatar_url.as_deref(), Some("/uploads/cached.png"));

        // Confirmed avatar wins; provider picture is used when the
        // first-party URL is absent.
        inner.confirmed = Some(Identity {
            name: None,
            avatar_url: None,
            picture: Some("https://cdn/pic.jpg".into()),
            ..test_identity()
        });
        let merged = merged_identity(&inner).unwrap();
        assert_eq!(merged.avatar_url.as_deref(), Some("https://cdn/pic.jpg"));
        // Confirmed has no name: the cached one survives.
        assert_eq!(merged.name.as_deref(), Some("Cached Name"));
    }

    #[test]
    fn origin_extraction() {
        assert_eq!(
            origin_of("https://dash.example.com/callback"),
            "https://dash.example.com"
        );
        assert_eq!(
            origin_of("http://localhost:5173/callback/deep"),
            "http://localhost:5173"
        );
        assert_eq!(origin_of("https://bare.example.com"), "https://bare.example.com");
    }
}
