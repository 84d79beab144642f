//! HTTP plumbing shared by every endpoint client.
//!
//! One `ApiClient` wraps the reqwest client, the base URL, and the shared
//! [`SessionGate`]. Response-to-error mapping is uniform across clients:
//! - 429: stamp the attempt guard; a `Retry-After` header is surfaced
//!   verbatim (capped at 10 minutes) and always wins over the
//!   client-computed wait
//! - 403: evict the whole session through the gate, regardless of which
//!   operation observed it, and surface "session expired"
//! - 401: invalid credentials on auth attempts, unauthorized elsewhere
//! - 5xx: full detail logged, generic message surfaced
//! - other non-2xx: the body's `error`/`message` field passed through

pub mod auth;
pub mod profile;
pub mod servers;

use crate::auth::rate_limit::AttemptGuard;
use crate::error::{Error, Result};
use reqwest::{header, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Request timeout for the endpoint layer.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The session surface every network-calling client depends on and may
/// invalidate. Implemented by the session manager; eviction through this
/// interface is what makes the 403 rule cross-cutting instead of a hidden
/// side effect in each client.
pub trait SessionGate: Send + Sync {
    /// Current bearer token, if any.
    fn token(&self) -> Option<String>;
    /// Invalidate the whole session (token + identity + in-memory state).
    fn evict(&self);
    /// Record a server-side throttle so the client-side guard cools off.
    fn note_throttle(&self);
}

/// Whether a request is an authentication attempt (401 means bad
/// credentials) or a token-gated call (401 means unauthorized).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    AuthAttempt,
    TokenGated,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    gate: Arc<dyn SessionGate>,
}

impl ApiClient {
    pub fn new(base_url: &str, gate: Arc<dyn SessionGate>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            gate,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    pub(crate) fn put(&self, path: &str) -> RequestBuilder {
        self.http.put(self.url(path))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.http.delete(self.url(path))
    }

    /// Attach the bearer token, failing fast with [`Error::NoToken`]
    /// before any network call when none is stored.
    pub(crate) fn bearer(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        match self.gate.token() {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Err(Error::NoToken),
        }
    }

    /// Map a response to the error taxonomy, or deserialize the body.
    pub(crate) async fn handle<T: DeserializeOwned>(
        &self,
        resp: Response,
        kind: RequestKind,
    ) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.gate.note_throttle();
            let retry_after = resp
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(match retry_after {
                Some(seconds) => Error::RetryAfter(AttemptGuard::cap_retry_after(seconds)),
                None => Error::TooManyAttempts,
            });
        }

        if status == StatusCode::FORBIDDEN {
            self.gate.evict();
            return Err(Error::SessionExpired);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(match kind {
                RequestKind::AuthAttempt => Error::InvalidCredentials,
                RequestKind::TokenGated => Error::Unauthorized,
            });
        }

        let body = resp.text().await.unwrap_or_default();

        if status.is_server_error() {
            tracing::error!(%status, body, "endpoint layer error");
            return Err(Error::Server(status.to_string()));
        }

        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
            if let Some(message) = parsed.into_message() {
                return Err(Error::Message(message));
            }
        }
        Err(Error::Message(
            "An error occurred while processing the response".into(),
        ))
    }
}

/// Structured error payload: the server uses `error` on most routes and
/// `message` on a few older ones.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.is_empty())
    }
}
