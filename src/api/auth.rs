//! Authentication endpoints: register, login, SSO token trade, password
//! change, and the lightweight token check.

use super::{ApiClient, RequestKind};
use crate::error::Result;
use crate::models::{AuthResponse, Identity};

#[derive(Clone)]
pub struct AuthClient {
    api: ApiClient,
}

impl AuthClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `POST /auth/register`. Caller sanitizes username/email; the password
    /// travels untouched.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse> {
        let resp = self
            .api
            .post("/auth/register")
            .json(&serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
            }))
            .send()
            .await?;
        self.api.handle(resp, RequestKind::AuthAttempt).await
    }

    /// `POST /auth/login`.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let resp = self
            .api
            .post("/auth/login")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;
        self.api.handle(resp, RequestKind::AuthAttempt).await
    }

    /// Trade a provider access token for a first-party session
    /// (`POST /auth/sso`).
    pub async fn login_with_provider(&self, provider_token: &str) -> Result<AuthResponse> {
        let resp = self
            .api
            .post("/auth/sso")
            .json(&serde_json::json!({ "token": provider_token }))
            .send()
            .await?;
        self.api.handle(resp, RequestKind::AuthAttempt).await
    }

    /// `POST /auth/change-password`. Token-gated; a 401 here means the
    /// current password was wrong.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        let builder = self.api.post("/auth/change-password").json(&serde_json::json!({
            "currentPassword": current,
            "newPassword": new,
        }));
        let resp = self.api.bearer(builder)?.send().await?;
        self.api
            .handle::<serde_json::Value>(resp, RequestKind::AuthAttempt)
            .await?;
        Ok(())
    }

    /// `GET /auth/check` — token validity probe returning the minimal
    /// identity.
    pub async fn check(&self) -> Result<Identity> {
        let resp = self.api.bearer(self.api.get("/auth/check"))?.send().await?;
        self.api.handle(resp, RequestKind::TokenGated).await
    }
}
