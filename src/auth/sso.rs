//! Hosted identity provider flow (redirect-based authorization-code
//! exchange).
//!
//! The provider itself is an external collaborator; this module only builds
//! the redirect URLs, generates/validates the CSRF `state`, parses the
//! callback parameters, and exchanges the code for a provider access token.
//! Trading that token for a first-party session happens in the auth API
//! client.

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use rand::TryRng;
use serde::Deserialize;

/// Byte length of the CSRF state token before hex encoding.
const STATE_BYTES: usize = 32;

/// Parameters the provider appends to the callback redirect.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Provider token-endpoint response.
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
}

/// Generate a random CSRF state token (hex-encoded).
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rngs::SysRng
        .try_fill_bytes(&mut bytes)
        .expect("system CSPRNG unavailable");
    hex::encode(bytes)
}

/// Redirect-based authorization-code flow against one provider tenant.
pub struct SsoFlow {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl SsoFlow {
    /// Redirect target registered with the provider.
    pub fn redirect_uri(&self) -> &str {
        &self.config.redirect_uri
    }

    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { config, http })
    }

    /// Authorization request URL the user's browser is sent to.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "https://{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&audience={}&state={}",
            self.config.domain,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scope),
            urlencoding::encode(&self.config.audience),
            urlencoding::encode(state),
        )
    }

    /// Provider sign-out redirect, returning the browser to `return_to`.
    pub fn logout_url(&self, return_to: &str) -> String {
        format!(
            "https://{}/v2/logout?client_id={}&returnTo={}",
            self.config.domain,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(return_to),
        )
    }

    /// Exchange the authorization code for a provider access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        let url = format!("https://{}/oauth/token", self.config.domain);
        let payload = serde_json::json!({
            "grant_type": "authorization_code",
            "client_id": self.config.client_id,
            "code": code,
            "redirect_uri": self.config.redirect_uri,
        });

        let resp = self.http.post(&url).json(&payload).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, body, "code exchange failed");
            return Err(Error::Message("Authentication failed".into()));
        }

        let exchange: TokenExchangeResponse = resp.json().await?;
        Ok(exchange.access_token)
    }
}

/// Parse `code` and `state` out of the callback URL. Both are required;
/// a redirect missing either is rejected before any network call.
pub fn parse_callback(url: &str) -> Result<CallbackParams> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut code = None;
    let mut state = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            _ => {}
        }
    }

    match (code, state) {
        (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => {
            Ok(CallbackParams { code, state })
        }
        _ => Err(Error::Validation(
            "Missing authentication parameters".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> ProviderConfig {
        ProviderConfig {
            domain: "login.example.com".into(),
            client_id: "client-abc".into(),
            redirect_uri: "https://dash.example.com/callback".into(),
            audience: "https://dash.example.com/api".into(),
            scope: "openid profile email".into(),
        }
    }

    #[test]
    fn state_is_random_hex() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), STATE_BYTES * 2);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn authorize_url_carries_required_params() {
        let flow = SsoFlow::new(test_provider()).unwrap();
        let url = flow.authorize_url("state-123");

        assert!(url.starts_with("https://login.example.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-abc"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fdash.example.com%2Fcallback"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("state=state-123"));
    }

    #[test]
    fn logout_url_round_trips_return_target() {
        let flow = SsoFlow::new(test_provider()).unwrap();
        let url = flow.logout_url("https://dash.example.com/");
        assert!(url.starts_with("https://login.example.com/v2/logout?"));
        assert!(url.contains("returnTo=https%3A%2F%2Fdash.example.com%2F"));
    }

    #[test]
    fn callback_requires_both_params() {
        let ok = parse_callback("https://dash.example.com/callback?code=abc&state=xyz").unwrap();
        assert_eq!(ok.code, "abc");
        assert_eq!(ok.state, "xyz");

        assert!(parse_callback("https://dash.example.com/callback?code=abc").is_err());
        assert!(parse_callback("https://dash.example.com/callback?state=xyz").is_err());
        assert!(parse_callback("https://dash.example.com/callback").is_err());
        assert!(parse_callback("https://dash.example.com/callback?code=&state=xyz").is_err());
    }

    #[test]
    fn callback_decodes_encoded_values() {
        let params =
            parse_callback("https://x/cb?state=st%2Fate&code=co%3Dde&extra=ignored").unwrap();
        assert_eq!(params.code, "co=de");
        assert_eq!(params.state, "st/ate");
    }
}
