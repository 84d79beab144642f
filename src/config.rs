//! Layered configuration: TOML file under the platform config dir, with
//! `PINGDECK_*` environment overrides on top.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default API base URL for local development.
const DEFAULT_API_URL: &str = "http://localhost:3001/api";

/// Default OAuth scope requested from the identity provider.
const DEFAULT_SCOPE: &str = "openid profile email";

/// Hosted identity provider settings (authorization-code flow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider tenant domain, e.g. `login.example.com`.
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub client_id: String,
    /// Where the provider redirects with `code` and `state`.
    #[serde(default)]
    pub redirect_uri: String,
    /// API audience claim requested with the token.
    #[serde(default)]
    pub audience: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            client_id: String::new(),
            redirect_uri: String::new(),
            audience: String::new(),
            scope: default_scope(),
        }
    }
}

impl ProviderConfig {
    /// Whether the provider flow is usable (domain + client id present).
    pub fn is_configured(&self) -> bool {
        !self.domain.is_empty() && !self.client_id.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the dashboard endpoint layer.
    #[serde(default = "default_api_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Override for the session-store directory. Defaults to the platform
    /// data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_url(),
            provider: ProviderConfig::default(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load `<config_dir>/pingdeck/config.toml` when present, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides, highest precedence.
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PINGDECK_API_URL") {
            if !url.is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(domain) = std::env::var("PINGDECK_SSO_DOMAIN") {
            if !domain.is_empty() {
                self.provider.domain = domain;
            }
        }
        if let Ok(client_id) = std::env::var("PINGDECK_SSO_CLIENT_ID") {
            if !client_id.is_empty() {
                self.provider.client_id = client_id;
            }
        }
        if let Ok(redirect) = std::env::var("PINGDECK_SSO_REDIRECT_URI") {
            if !redirect.is_empty() {
                self.provider.redirect_uri = redirect;
            }
        }
        if let Ok(audience) = std::env::var("PINGDECK_SSO_AUDIENCE") {
            if !audience.is_empty() {
                self.provider.audience = audience;
            }
        }
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "pingdeck", "pingdeck")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Directory holding the persistent session slot.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        ProjectDirs::from("io", "pingdeck", "pingdeck")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".pingdeck"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_api() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:3001/api");
        assert!(!config.provider.is_configured());
        assert_eq!(config.provider.scope, "openid profile email");
    }

    #[test]
    fn parses_full_toml() {
        let raw = r#"
            api_base_url = "https://dash.example.com/api"

            [provider]
            domain = "login.example.com"
            client_id = "abc123"
            redirect_uri = "https://dash.example.com/callback"
            audience = "https://dash.example.com/api"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.api_base_url, "https://dash.example.com/api");
        assert!(config.provider.is_configured());
        assert_eq!(config.provider.scope, "openid profile email");
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api_base_url, "http://localhost:3001/api");
        assert!(config.data_dir.is_none());
    }
}
