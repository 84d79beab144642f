//! Monitored-endpoint CRUD, scoped server-side to the authenticated owner.
//!
//! Every operation needs a stored token and fails fast with `NoToken`
//! before any network call. A 403 from any of them evicts the whole
//! session through the shared gate.

use super::{ApiClient, RequestKind};
use crate::error::{Error, Result};
use crate::models::ServerRecord;
use crate::security::{is_valid_ipv4, sanitize};

#[derive(Clone)]
pub struct ServersClient {
    api: ApiClient,
}

impl ServersClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `GET /servers` — the caller's endpoints, newest first.
    pub async fn list(&self) -> Result<Vec<ServerRecord>> {
        let resp = self.api.bearer(self.api.get("/servers"))?.send().await?;
        self.api.handle(resp, RequestKind::TokenGated).await
    }

    /// `POST /servers`. The address must be a literal IPv4; validation
    /// failures never reach the network.
    pub async fn add(&self, name: &str, address: &str) -> Result<ServerRecord> {
        let name = sanitize(name);
        if name.is_empty() {
            return Err(Error::Validation("Name and address are required".into()));
        }
        if !is_valid_ipv4(address) {
            return Err(Error::Validation("Invalid IP address".into()));
        }

        let builder = self.api.post("/servers").json(&serde_json::json!({
            "name": name,
            "address": address,
        }));
        let resp = self.api.bearer(builder)?.send().await?;
        self.api.handle(resp, RequestKind::TokenGated).await
    }

    /// `DELETE /servers/:id`.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let builder = self.api.delete(&format!("/servers/{id}"));
        let resp = self.api.bearer(builder)?.send().await?;
        self.api
            .handle::<serde_json::Value>(resp, RequestKind::TokenGated)
            .await?;
        Ok(())
    }
}
