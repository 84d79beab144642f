//! File-backed session slot: bearer token + cached identity.
//!
//! One JSON file under the app data dir holds both values. Read/write
//! failures are swallowed and logged, never returned, so session code can
//! always fall back to the unauthenticated path. `clear()` unlinks the
//! single file, removing token and identity together; no partial state is
//! ever visible to callers.

use crate::models::Identity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persistent slot.
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    identity: Option<Identity>,
}

/// Persistent token + identity slot.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Open the slot under `dir`, creating the directory best-effort.
    pub fn open(dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "could not create session dir");
        }
        Self {
            path: dir.join(SESSION_FILE),
        }
    }

    pub fn set_token(&self, token: &str) {
        let mut session = self.read();
        session.token = Some(token.to_string());
        self.write(&session);
    }

    pub fn token(&self) -> Option<String> {
        self.read().token
    }

    pub fn set_identity(&self, identity: &Identity) {
        let mut session = self.read();
        session.identity = Some(identity.clone());
        self.write(&session);
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read().identity
    }

    /// Remove token and cached identity together.
    pub fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "error clearing session");
            }
        }
    }

    fn read(&self) -> StoredSession {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "error reading session");
                }
                return StoredSession::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt session file, discarding");
                self.clear();
                StoredSession::default()
            }
        }
    }

    fn write(&self, session: &StoredSession) {
        let raw = match serde_json::to_string(session) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "error serializing session");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, raw) {
            tracing::warn!(path = %self.path.display(), error = %e, "error storing session");
        }
    }
}
