//! Profile endpoints: canonical profile fetch/update and avatar upload.
//!
//! The server only serves a profile to its owner; any other token gets a
//! 403, which evicts the session like every other token-gated call.

use super::{ApiClient, RequestKind};
use crate::error::{Error, Result};
use crate::models::{Profile, ProfileUpdate};
use crate::security::{is_allowed_avatar, sanitize_opt, validators::MAX_AVATAR_BYTES};
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct AvatarResponse {
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct ProfileClient {
    api: ApiClient,
}

impl ProfileClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `GET /profile/:userId`.
    pub async fn fetch(&self, user_id: &str) -> Result<Profile> {
        let builder = self.api.get(&format!("/profile/{user_id}"));
        let resp = self.api.bearer(builder)?.send().await?;
        self.api.handle(resp, RequestKind::TokenGated).await
    }

    /// `PUT /profile/:userId` with sanitized text fields.
    pub async fn update(&self, user_id: &str, update: ProfileUpdate) -> Result<Profile> {
        let sanitized = ProfileUpdate {
            full_name: sanitize_opt(update.full_name.as_deref()),
            bio: sanitize_opt(update.bio.as_deref()),
            phone: sanitize_opt(update.phone.as_deref()),
            location: sanitize_opt(update.location.as_deref()),
        };

        let builder = self
            .api
            .put(&format!("/profile/{user_id}"))
            .json(&sanitized);
        let resp = self.api.bearer(builder)?.send().await?;
        self.api.handle(resp, RequestKind::TokenGated).await
    }

    /// `POST /users/:userId/avatar` (multipart). The file is prechecked
    /// client-side against the server's type/size limits so oversized or
    /// non-image uploads never leave the process.
    pub async fn upload_avatar(&self, user_id: &str, file: &Path) -> Result<String> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Validation("Invalid avatar file name".into()))?;

        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| Error::Validation(format!("Could not read avatar file: {e}")))?;

        if !is_allowed_avatar(&file_name, bytes.len() as u64) {
            return Err(Error::Validation(format!(
                "Avatar must be a JPEG, PNG or GIF under {}MB",
                MAX_AVATAR_BYTES / (1024 * 1024)
            )));
        }

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime_for(&file_name))?;
        let form = multipart::Form::new().part("avatar", part);

        let builder = self
            .api
            .post(&format!("/users/{user_id}/avatar"))
            .multipart(form);
        let resp = self.api.bearer(builder)?.send().await?;
        let uploaded: AvatarResponse = self.api.handle(resp, RequestKind::TokenGated).await?;

        uploaded
            .avatar_url
            .ok_or_else(|| Error::Message("No avatar URL returned from server".into()))
    }
}

fn mime_for(file_name: &str) -> &'static str {
    match file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
