//! Wire models shared by the API clients and the session manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The authenticated user record visible to the client.
///
/// Locally-registered users carry a numeric id; provider-issued identities
/// use the provider subject string. Both arrive as the same `id` field, so
/// it is normalized to a string on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Provider-issued claims, present only for hosted-identity sign-ins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl Identity {
    /// Avatar precedence: the first-party avatar wins over the provider
    /// picture.
    pub fn effective_avatar(&self) -> Option<&str> {
        self.avatar_url.as_deref().or(self.picture.as_deref())
    }
}

/// Response of `POST /auth/login`, `/auth/register` and `/auth/sso`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}

/// Canonical server-side profile row, joined with the owning user's
/// username/email.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Provider picture, when the profile was seeded from a hosted identity.
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Avatar precedence applied on the client: `avatar_url || picture`.
    pub fn effective_avatar(&self) -> Option<&str> {
        self.avatar_url.as_deref().or(self.picture.as_deref())
    }
}

/// Editable profile fields for `PUT /profile/:userId`. Absent fields are
/// left untouched server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A monitored endpoint: name + IPv4 address, owner-scoped server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Client-side geolocation enrichment for a monitored endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub city: String,
    pub country: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// Placeholder returned when every lookup path has failed.
    pub fn unknown() -> Self {
        Self {
            city: "Unknown City".into(),
            country: "Unknown Country".into(),
            country_code: "XX".into(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

/// Accept a JSON string or number and normalize to `String`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(i64),
        None,
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Str(s)) => Some(s),
        Some(Raw::Num(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_accepts_numeric_id() {
        let json = r#"{"id": 7, "email": "a@x.com", "username": "a"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.id, "7");
    }

    #[test]
    fn identity_accepts_provider_subject_id() {
        let json = r#"{"id": "auth0|abc123", "email": "a@x.com", "username": "a", "sub": "auth0|abc123"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.id, "auth0|abc123");
        assert_eq!(identity.sub.as_deref(), Some("auth0|abc123"));
    }

    #[test]
    fn avatar_precedence_prefers_first_party_url() {
        let mut profile = Profile {
            avatar_url: Some("/uploads/abc.png".into()),
            picture: Some("https://cdn.provider/pic.jpg".into()),
            ..Default::default()
        };
        assert_eq!(profile.effective_avatar(), Some("/uploads/abc.png"));

        profile.avatar_url = None;
        assert_eq!(
            profile.effective_avatar(),
            Some("https://cdn.provider/pic.jpg")
        );

        profile.picture = None;
        assert_eq!(profile.effective_avatar(), None);
    }

    #[test]
    fn profile_update_omits_absent_fields() {
        let update = ProfileUpdate {
            bio: Some("hello".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"bio":"hello"}"#);
    }

    #[test]
    fn server_record_round_trip() {
        let json = r#"{"id": 3, "name": "Google DNS", "address": "8.8.8.8", "created_at": "2026-01-15T10:30:00Z"}"#;
        let record: ServerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "3");
        assert_eq!(record.address, "8.8.8.8");
        assert!(record.created_at.is_some());
    }

    #[test]
    fn geo_unknown_placeholder() {
        let geo = GeoLocation::unknown();
        assert_eq!(geo.country_code, "XX");
        assert_eq!(geo.latitude, 0.0);
    }
}
