//! Client-side enrichment for monitored endpoints: geolocation lookup,
//! country flag rendering, and a latency probe.
//!
//! The geolocation services are public third-party APIs and external
//! collaborators; lookups try the primary service first and fall back to a
//! secondary one, degrading to an "Unknown" placeholder instead of failing
//! the caller.

use crate::error::Result;
use crate::models::GeoLocation;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Primary geolocation service.
const PRIMARY_URL: &str = "https://ipwhois.app/json";

/// Fallback geolocation service.
const FALLBACK_URL: &str = "https://api.freegeoip.app/json";

/// Lookup/probe timeout. Kept short: enrichment decorates a listing and
/// must not stall it.
const LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Offset from ASCII `A` to the Unicode regional indicator `🇦`.
const REGIONAL_INDICATOR_OFFSET: u32 = 127_397;

#[derive(Debug, Deserialize)]
struct IpWhoisResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FreeGeoIpResponse {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

impl From<IpWhoisResponse> for GeoLocation {
    fn from(raw: IpWhoisResponse) -> Self {
        let unknown = GeoLocation::unknown();
        Self {
            city: raw.city.filter(|c| !c.is_empty()).unwrap_or(unknown.city),
            country: raw
                .country
                .filter(|c| !c.is_empty())
                .unwrap_or(unknown.country),
            country_code: raw
                .country_code
                .filter(|c| !c.is_empty())
                .unwrap_or(unknown.country_code),
            latitude: raw.latitude.unwrap_or(0.0),
            longitude: raw.longitude.unwrap_or(0.0),
        }
    }
}

impl From<FreeGeoIpResponse> for GeoLocation {
    fn from(raw: FreeGeoIpResponse) -> Self {
        let unknown = GeoLocation::unknown();
        Self {
            city: raw.city.filter(|c| !c.is_empty()).unwrap_or(unknown.city),
            country: raw
                .country_name
                .filter(|c| !c.is_empty())
                .unwrap_or(unknown.country),
            country_code: raw
                .country_code
                .filter(|c| !c.is_empty())
                .unwrap_or(unknown.country_code),
            latitude: raw.latitude.unwrap_or(0.0),
            longitude: raw.longitude.unwrap_or(0.0),
        }
    }
}

/// Geolocation + latency enrichment client.
pub struct GeoClient {
    http: reqwest::Client,
    primary_url: String,
    fallback_url: String,
}

impl GeoClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            primary_url: PRIMARY_URL.to_string(),
            fallback_url: FALLBACK_URL.to_string(),
        })
    }

    /// Resolve an address to a location, trying the fallback service when
    /// the primary fails. Total failure degrades to the Unknown
    /// placeholder.
    pub async fn lookup(&self, address: &str) -> GeoLocation {
        match self.lookup_primary(address).await {
            Ok(geo) => geo,
            Err(e) => {
                tracing::debug!(address, error = %e, "primary geo lookup failed, trying fallback");
                match self.lookup_fallback(address).await {
                    Ok(geo) => geo,
                    Err(e) => {
                        tracing::warn!(address, error = %e, "geo lookup failed");
                        GeoLocation::unknown()
                    }
                }
            }
        }
    }

    async fn lookup_primary(&self, address: &str) -> Result<GeoLocation> {
        let url = format!("{}/{}", self.primary_url, address);
        let raw: IpWhoisResponse = self.http.get(&url).send().await?.json().await?;
        if !raw.success {
            return Err(crate::error::Error::Message(
                "primary lookup unsuccessful".into(),
            ));
        }
        Ok(raw.into())
    }

    async fn lookup_fallback(&self, address: &str) -> Result<GeoLocation> {
        let url = format!("{}/{}", self.fallback_url, address);
        let raw: FreeGeoIpResponse = self.http.get(&url).send().await?.json().await?;
        Ok(raw.into())
    }

    /// Best-effort latency probe: one HEAD request against the endpoint,
    /// rounded to whole milliseconds. `None` when the endpoint does not
    /// answer HTTP.
    pub async fn probe_latency(&self, address: &str) -> Option<u64> {
        let url = format!("http://{}/", address.trim_start_matches("http://"));
        let started = Instant::now();
        match self.http.head(&url).send().await {
            Ok(_) => Some(started.elapsed().as_millis() as u64),
            Err(e) => {
                tracing::debug!(address, error = %e, "latency probe failed");
                None
            }
        }
    }
}

/// Country code to flag emoji via Unicode regional indicators. Non-alpha
/// input comes back unchanged.
pub fn flag_emoji(country_code: &str) -> String {
    if country_code.is_empty() || !country_code.chars().all(|c| c.is_ascii_alphabetic()) {
        return country_code.to_string();
    }
    country_code
        .chars()
        .filter_map(|c| char::from_u32(REGIONAL_INDICATOR_OFFSET + c.to_ascii_uppercase() as u32))
        .collect()
}
