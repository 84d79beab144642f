//! Crate-wide error taxonomy.
//!
//! Five families, mirroring how failures are surfaced to the user:
//! - Validation: caught client-side, never reaches the network
//! - Rate limited: `RETRY_AFTER_<n>` / `TOO_MANY_ATTEMPTS`
//! - Unauthorized: bad credentials, expired session, missing token
//! - Server: 5xx with a generic message (full detail goes to the log)
//! - Network: transport-level failure with no structured body

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The client-side attempt guard or a server 429 asked the caller to
    /// wait. The payload is the remaining wait in whole seconds.
    #[error("RETRY_AFTER_{0}")]
    RetryAfter(u64),

    #[error("TOO_MANY_ATTEMPTS")]
    TooManyAttempts,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session expired. Please login again")]
    SessionExpired,

    #[error("Unauthorized")]
    Unauthorized,

    /// A token-gated operation was attempted with no stored token.
    /// Raised before any network call.
    #[error("No authentication token found")]
    NoToken,

    /// Input rejected client-side; never sent to the server.
    #[error("{0}")]
    Validation(String),

    /// 5xx from the endpoint layer. The message is intentionally generic;
    /// the response detail is logged where the error is produced.
    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Structured error body passthrough (the server's `error`/`message`
    /// field, verbatim).
    #[error("{0}")]
    Message(String),
}
