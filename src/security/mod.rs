//! Client-side input hygiene: validators and the outbound text sanitizer.
//!
//! Validation happens before any network call — malformed input never leaves
//! the process. The authoritative checks live server-side; these exist to
//! fail fast and keep garbage out of requests.

pub mod sanitize;
pub mod validators;

pub use sanitize::{sanitize, sanitize_opt};
pub use validators::{
    is_allowed_avatar, is_strong_password, is_valid_email, is_valid_ipv4, is_valid_phone,
};
