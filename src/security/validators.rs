//! Pure input validators for credentials and endpoint addresses.
//!
//! Everything here is stateless and side-effect free. The validators return
//! plain booleans; callers derive their own user-facing messages.

use regex::Regex;
use std::sync::LazyLock;

/// Symbol set a strong password must draw at least one character from.
const PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Minimum strong-password length.
const MIN_PASSWORD_LEN: usize = 8;

/// Avatar upload cap: 5MB, matching the server-side multer limit.
pub const MAX_AVATAR_BYTES: u64 = 5 * 1024 * 1024;

/// Avatar extensions the server accepts.
const AVATAR_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

static IPV4_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").unwrap());

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d\s+()-]{8,15}$").unwrap());

/// IPv4 syntax check: exactly four dot-separated groups of 1-3 digits, each
/// in [0,255]. No inet_aton shorthand (three-group forms, octal groups).
pub fn is_valid_ipv4(address: &str) -> bool {
    if !IPV4_SHAPE.is_match(address) {
        return false;
    }
    address
        .split('.')
        .all(|octet| matches!(octet.parse::<u16>(), Ok(n) if n <= 255))
}

/// Password strength: length >= 8 plus at least one uppercase, lowercase,
/// digit, and symbol from [`PASSWORD_SYMBOLS`].
pub fn is_strong_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}

/// Email shape: single `@`, non-empty local and domain parts, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Phone shape: 8-15 characters of digits, spaces, `+`, parentheses, `-`.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE.is_match(phone)
}

/// Client-side precheck for avatar uploads: allowed image extension and
/// size under the 5MB cap. The server re-validates; this only saves the
/// round trip.
pub fn is_allowed_avatar(file_name: &str, len: u64) -> bool {
    if len == 0 || len > MAX_AVATAR_BYTES {
        return false;
    }
    match file_name.rsplit_once('.') {
        Some((_, ext)) => AVATAR_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}
