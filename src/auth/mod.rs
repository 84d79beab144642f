//! Authentication: session lifecycle, persistent token slot, attempt
//! pacing, and the hosted-provider flow.
//!
//! ## Design Decisions
//! - The attempt guard is an explicit object with an injectable clock (not
//!   module-level state) so time-dependent behavior is testable; the
//!   session manager owns the process-wide instance.
//! - Session eviction goes through one shared `SessionGate` interface
//!   rather than each API client touching storage on its own.
//! - Identity is two fields (cached and confirmed) merged with a fixed
//!   precedence instead of being overwritten in place.

pub mod rate_limit;
pub mod session;
pub mod sso;
pub mod token_store;

pub use rate_limit::AttemptGuard;
pub use session::{AuthSession, IdentityPatch, SessionState};
pub use token_store::TokenStore;
