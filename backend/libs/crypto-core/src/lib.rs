//! Shared cryptographic primitives for Nova identity components
//!
//! - `jwt`: RS256 access-token codec with strict issuer/audience validation
//! - `hash`: SHA-256 helpers for one-way token fingerprints
//! - `random`: OS-backed random secrets (refresh tokens, session handles)
pub mod hash;
pub mod jwt;
pub mod random;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use hash::{sha256, sha256_hex};
pub use jwt::{AccessClaims, ClaimEntry, JwtCodec, UnverifiedClaims};
pub use random::generate_secret;
