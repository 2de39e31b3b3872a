/// Security module for authentication and token lifecycle
///
/// Provides core security primitives for identity-core:
/// - Password hashing and verification (Argon2id)
/// - Access-token issuance, validation and refresh rotation (RS256 via crypto-core)
/// - Two-factor authentication (TOTP)
/// - Token revocation (in-memory blacklist with per-user index)
///
/// ## Architecture
///
/// - **crypto-core::jwt**: Shared JWT codec (RS256 only)
/// - **password**: Argon2id password hashing
/// - **totp**: TOTP 2FA generation and verification
/// - **token_issuer**: Token pairs and the refresh-token store
/// - **token_revocation**: Revocation blacklist and user token index
pub use crypto_core::jwt::{AccessClaims, JwtCodec};

pub mod password;
pub mod token_issuer;
pub mod token_revocation;
pub mod totp;

pub use password::{hash_password, validate_password_strength, verify_password};
pub use token_issuer::TokenIssuer;
pub use token_revocation::{RevocationRegistry, TokenFingerprint};
pub use totp::TOTPGenerator;
