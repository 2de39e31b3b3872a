use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blacklist entry for an access token that was revoked before its natural expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    /// SHA-256 of the token's `jti`
    pub token_hash: String,
    /// When the token would naturally expire
    pub expires_at: DateTime<Utc>,
}

impl RevocationEntry {
    /// Check if the revocation record itself has expired (token's natural expiration)
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
