use crate::models::AuthenticatedIdentity;
use chrono::{DateTime, Duration, Utc};

/// Pending step-up authentication
///
/// Holds the identity established by primary authentication until the second
/// factor is verified. Never leaves the MFA orchestrator.
#[derive(Debug, Clone)]
pub struct MfaSession {
    pub session_token: String,
    pub subject_id: String,
    pub username: String,
    /// Connector that performed primary authentication
    pub provider: String,
    pub pending: AuthenticatedIdentity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MfaSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Server-side state for an opaque refresh secret
///
/// Keyed by the SHA-256 of the secret; the secret itself is never stored.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub secret_hash: String,
    pub subject_id: String,
    pub username: String,
    /// Connector consulted again when the record is rotated
    pub provider: String,
    pub issued_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl RefreshTokenRecord {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + self.ttl
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }
}
