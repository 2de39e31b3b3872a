/// Access-token revocation
///
/// Handles real-time token blacklisting for logout, password change and
/// MFA changes. Tokens are identified by the SHA-256 of their `jti`, never by
/// the token text itself.
///
/// ## Architecture
///
/// - **Blacklist**: `token hash -> RevocationEntry`, each entry living until the
///   token's own expiry so the set prunes itself
/// - **User index**: `subject -> {token hash -> expiry}` for every access token
///   issued to a subject, drained by `revoke_all`
///
/// ## Use Cases
///
/// - User logout: Revoke specific access token
/// - Password change: Revoke all user's tokens
/// - Security incident: Revoke all tokens for affected users
use crate::models::RevocationEntry;
use crate::state::SweepGate;
use chrono::{DateTime, Utc};
use crypto_core::jwt::peek_unverified;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Revocation key of a token, read without verifying it
///
/// Good enough for a blacklist lookup only. Entries are written from
/// verified claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFingerprint {
    pub token_hash: String,
}

impl TokenFingerprint {
    /// `None` when the token is not a JWT carrying a `jti`
    pub fn of(token: &str) -> Option<Self> {
        let peeked = peek_unverified(token).ok()?;
        Some(Self {
            token_hash: hash_token_id(&peeked.jti),
        })
    }
}

/// Hash a token identifier using SHA-256
///
/// ## Returns
///
/// Hex-encoded SHA-256 hash
pub fn hash_token_id(jti: &str) -> String {
    crypto_core::sha256_hex(jti.as_bytes())
}

#[derive(Debug, Default)]
pub struct RevocationRegistry {
    revoked: DashMap<String, RevocationEntry>,
    user_tokens: DashMap<String, HashMap<String, DateTime<Utc>>>,
    sweep_gate: SweepGate,
}

impl RevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose opportunistic sweeps run at most once per `interval_secs`
    pub fn with_sweep_interval(interval_secs: i64) -> Self {
        Self {
            sweep_gate: SweepGate::new(interval_secs),
            ..Self::default()
        }
    }

    /// Check if a token has been revoked
    pub fn is_revoked(&self, token_hash: &str) -> bool {
        self.revoked.contains_key(token_hash)
    }

    /// Revoke a token until its natural expiry
    ///
    /// Idempotent: revoking twice keeps a single entry.
    pub fn revoke(&self, token_hash: &str, expires_at: DateTime<Utc>) {
        self.maybe_sweep();
        self.revoked.insert(
            token_hash.to_string(),
            RevocationEntry {
                token_hash: token_hash.to_string(),
                expires_at,
            },
        );
        info!(
            token_hash = %token_hash,
            expires_at = %expires_at,
            "Token revoked, blacklist entry kept until token expiry"
        );
    }

    /// Record an access token issued to `subject_id` so `revoke_all` can reach it
    pub fn track(&self, subject_id: &str, token_hash: &str, expires_at: DateTime<Utc>) {
        self.maybe_sweep();
        self.user_tokens
            .entry(subject_id.to_string())
            .or_default()
            .insert(token_hash.to_string(), expires_at);
    }

    /// Revoke all tokens issued to a subject so far
    ///
    /// The subject's index entry is drained in one atomic removal; tokens
    /// tracked after this call start a fresh index entry and stay valid.
    ///
    /// ## Returns
    ///
    /// Number of tokens revoked
    pub fn revoke_all(&self, subject_id: &str) -> usize {
        self.maybe_sweep();
        let Some((_, tokens)) = self.user_tokens.remove(subject_id) else {
            debug!(subject_id = %subject_id, "No outstanding tokens to revoke");
            return 0;
        };

        let count = tokens.len();
        for (token_hash, expires_at) in tokens {
            self.revoked.insert(
                token_hash.clone(),
                RevocationEntry {
                    token_hash,
                    expires_at,
                },
            );
        }

        warn!(subject_id = %subject_id, count, "All tokens revoked for user");
        count
    }

    /// Remove blacklist and index entries whose token has expired anyway
    ///
    /// ## Returns
    ///
    /// Number of blacklist entries removed
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.revoked.len();
        self.revoked.retain(|_, entry| !entry.is_expired(now));
        self.user_tokens.retain(|_, tokens| {
            tokens.retain(|_, expires_at| *expires_at > now);
            !tokens.is_empty()
        });

        let removed = before.saturating_sub(self.revoked.len());
        if removed > 0 {
            debug!(
                removed,
                remaining = self.revoked.len(),
                "Swept expired revocation entries"
            );
        }
        removed
    }

    /// Number of live blacklist entries (for monitoring)
    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }

    /// Number of tokens currently indexed for a subject
    pub fn outstanding_for(&self, subject_id: &str) -> usize {
        self.user_tokens
            .get(subject_id)
            .map(|tokens| tokens.len())
            .unwrap_or(0)
    }

    fn maybe_sweep(&self) {
        if self.sweep_gate.should_sweep() {
            self.sweep_expired();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn in_secs(secs: i64) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(secs)
    }

    #[test]
    fn test_sha256_hash_consistency() {
        assert_eq!(hash_token_id("jti-1"), hash_token_id("jti-1"));
        assert_ne!(hash_token_id("jti-1"), hash_token_id("jti-2"));
        // SHA-256 produces 64 hex characters
        assert_eq!(hash_token_id("jti-1").len(), 64);
    }

    #[test]
    fn test_revoke_then_check() {
        let registry = RevocationRegistry::new();
        assert!(!registry.is_revoked("h1"));

        registry.revoke("h1", in_secs(60));
        assert!(registry.is_revoked("h1"));

        // Idempotent
        registry.revoke("h1", in_secs(60));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_revoke_all_only_hits_tracked_tokens() {
        let registry = RevocationRegistry::new();
        registry.track("u1", "a", in_secs(60));
        registry.track("u1", "b", in_secs(60));
        registry.track("u2", "c", in_secs(60));

        assert_eq!(registry.revoke_all("u1"), 2);
        assert!(registry.is_revoked("a"));
        assert!(registry.is_revoked("b"));
        assert!(!registry.is_revoked("c"));
        assert_eq!(registry.outstanding_for("u1"), 0);

        // Issued after the call: unaffected
        registry.track("u1", "d", in_secs(60));
        assert!(!registry.is_revoked("d"));
        assert_eq!(registry.outstanding_for("u1"), 1);
    }

    #[test]
    fn test_revoke_all_unknown_subject_is_noop() {
        let registry = RevocationRegistry::new();
        assert_eq!(registry.revoke_all("nobody"), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_drops_only_expired_entries() {
        // Opportunistic sweeps disabled so only the explicit call prunes
        let registry = RevocationRegistry::with_sweep_interval(i64::MAX);
        registry.revoke("old", in_secs(-10));
        registry.revoke("live", in_secs(600));
        registry.track("u1", "old-idx", in_secs(-10));
        registry.track("u1", "live-idx", in_secs(600));

        assert_eq!(registry.sweep_expired(), 1);
        assert!(!registry.is_revoked("old"));
        assert!(registry.is_revoked("live"));
        assert_eq!(registry.outstanding_for("u1"), 1);
    }

    #[test]
    fn test_fingerprint_of_garbage_is_none() {
        assert!(TokenFingerprint::of("not-a-jwt").is_none());
    }
}
