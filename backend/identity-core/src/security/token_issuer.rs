/// Access/refresh token issuance
///
/// Access tokens are RS256 JWTs whose claims are captured once, here, from
/// the identity that earned them. Refresh tokens are opaque 256-bit secrets;
/// only their SHA-256 is kept, in a single-use store.
///
/// ## Refresh rotation
///
/// 1. Hash the presented secret and atomically remove its record
/// 2. Reject if absent (unknown or already used) or past its TTL
/// 3. Re-resolve the subject's current claims from the source connector
/// 4. Issue a brand-new pair, then consume the old record
///
/// Because step 1 is a single removal, concurrent rotations of one secret
/// produce exactly one new pair.
///
/// `revoke_refresh_tokens` leaves a per-subject cutoff behind. A record
/// issued at or before the cutoff never mints again, even if it was leased
/// out by an in-flight rotation when the revocation ran.
use crate::config::TokenSettings;
use crate::error::{IdentityError, Result};
use crate::models::{AuthenticatedIdentity, IssuedTokens, RefreshTokenRecord, RevocationEntry};
use crate::security::token_revocation::{hash_token_id, RevocationRegistry};
use crate::state::{Lease, SweepGate};
use chrono::{DateTime, Duration, TimeZone, Utc};
use crypto_core::jwt::{AccessClaims, JwtCodec};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 256 bits of entropy per refresh secret
const REFRESH_SECRET_BYTES: usize = 32;
const MAX_LEEWAY_SECS: u64 = 24 * 3600;

pub struct TokenIssuer {
    codec: JwtCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
    /// Validation leeway; blacklist entries outlive `exp` by this much
    leeway: Duration,
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
    /// subject -> latest revoke-all
    refresh_cutoffs: DashMap<String, DateTime<Utc>>,
    revocation: Arc<RevocationRegistry>,
    sweep_gate: SweepGate,
}

impl TokenIssuer {
    pub fn new(codec: JwtCodec, settings: &TokenSettings, revocation: Arc<RevocationRegistry>) -> Self {
        let leeway = Duration::seconds(codec.leeway().min(MAX_LEEWAY_SECS) as i64);
        Self {
            codec,
            access_ttl: Duration::seconds(settings.access_token_ttl_seconds),
            refresh_ttl: Duration::seconds(settings.refresh_token_ttl_seconds),
            leeway,
            refresh_tokens: DashMap::new(),
            refresh_cutoffs: DashMap::new(),
            revocation,
            sweep_gate: SweepGate::default(),
        }
    }

    /// Mint an access token and a refresh secret for `identity`
    ///
    /// The access token's `jti` hash is registered in the user token index so
    /// a later revoke-all reaches it.
    pub fn issue(&self, identity: &AuthenticatedIdentity, provider: &str) -> Result<IssuedTokens> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = AccessClaims {
            iss: self.codec.issuer().to_string(),
            aud: self.codec.audience().to_string(),
            sub: identity.subject_id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: jti.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            name: identity.display_name.clone(),
            roles: identity.roles.clone(),
            groups: identity.groups.clone(),
            claims: identity.claims.clone(),
        };

        let access_token = self
            .codec
            .encode(&claims)
            .map_err(|e| IdentityError::JwtError(e.to_string()))?;

        let refresh_token = crypto_core::generate_secret(REFRESH_SECRET_BYTES);
        let secret_hash = hash_refresh_secret(&refresh_token);

        self.maybe_sweep();
        self.refresh_tokens.insert(
            secret_hash.clone(),
            RefreshTokenRecord {
                secret_hash,
                subject_id: identity.subject_id.clone(),
                username: identity.username.clone(),
                provider: provider.to_string(),
                issued_at: now,
                ttl: self.refresh_ttl,
            },
        );

        // exp is stored with second precision; index with the same value
        let indexed_expiry = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(expires_at);
        self.revocation.track(
            &identity.subject_id,
            &hash_token_id(&jti),
            indexed_expiry + self.leeway,
        );

        info!(
            subject_id = %identity.subject_id,
            provider = %provider,
            jti = %jti,
            "Issued token pair"
        );

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_at: indexed_expiry,
            token_id: jti,
        })
    }

    /// Exchange a refresh secret for a new pair
    ///
    /// `resolve` re-reads the subject's current identity from its connector.
    /// The record is consumed on success and on permanent failures; if
    /// resolution or signing fails transiently, or the future is dropped
    /// mid-flight, the record goes back so the client can retry.
    pub async fn rotate<F, Fut>(
        &self,
        refresh_secret: &str,
        resolve: F,
    ) -> Result<(AuthenticatedIdentity, IssuedTokens)>
    where
        F: FnOnce(RefreshTokenRecord) -> Fut,
        Fut: Future<Output = Result<AuthenticatedIdentity>>,
    {
        let secret_hash = hash_refresh_secret(refresh_secret);
        let Some(lease) = Lease::take(&self.refresh_tokens, &secret_hash) else {
            warn!("Refresh token unknown or already used");
            return Err(IdentityError::InvalidToken(
                "unknown refresh token".to_string(),
            ));
        };

        if lease.value().is_expired(Utc::now()) {
            let record = lease.discard();
            info!(subject_id = %record.subject_id, "Refresh token expired");
            return Err(IdentityError::InvalidToken(
                "refresh token expired".to_string(),
            ));
        }

        if self.is_cut_off(lease.value()) {
            let record = lease.discard();
            return Err(refresh_revoked(&record));
        }

        let record = lease.value().clone();
        let resolved = resolve(record.clone()).await;

        // Revoke-all may have run while the record was leased out
        if self.is_cut_off(&record) {
            lease.discard();
            return Err(refresh_revoked(&record));
        }

        match resolved {
            Ok(identity) => {
                // Signing failure drops the lease, which restores the record
                let tokens = self.issue(&identity, &record.provider)?;
                lease.discard();

                if self.is_cut_off(&record) {
                    self.withdraw(&identity.subject_id, &tokens);
                    return Err(refresh_revoked(&record));
                }
                Ok((identity, tokens))
            }
            Err(err) if err.is_transient() => Err(err),
            Err(err) => {
                lease.discard();
                warn!(
                    subject_id = %record.subject_id,
                    error = %err,
                    "Refresh rejected, record dropped"
                );
                Err(err)
            }
        }
    }

    /// Verify signature, issuer, audience and expiry of an access token
    pub fn validate(&self, token: &str) -> Result<AccessClaims> {
        let data = self.codec.decode(token)?;
        Ok(data.claims)
    }

    /// Blacklist entry for one of our access tokens
    ///
    /// Signature, issuer and audience are verified first; only then is `exp`
    /// trusted. An expired token still yields an entry, which the next sweep
    /// prunes.
    pub fn revocation_entry(&self, token: &str) -> Result<RevocationEntry> {
        let claims = self.codec.decode_ignoring_expiry(token)?.claims;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| IdentityError::InvalidToken("exp out of range".to_string()))?;

        Ok(RevocationEntry {
            token_hash: hash_token_id(&claims.jti),
            expires_at: expires_at.min(Utc::now() + self.access_ttl) + self.leeway,
        })
    }

    /// Drop every outstanding refresh record of a subject
    ///
    /// Records leased out by an in-flight rotation are caught by the cutoff.
    ///
    /// ## Returns
    ///
    /// Number of records removed
    pub fn revoke_refresh_tokens(&self, subject_id: &str) -> usize {
        let cutoff = Utc::now();
        self.refresh_cutoffs.insert(subject_id.to_string(), cutoff);

        let before = self.refresh_tokens.len();
        self.refresh_tokens
            .retain(|_, record| record.subject_id != subject_id);
        before.saturating_sub(self.refresh_tokens.len())
    }

    /// Remove refresh records past their TTL or behind a revoke-all cutoff
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.refresh_tokens.len();
        self.refresh_tokens
            .retain(|_, record| !record.is_expired(now) && !self.is_cut_off(record));

        // Every record older than a full TTL is expired anyway
        let horizon = now - self.refresh_ttl;
        self.refresh_cutoffs.retain(|_, cutoff| *cutoff > horizon);

        before.saturating_sub(self.refresh_tokens.len())
    }

    /// Number of live refresh records (for monitoring)
    pub fn outstanding_refresh_tokens(&self) -> usize {
        self.refresh_tokens.len()
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    fn is_cut_off(&self, record: &RefreshTokenRecord) -> bool {
        self.refresh_cutoffs
            .get(&record.subject_id)
            .is_some_and(|cutoff| record.issued_at <= *cutoff)
    }

    /// Take back a pair that lost the race against a revoke-all
    fn withdraw(&self, subject_id: &str, tokens: &IssuedTokens) {
        self.refresh_tokens
            .remove(&hash_refresh_secret(&tokens.refresh_token));
        self.revocation.revoke(
            &hash_token_id(&tokens.token_id),
            tokens.expires_at + self.leeway,
        );
        warn!(subject_id = %subject_id, jti = %tokens.token_id, "Withdrew pair issued during revoke-all");
    }

    fn maybe_sweep(&self) {
        if self.sweep_gate.should_sweep() {
            self.sweep_expired();
        }
    }
}

fn hash_refresh_secret(secret: &str) -> String {
    crypto_core::sha256_hex(secret.as_bytes())
}

fn refresh_revoked(record: &RefreshTokenRecord) -> IdentityError {
    info!(subject_id = %record.subject_id, "Refresh token revoked");
    IdentityError::InvalidToken("refresh token revoked".to_string())
}
