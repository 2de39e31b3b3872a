/// Step-up MFA sessions
///
/// After primary authentication succeeds for a subject that needs a second
/// factor, the established identity is parked in an `MfaSession` behind an
/// unguessable token. Completing the session removes it atomically, so a
/// session is consumed at most once; it only goes back on a plain wrong code.
///
/// ## Completion
///
/// | Verifier result            | Session        | Error              |
/// |----------------------------|----------------|--------------------|
/// | success                    | consumed       | -                  |
/// | wrong code                 | reinserted     | `InvalidTwoFACode` |
/// | locked out                 | discarded      | `TwoFALockedOut`   |
/// | verifier fault / cancelled | reinserted     | `Unknown`          |
use crate::config::MfaSettings;
use crate::error::{IdentityError, Result};
use crate::models::{AuthenticatedIdentity, MfaSession, MfaSetup, MfaVerification};
use crate::services::backend_fault;
use crate::state::{Lease, SweepGate};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 256-bit session tokens
const SESSION_TOKEN_BYTES: usize = 32;

/// Capability consumed from the second-factor backend
#[async_trait]
pub trait MfaVerifier: Send + Sync {
    async fn is_enabled(&self, subject_id: &str) -> anyhow::Result<bool>;

    /// Enroll a subject, replacing any previous enrollment
    async fn setup(&self, subject_id: &str, display_name: Option<String>)
        -> anyhow::Result<MfaSetup>;

    async fn verify(&self, subject_id: &str, code: &str) -> anyhow::Result<MfaVerification>;

    /// `Ok(false)` if the subject was not enrolled
    async fn disable(&self, subject_id: &str) -> anyhow::Result<bool>;
}

pub struct MfaOrchestrator {
    verifier: Arc<dyn MfaVerifier>,
    always_required: bool,
    session_ttl: Duration,
    sessions: DashMap<String, MfaSession>,
    sweep_gate: SweepGate,
}

impl MfaOrchestrator {
    pub fn new(verifier: Arc<dyn MfaVerifier>, settings: &MfaSettings) -> Self {
        Self {
            verifier,
            always_required: settings.always_required,
            session_ttl: Duration::seconds(settings.session_ttl_seconds),
            sessions: DashMap::new(),
            sweep_gate: SweepGate::default(),
        }
    }

    pub fn verifier(&self) -> &Arc<dyn MfaVerifier> {
        &self.verifier
    }

    /// Global policy first, then the subject's own enrollment
    pub async fn is_step_up_required(&self, subject_id: &str) -> Result<bool> {
        if self.always_required {
            return Ok(true);
        }
        self.verifier
            .is_enabled(subject_id)
            .await
            .map_err(backend_fault)
    }

    /// Park `identity` until the second factor is verified
    ///
    /// ## Returns
    ///
    /// The session token handed to the client
    pub fn begin_session(&self, identity: AuthenticatedIdentity, provider: &str) -> String {
        if self.sweep_gate.should_sweep() {
            self.sweep_expired();
        }

        let now = Utc::now();
        let session_token = crypto_core::generate_secret(SESSION_TOKEN_BYTES);
        let session = MfaSession {
            session_token: session_token.clone(),
            subject_id: identity.subject_id.clone(),
            username: identity.username.clone(),
            provider: provider.to_string(),
            pending: identity,
            created_at: now,
            expires_at: now + self.session_ttl,
        };

        info!(
            subject_id = %session.subject_id,
            expires_at = %session.expires_at,
            "MFA session started"
        );
        self.sessions.insert(session_token.clone(), session);
        session_token
    }

    /// Verify `code` for the session behind `session_token`
    ///
    /// Returns the finished session so the caller can issue tokens for
    /// `pending`.
    pub async fn complete_session(&self, session_token: &str, code: &str) -> Result<MfaSession> {
        let Some(lease) = Lease::take(&self.sessions, &session_token.to_string()) else {
            debug!("MFA session unknown or already consumed");
            return Err(IdentityError::SessionNotFound);
        };

        if lease.value().is_expired(Utc::now()) {
            let session = lease.discard();
            info!(subject_id = %session.subject_id, "MFA session expired");
            return Err(IdentityError::SessionExpired);
        }

        let subject_id = lease.value().subject_id.clone();
        // A fault here drops the lease, which restores the session
        let verification = self
            .verifier
            .verify(&subject_id, code)
            .await
            .map_err(backend_fault)?;

        if verification.is_locked_out {
            lease.discard();
            warn!(subject_id = %subject_id, "MFA lockout, session discarded");
            return Err(IdentityError::TwoFALockedOut);
        }

        if !verification.success {
            drop(lease);
            info!(subject_id = %subject_id, "MFA code rejected, session kept for retry");
            return Err(IdentityError::InvalidTwoFACode);
        }

        let session = lease.discard();
        info!(subject_id = %subject_id, "MFA session completed");
        Ok(session)
    }

    /// Remove sessions past their TTL
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn pending_sessions(&self) -> usize {
        self.sessions.len()
    }
}
