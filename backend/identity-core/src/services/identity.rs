/// Identity facade
///
/// Composes provider selection, step-up MFA, token issuance and revocation
/// into the public authenticate / complete-MFA / validate / refresh / revoke
/// protocol. Every public operation returns an `AuthenticationOutcome`;
/// errors are resolved here and never escape as faults.
///
/// ## Authentication flow
///
/// ```text
/// Started -> PrimaryVerified -> Issued
///                            -> MfaPending -> Issued | Abandoned
/// ```
///
/// No token exists until the flow reaches `Issued`.
use crate::config::Settings;
use crate::error::{IdentityError, Result};
use crate::models::{
    AuthErrorKind, AuthSuccess, AuthenticatedIdentity, AuthenticationOutcome, MfaSetup,
    RefreshTokenRecord, UserInfo,
};
use crate::providers::ProviderSelector;
use crate::security::{
    validate_password_strength, AccessClaims, JwtCodec, RevocationRegistry, TokenFingerprint,
    TokenIssuer,
};
use crate::services::{backend_fault, bounded, MfaOrchestrator, MfaVerifier};
use chrono::{TimeZone, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Entries removed by one `sweep_expired` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub revocations: usize,
    pub refresh_tokens: usize,
    pub mfa_sessions: usize,
}

pub struct IdentityOrchestrator {
    selector: ProviderSelector,
    mfa: MfaOrchestrator,
    issuer: TokenIssuer,
    revocation: Arc<RevocationRegistry>,
    call_timeout: Duration,
}

impl IdentityOrchestrator {
    /// Build an orchestrator with its own, empty registries
    ///
    /// ## Errors
    ///
    /// `Configuration` if the signing keys do not parse.
    pub fn new(
        settings: &Settings,
        selector: ProviderSelector,
        verifier: Arc<dyn MfaVerifier>,
    ) -> Result<Self> {
        let codec = JwtCodec::from_rsa_pem(
            &settings.jwt.private_key_pem,
            &settings.jwt.public_key_pem,
            &settings.jwt.issuer,
            &settings.jwt.audience,
            settings.jwt.leeway_seconds,
        )
        .map_err(|e| IdentityError::Configuration(format!("{e:#}")))?;

        Ok(Self::with_codec(codec, settings, selector, verifier))
    }

    pub fn with_codec(
        codec: JwtCodec,
        settings: &Settings,
        selector: ProviderSelector,
        verifier: Arc<dyn MfaVerifier>,
    ) -> Self {
        let revocation = Arc::new(RevocationRegistry::new());
        Self {
            selector,
            mfa: MfaOrchestrator::new(verifier, &settings.mfa),
            issuer: TokenIssuer::new(codec, &settings.tokens, Arc::clone(&revocation)),
            revocation,
            call_timeout: settings.providers.call_timeout(),
        }
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        provider: Option<&str>,
    ) -> AuthenticationOutcome {
        self.authenticate_with_cancel(username, password, provider, &CancellationToken::new())
            .await
    }

    /// `authenticate` that gives up when `cancel` fires
    ///
    /// A cancelled attempt leaves neither an MFA session nor tokens behind.
    pub async fn authenticate_with_cancel(
        &self,
        username: &str,
        password: &str,
        provider: Option<&str>,
        cancel: &CancellationToken,
    ) -> AuthenticationOutcome {
        let outcome = self
            .try_authenticate(username, password, provider, cancel)
            .await;
        finish("authenticate", outcome)
    }

    async fn try_authenticate(
        &self,
        username: &str,
        password: &str,
        provider: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AuthenticationOutcome> {
        let connector = self.selector.resolve(provider)?;
        let provider_name = connector.name().to_string();

        let primary = self
            .call(cancel, async {
                connector
                    .authenticate(username, password)
                    .await
                    .map_err(backend_fault)
            })
            .await?;

        let identity = match primary {
            AuthenticationOutcome::Success(success) => success.identity,
            AuthenticationOutcome::Failure { kind, message } => {
                info!(
                    username = %username,
                    provider = %provider_name,
                    kind = kind.as_str(),
                    "Primary authentication rejected"
                );
                return Ok(AuthenticationOutcome::Failure { kind, message });
            }
            AuthenticationOutcome::MfaRequired { .. } => {
                return Err(IdentityError::Provider {
                    kind: AuthErrorKind::Unknown,
                    message: format!("connector {provider_name} issued its own MFA challenge"),
                });
            }
        };

        let step_up = self
            .call(cancel, self.mfa.is_step_up_required(&identity.subject_id))
            .await?;
        if step_up {
            let session_token = self.mfa.begin_session(identity, &provider_name);
            return Ok(AuthenticationOutcome::MfaRequired { session_token });
        }

        let tokens = self.issuer.issue(&identity, &provider_name)?;
        info!(
            subject_id = %identity.subject_id,
            provider = %provider_name,
            "Authentication succeeded"
        );
        Ok(AuthenticationOutcome::issued(identity, tokens))
    }

    pub async fn complete_mfa(&self, session_token: &str, code: &str) -> AuthenticationOutcome {
        self.complete_mfa_with_cancel(session_token, code, &CancellationToken::new())
            .await
    }

    /// `complete_mfa` that gives up when `cancel` fires; the session survives
    pub async fn complete_mfa_with_cancel(
        &self,
        session_token: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> AuthenticationOutcome {
        let outcome = async {
            let session = self
                .call(cancel, self.mfa.complete_session(session_token, code))
                .await?;
            let tokens = self.issuer.issue(&session.pending, &session.provider)?;
            Ok::<_, IdentityError>(AuthenticationOutcome::issued(session.pending, tokens))
        }
        .await;
        finish("complete_mfa", outcome)
    }

    /// Check revocation, then signature, issuer, audience and expiry
    ///
    /// Claims come from the token alone; no connector is consulted.
    pub fn validate_token(&self, token: &str) -> AuthenticationOutcome {
        finish("validate_token", self.try_validate(token))
    }

    fn try_validate(&self, token: &str) -> Result<AuthenticationOutcome> {
        if let Some(fingerprint) = TokenFingerprint::of(token) {
            if self.revocation.is_revoked(&fingerprint.token_hash) {
                return Err(IdentityError::TokenRevoked);
            }
        }

        let claims = self.issuer.validate(token)?;
        let expiry = Utc.timestamp_opt(claims.exp, 0).single();
        Ok(AuthenticationOutcome::Success(AuthSuccess {
            identity: identity_from_claims(claims),
            access_token: None,
            refresh_token: None,
            expiry,
        }))
    }

    pub async fn refresh_token(&self, refresh_secret: &str) -> AuthenticationOutcome {
        self.refresh_token_with_cancel(refresh_secret, &CancellationToken::new())
            .await
    }

    /// `refresh_token` that gives up when `cancel` fires; the secret stays usable
    pub async fn refresh_token_with_cancel(
        &self,
        refresh_secret: &str,
        cancel: &CancellationToken,
    ) -> AuthenticationOutcome {
        let outcome = self
            .call(
                cancel,
                self.issuer
                    .rotate(refresh_secret, |record| self.resolve_current_identity(record)),
            )
            .await
            .map(|(identity, tokens)| AuthenticationOutcome::issued(identity, tokens));
        finish("refresh_token", outcome)
    }

    /// Re-read roles, groups and status from the connector that issued the pair
    async fn resolve_current_identity(
        &self,
        record: RefreshTokenRecord,
    ) -> Result<AuthenticatedIdentity> {
        let connector = self.selector.resolve(Some(record.provider.as_str()))?;
        let info = connector
            .get_user_info(&record.subject_id)
            .await
            .map_err(backend_fault)?
            .ok_or(IdentityError::UserNotFound)?;
        if !info.enabled {
            return Err(IdentityError::AccountDisabled);
        }
        let groups = connector
            .get_groups(&record.subject_id)
            .await
            .map_err(backend_fault)?;

        Ok(AuthenticatedIdentity {
            subject_id: info.subject_id,
            username: info.username,
            display_name: info.display_name,
            email: info.email,
            roles: info.roles,
            groups,
            claims: info.claims,
        })
    }

    /// Blacklist a single access token until its natural expiry
    ///
    /// Idempotent. Tokens this orchestrator did not sign are ignored, so the
    /// blacklist only ever holds entries that expire.
    pub fn revoke_token(&self, token: &str) {
        match self.issuer.revocation_entry(token) {
            Ok(entry) => self.revocation.revoke(&entry.token_hash, entry.expires_at),
            Err(err) => debug!(error = %err, "Ignoring revocation of unverifiable token"),
        }
    }

    /// Revoke every access token issued to `subject_id` so far and drop its
    /// refresh tokens
    pub fn revoke_all_user_tokens(&self, subject_id: &str) {
        // Cutoff first, so a rotation racing this call is either withdrawn or
        // tracked before the index is drained
        let refresh = self.issuer.revoke_refresh_tokens(subject_id);
        let access = self.revocation.revoke_all(subject_id);
        info!(
            subject_id = %subject_id,
            access_tokens = access,
            refresh_tokens = refresh,
            "Revoked all user tokens"
        );
    }

    /// Registered provider names in registration order
    pub fn get_available_providers(&self) -> Vec<String> {
        self.selector.names()
    }

    /// Change a password through the subject's connector
    ///
    /// On success every token issued to the subject is revoked.
    pub async fn change_password(
        &self,
        subject_id: &str,
        current_password: &str,
        new_password: &str,
        provider: Option<&str>,
    ) -> Result<()> {
        validate_password_strength(new_password)?;
        let connector = self.selector.resolve(provider)?;

        let changed = self
            .call(&CancellationToken::new(), async {
                connector
                    .change_password(subject_id, current_password, new_password)
                    .await
                    .map_err(backend_fault)
            })
            .await?;
        if !changed {
            warn!(subject_id = %subject_id, "Password change rejected");
            return Err(IdentityError::InvalidCredentials);
        }

        info!(subject_id = %subject_id, "Password changed");
        self.revoke_all_user_tokens(subject_id);
        Ok(())
    }

    pub async fn get_user_info(
        &self,
        subject_id: &str,
        provider: Option<&str>,
    ) -> Result<Option<UserInfo>> {
        let connector = self.selector.resolve(provider)?;
        self.call(&CancellationToken::new(), async {
            connector
                .get_user_info(subject_id)
                .await
                .map_err(backend_fault)
        })
        .await
    }

    /// Enroll a subject with the MFA verifier
    pub async fn setup_mfa(&self, subject_id: &str, display_name: Option<String>) -> Result<MfaSetup> {
        let verifier = self.mfa.verifier();
        let setup = self
            .call(&CancellationToken::new(), async {
                verifier
                    .setup(subject_id, display_name)
                    .await
                    .map_err(backend_fault)
            })
            .await?;
        info!(subject_id = %subject_id, "MFA enrollment started");
        Ok(setup)
    }

    /// Remove a subject's MFA enrollment; outstanding tokens are revoked
    pub async fn disable_mfa(&self, subject_id: &str) -> Result<bool> {
        let verifier = self.mfa.verifier();
        let disabled = self
            .call(&CancellationToken::new(), async {
                verifier.disable(subject_id).await.map_err(backend_fault)
            })
            .await?;
        if disabled {
            self.revoke_all_user_tokens(subject_id);
        }
        Ok(disabled)
    }

    /// Prune expired revocations, refresh records and MFA sessions
    pub fn sweep_expired(&self) -> SweepStats {
        SweepStats {
            revocations: self.revocation.sweep_expired(),
            refresh_tokens: self.issuer.sweep_expired(),
            mfa_sessions: self.mfa.sweep_expired(),
        }
    }

    pub fn revocation(&self) -> &RevocationRegistry {
        &self.revocation
    }

    async fn call<T, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        bounded(cancel, self.call_timeout, fut).await
    }
}

fn identity_from_claims(claims: AccessClaims) -> AuthenticatedIdentity {
    AuthenticatedIdentity {
        subject_id: claims.sub,
        username: claims.username,
        display_name: claims.name,
        email: claims.email,
        roles: claims.roles,
        groups: claims.groups,
        claims: claims.claims,
    }
}

/// Resolve an operation's error into a `Failure` outcome
fn finish(operation: &'static str, result: Result<AuthenticationOutcome>) -> AuthenticationOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(err) => {
            let kind = err.kind();
            if err.is_transient() {
                warn!(operation, kind = kind.as_str(), error = %err, "Identity operation failed");
            } else {
                info!(operation, kind = kind.as_str(), error = %err, "Identity operation rejected");
            }
            err.into()
        }
    }
}
