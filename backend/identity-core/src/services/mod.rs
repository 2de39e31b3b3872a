/// Service layer for identity-core
///
/// Provides the orchestration logic:
/// - Step-up MFA sessions (MfaOrchestrator + pluggable MfaVerifier)
/// - Built-in TOTP verifier (TOTP + backup codes + lockout)
/// - Identity facade (authenticate / complete MFA / validate / refresh / revoke)
/// - Background revocation sweeper
use crate::error::{IdentityError, Result};
use crate::models::AuthErrorKind;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub mod identity;
pub mod mfa;
pub mod sweeper;
pub mod two_fa;

pub use identity::{IdentityOrchestrator, SweepStats};
pub use mfa::{MfaOrchestrator, MfaVerifier};
pub use sweeper::spawn_revocation_sweeper;
pub use two_fa::TotpVerifier;

/// Run a connector or verifier call under a deadline and a cancellation signal
///
/// Dropping `fut` on timeout or cancellation is what hands leased registry
/// entries back, so `fut` must own every lease it takes.
pub(crate) async fn bounded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IdentityError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(result) => result,
            Err(_) => Err(IdentityError::ConnectionFailed(format!(
                "no answer within {timeout:?}"
            ))),
        },
    }
}

/// Map a backend fault onto `Unknown`, keeping its message
pub(crate) fn backend_fault(err: anyhow::Error) -> IdentityError {
    warn!(error = %format!("{err:#}"), "Backend call failed");
    IdentityError::Provider {
        kind: AuthErrorKind::Unknown,
        message: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = bounded(&cancel, Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_timeout_is_connection_failure() {
        let cancel = CancellationToken::new();
        let result: Result<()> = bounded(&cancel, Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), AuthErrorKind::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_bounded_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = bounded(&cancel, Duration::from_secs(1), async { Ok(1) }).await;
        assert!(matches!(result, Err(IdentityError::Cancelled)));
    }

    #[test]
    fn test_backend_fault_keeps_message() {
        let err = backend_fault(anyhow::anyhow!("ldap: server down"));
        assert_eq!(err.kind(), AuthErrorKind::Unknown);
        assert_eq!(err.to_string(), "ldap: server down");
    }
}
