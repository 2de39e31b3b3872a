use crate::models::AuthErrorKind;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Account locked: {0}")]
    AccountLocked(String),

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Invalid two FA code")]
    InvalidTwoFACode,

    #[error("Too many failed two FA attempts, account locked out")]
    TwoFALockedOut,

    #[error("No such MFA session")]
    SessionNotFound,

    #[error("MFA session expired")]
    SessionExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Provider unreachable: {0}")]
    ConnectionFailed(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure reported by a connector, carried through with its kind unchanged
    #[error("{message}")]
    Provider {
        kind: AuthErrorKind,
        message: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Map onto the public failure taxonomy
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            IdentityError::InvalidCredentials | IdentityError::WeakPassword(_) => {
                AuthErrorKind::InvalidCredentials
            }
            IdentityError::UserNotFound => AuthErrorKind::UserNotFound,
            IdentityError::AccountLocked(_) => AuthErrorKind::UserLocked,
            IdentityError::AccountDisabled => AuthErrorKind::UserDisabled,
            IdentityError::InvalidTwoFACode | IdentityError::TwoFALockedOut => {
                AuthErrorKind::MfaFailed
            }
            IdentityError::SessionNotFound
            | IdentityError::InvalidToken(_)
            | IdentityError::TokenRevoked => AuthErrorKind::TokenInvalid,
            IdentityError::SessionExpired | IdentityError::TokenExpired => {
                AuthErrorKind::TokenExpired
            }
            IdentityError::ConnectionFailed(_) => AuthErrorKind::ConnectionFailed,
            IdentityError::UnknownProvider(_) | IdentityError::Configuration(_) => {
                AuthErrorKind::ConfigurationError
            }
            IdentityError::Provider { kind, .. } => *kind,
            IdentityError::Cancelled | IdentityError::JwtError(_) | IdentityError::Internal(_) => {
                AuthErrorKind::Unknown
            }
        }
    }

    /// Whether retrying the same request later could succeed
    ///
    /// Taken registry entries (MFA sessions, refresh records) are handed back
    /// when an operation fails for one of these reasons.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            AuthErrorKind::ConnectionFailed | AuthErrorKind::Unknown
        )
    }
}

// Conversions from external error types
impl From<jsonwebtoken::errors::Error> for IdentityError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            JwtErrorKind::ExpiredSignature => IdentityError::TokenExpired,
            _ => {
                tracing::debug!("Token rejected: {}", err);
                IdentityError::InvalidToken(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for IdentityError {
    fn from(err: anyhow::Error) -> Self {
        IdentityError::Internal(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_failures_map_to_token_kinds() {
        assert_eq!(IdentityError::SessionNotFound.kind(), AuthErrorKind::TokenInvalid);
        assert_eq!(IdentityError::SessionExpired.kind(), AuthErrorKind::TokenExpired);
        assert_eq!(IdentityError::TokenRevoked.kind(), AuthErrorKind::TokenInvalid);
    }

    #[test]
    fn test_lockout_surfaces_as_mfa_failure() {
        assert_eq!(IdentityError::TwoFALockedOut.kind(), AuthErrorKind::MfaFailed);
    }

    #[test]
    fn test_provider_kind_passes_through() {
        let err = IdentityError::Provider {
            kind: AuthErrorKind::UserLocked,
            message: "locked by directory".to_string(),
        };
        assert_eq!(err.kind(), AuthErrorKind::UserLocked);
        assert_eq!(err.to_string(), "locked by directory");
    }

    #[test]
    fn test_anyhow_maps_to_unknown_with_message() {
        let err: IdentityError = anyhow::anyhow!("ldap bind exploded").into();
        assert_eq!(err.kind(), AuthErrorKind::Unknown);
        assert!(err.to_string().contains("ldap bind exploded"));
    }

    #[test]
    fn test_transient_errors() {
        assert!(IdentityError::ConnectionFailed("timeout".into()).is_transient());
        assert!(IdentityError::Cancelled.is_transient());
        assert!(!IdentityError::UserNotFound.is_transient());
        assert!(!IdentityError::AccountDisabled.is_transient());
    }
}
