use crate::error::IdentityError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crypto_core::jwt::ClaimEntry as Claim;

/// Failure taxonomy surfaced to callers, independent of which connector failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    InvalidCredentials,
    UserNotFound,
    UserLocked,
    UserDisabled,
    MfaFailed,
    TokenExpired,
    TokenInvalid,
    /// Backend unreachable or did not answer in time
    ConnectionFailed,
    /// Unknown provider or missing required configuration
    ConfigurationError,
    Unknown,
}

impl AuthErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::UserNotFound => "user_not_found",
            Self::UserLocked => "user_locked",
            Self::UserDisabled => "user_disabled",
            Self::MfaFailed => "mfa_failed",
            Self::TokenExpired => "token_expired",
            Self::TokenInvalid => "token_invalid",
            Self::ConnectionFailed => "connection_failed",
            Self::ConfigurationError => "configuration_error",
            Self::Unknown => "unknown",
        }
    }
}

/// Who the caller is, as established by primary authentication or by a token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub subject_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub claims: Vec<Claim>,
}

impl AuthenticatedIdentity {
    pub fn new(subject_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            username: username.into(),
            ..Default::default()
        }
    }
}

/// Freshly minted access/refresh pair
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    /// `jti` of the access token
    pub token_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    pub identity: AuthenticatedIdentity,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

/// Result of every public identity operation
///
/// `MfaRequired` is not a failure: primary credentials were accepted and the
/// caller must finish with `complete_mfa`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    Success(AuthSuccess),
    Failure {
        message: String,
        kind: AuthErrorKind,
    },
    MfaRequired {
        session_token: String,
    },
}

impl AuthenticationOutcome {
    /// Connector-side success without tokens
    pub fn authenticated(identity: AuthenticatedIdentity) -> Self {
        Self::Success(AuthSuccess {
            identity,
            access_token: None,
            refresh_token: None,
            expiry: None,
        })
    }

    pub fn issued(identity: AuthenticatedIdentity, tokens: IssuedTokens) -> Self {
        Self::Success(AuthSuccess {
            identity,
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            expiry: Some(tokens.expires_at),
        })
    }

    pub fn failure(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(&self) -> Option<&AuthSuccess> {
        match self {
            Self::Success(success) => Some(success),
            _ => None,
        }
    }

    pub fn into_success(self) -> Option<AuthSuccess> {
        match self {
            Self::Success(success) => Some(success),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        match self {
            Self::MfaRequired { session_token } => Some(session_token),
            _ => None,
        }
    }
}

impl From<IdentityError> for AuthenticationOutcome {
    fn from(err: IdentityError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
