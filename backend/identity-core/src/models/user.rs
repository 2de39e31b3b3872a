use crate::models::Claim;
use serde::{Deserialize, Serialize};

/// Directory view of a user, as reported by a connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub subject_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub claims: Vec<Claim>,
    pub enabled: bool,
}

/// Response payload for initiating MFA enrollment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaSetup {
    pub secret: String,
    pub provisioning_uri: String,
    pub backup_codes: Vec<String>,
}

/// Result of checking a one-time code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaVerification {
    pub success: bool,
    /// The verifier has locked the account; no further attempts are accepted
    pub is_locked_out: bool,
}

impl MfaVerification {
    pub fn accepted() -> Self {
        Self {
            success: true,
            is_locked_out: false,
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            is_locked_out: false,
        }
    }

    pub fn locked_out() -> Self {
        Self {
            success: false,
            is_locked_out: true,
        }
    }
}
