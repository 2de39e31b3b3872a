//! Configuration management for Identity Core
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! Every section can also be built in code, which is what embedding services
//! and tests do.
//!
//! # Example
//!
//! ```no_run
//! use identity_core::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     println!("JWT issuer: {}", settings.jwt.issuer);
//!     Ok(())
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub jwt: JwtSettings,
    pub tokens: TokenSettings,
    pub mfa: MfaSettings,
    pub providers: ProviderSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            jwt: JwtSettings::from_env()?,
            tokens: TokenSettings::from_env()?,
            mfa: MfaSettings::from_env()?,
            providers: ProviderSettings::from_env()?,
        })
    }

    /// Settings with default lifetimes and policies around the given signing keys
    pub fn with_jwt(jwt: JwtSettings) -> Self {
        Self {
            jwt,
            tokens: TokenSettings::default(),
            mfa: MfaSettings::default(),
            providers: ProviderSettings::default(),
        }
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid {key}"))
}

/// `parse_env` for lifetimes, intervals and limits, which must be above zero
fn parse_positive_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr + PartialOrd + Default + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value: T = parse_env(key, default)?;
    if value <= T::default() {
        bail!("Invalid {key}: must be greater than zero, got {value}");
    }
    Ok(value)
}

/// JWT signing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    /// RSA private key (PEM) used to sign access tokens
    pub private_key_pem: String,
    /// RSA public key (PEM) used to validate access tokens
    pub public_key_pem: String,
    pub issuer: String,
    pub audience: String,
    /// Clock skew tolerance applied to `exp`
    pub leeway_seconds: u64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            private_key_pem: env::var("JWT_PRIVATE_KEY_PEM")
                .context("JWT_PRIVATE_KEY_PEM must be set")?,
            public_key_pem: env::var("JWT_PUBLIC_KEY_PEM")
                .context("JWT_PUBLIC_KEY_PEM must be set")?,
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "nova-identity".to_string()),
            audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nova-api".to_string()),
            leeway_seconds: parse_env("JWT_LEEWAY_SECONDS", "30")?,
        })
    }
}

/// Token lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    /// Interval of the optional background sweeper
    pub sweep_interval_seconds: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_token_ttl_seconds: 3600,
            refresh_token_ttl_seconds: 30 * 24 * 3600,
            sweep_interval_seconds: 60,
        }
    }
}

impl TokenSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            access_token_ttl_seconds: parse_positive_env("ACCESS_TOKEN_TTL_SECONDS", "3600")?,
            refresh_token_ttl_seconds: parse_positive_env("REFRESH_TOKEN_TTL_SECONDS", "2592000")?,
            sweep_interval_seconds: parse_positive_env("REVOCATION_SWEEP_INTERVAL_SECONDS", "60")?,
        })
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Step-up authentication policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaSettings {
    /// Require a second factor from every subject, enrolled or not
    pub always_required: bool,
    /// Lifetime of a pending MFA session (default: 300 = 5 minutes)
    pub session_ttl_seconds: i64,
    /// Failed codes tolerated by the TOTP verifier before lockout
    pub max_failed_attempts: u32,
    pub lockout_seconds: i64,
    /// Issuer label shown in authenticator apps
    pub totp_issuer: String,
}

impl Default for MfaSettings {
    fn default() -> Self {
        Self {
            always_required: false,
            session_ttl_seconds: 300,
            max_failed_attempts: 5,
            lockout_seconds: 900,
            totp_issuer: "Nova".to_string(),
        }
    }
}

impl MfaSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            always_required: parse_env("MFA_ALWAYS_REQUIRED", "false")?,
            session_ttl_seconds: parse_positive_env("MFA_SESSION_TTL_SECONDS", "300")?,
            max_failed_attempts: parse_positive_env("MFA_MAX_FAILED_ATTEMPTS", "5")?,
            lockout_seconds: parse_positive_env("MFA_LOCKOUT_SECONDS", "900")?,
            totp_issuer: env::var("MFA_TOTP_ISSUER").unwrap_or_else(|_| "Nova".to_string()),
        })
    }
}

/// Connector call settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Upper bound on any single connector or verifier call
    pub call_timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            call_timeout_seconds: 10,
        }
    }
}

impl ProviderSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            call_timeout_seconds: parse_positive_env("PROVIDER_CALL_TIMEOUT_SECONDS", "10")?,
        })
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_jwt_settings_from_env() {
        // Set test environment variables
        env::set_var("JWT_PRIVATE_KEY_PEM", "private-pem");
        env::set_var("JWT_PUBLIC_KEY_PEM", "public-pem");
        env::set_var("JWT_ISSUER", "test-issuer");
        env::set_var("JWT_AUDIENCE", "test-audience");
        env::set_var("JWT_LEEWAY_SECONDS", "5");

        let settings = JwtSettings::from_env().unwrap();

        assert_eq!(settings.private_key_pem, "private-pem");
        assert_eq!(settings.public_key_pem, "public-pem");
        assert_eq!(settings.issuer, "test-issuer");
        assert_eq!(settings.audience, "test-audience");
        assert_eq!(settings.leeway_seconds, 5);

        // Clean up
        env::remove_var("JWT_PRIVATE_KEY_PEM");
        env::remove_var("JWT_PUBLIC_KEY_PEM");
        env::remove_var("JWT_ISSUER");
        env::remove_var("JWT_AUDIENCE");
        env::remove_var("JWT_LEEWAY_SECONDS");
    }

    #[test]
    #[serial]
    fn test_jwt_settings_require_keys() {
        env::remove_var("JWT_PRIVATE_KEY_PEM");
        env::remove_var("JWT_PUBLIC_KEY_PEM");

        assert!(JwtSettings::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_mfa_settings_from_env() {
        env::set_var("MFA_ALWAYS_REQUIRED", "true");
        env::set_var("MFA_SESSION_TTL_SECONDS", "120");

        let settings = MfaSettings::from_env().unwrap();

        assert!(settings.always_required);
        assert_eq!(settings.session_ttl_seconds, 120);
        assert_eq!(settings.max_failed_attempts, 5); // Default

        env::remove_var("MFA_ALWAYS_REQUIRED");
        env::remove_var("MFA_SESSION_TTL_SECONDS");
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_reported() {
        env::set_var("ACCESS_TOKEN_TTL_SECONDS", "one hour");

        let err = TokenSettings::from_env().unwrap_err();
        assert!(err.to_string().contains("ACCESS_TOKEN_TTL_SECONDS"));

        env::remove_var("ACCESS_TOKEN_TTL_SECONDS");
    }

    #[test]
    #[serial]
    fn test_zero_or_negative_values_rejected() {
        env::set_var("REVOCATION_SWEEP_INTERVAL_SECONDS", "0");
        let err = TokenSettings::from_env().unwrap_err();
        assert!(err.to_string().contains("REVOCATION_SWEEP_INTERVAL_SECONDS"));
        env::remove_var("REVOCATION_SWEEP_INTERVAL_SECONDS");

        env::set_var("ACCESS_TOKEN_TTL_SECONDS", "-60");
        assert!(TokenSettings::from_env().is_err());
        env::remove_var("ACCESS_TOKEN_TTL_SECONDS");

        for key in ["MFA_SESSION_TTL_SECONDS", "MFA_LOCKOUT_SECONDS"] {
            env::set_var(key, "-1");
            let err = MfaSettings::from_env().unwrap_err();
            assert!(err.to_string().contains(key));
            env::remove_var(key);
        }

        env::set_var("PROVIDER_CALL_TIMEOUT_SECONDS", "0");
        assert!(ProviderSettings::from_env().is_err());
        env::remove_var("PROVIDER_CALL_TIMEOUT_SECONDS");

        // Defaults all pass
        assert!(TokenSettings::from_env().is_ok());
        assert!(MfaSettings::from_env().is_ok());
    }

    #[test]
    fn test_defaults() {
        let tokens = TokenSettings::default();
        assert!(tokens.refresh_token_ttl_seconds > tokens.access_token_ttl_seconds);
        assert_eq!(ProviderSettings::default().call_timeout(), Duration::from_secs(10));
        assert_eq!(MfaSettings::default().session_ttl_seconds, 300);
    }
}
