//! Test fixtures for identity-core integration tests
//! Provides orchestrator setup and scripted connectors
#![allow(dead_code)]

use async_trait::async_trait;
use crypto_core::test_utils::{TEST_AUDIENCE, TEST_ISSUER, TEST_PRIVATE_KEY, TEST_PUBLIC_KEY};
use identity_core::config::{JwtSettings, Settings};
use identity_core::models::{AuthenticationOutcome, UserInfo};
use identity_core::providers::{DirectoryAccount, StaticDirectoryConnector};
use identity_core::services::TotpVerifier;
use identity_core::{Connector, IdentityOrchestrator, ProviderSelector};
use std::sync::Arc;
use std::time::Duration;

// ============================================
// Logging
// ============================================

/// Route the audit log to the test output; filter with RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================
// Settings
// ============================================

pub fn test_settings() -> Settings {
    Settings::with_jwt(JwtSettings {
        private_key_pem: TEST_PRIVATE_KEY.to_string(),
        public_key_pem: TEST_PUBLIC_KEY.to_string(),
        issuer: TEST_ISSUER.to_string(),
        audience: TEST_AUDIENCE.to_string(),
        leeway_seconds: 30,
    })
}

// ============================================
// Directory
// ============================================

/// alice/secret -> u1, plus a second staff member
pub fn test_directory() -> Arc<StaticDirectoryConnector> {
    Arc::new(
        StaticDirectoryConnector::new()
            .with_account(
                DirectoryAccount::new("u1", "alice", "secret")
                    .expect("hash fixture password")
                    .with_display_name("Alice")
                    .with_email("alice@example.com")
                    .with_roles(["admin"])
                    .with_groups(["staff"])
                    .with_claim("department", "sales"),
            )
            .with_account(
                DirectoryAccount::new("u2", "bob", "hunter2")
                    .expect("hash fixture password")
                    .with_roles(["viewer"]),
            ),
    )
}

pub struct Harness {
    pub orchestrator: Arc<IdentityOrchestrator>,
    pub directory: Arc<StaticDirectoryConnector>,
}

pub fn harness_with(settings: Settings, extra: Vec<Arc<dyn Connector>>) -> Harness {
    init_tracing();
    let directory = test_directory();
    let mut connectors: Vec<Arc<dyn Connector>> = vec![directory.clone() as Arc<dyn Connector>];
    connectors.extend(extra);

    let selector = ProviderSelector::new(connectors).expect("unique connector names");
    let verifier = Arc::new(TotpVerifier::new(&settings.mfa));
    let orchestrator = IdentityOrchestrator::new(&settings, selector, verifier)
        .expect("fixture keys must parse");

    Harness {
        orchestrator: Arc::new(orchestrator),
        directory,
    }
}

pub fn harness() -> Harness {
    harness_with(test_settings(), Vec::new())
}

pub fn access_token(outcome: &AuthenticationOutcome) -> String {
    outcome
        .success()
        .and_then(|success| success.access_token.clone())
        .expect("outcome should carry an access token")
}

pub fn refresh_token(outcome: &AuthenticationOutcome) -> String {
    outcome
        .success()
        .and_then(|success| success.refresh_token.clone())
        .expect("outcome should carry a refresh token")
}

// ============================================
// Scripted connectors
// ============================================

/// Connector whose every call fails with a backend fault
pub struct FailingConnector;

#[async_trait]
impl Connector for FailingConnector {
    fn name(&self) -> &str {
        "BROKEN"
    }

    async fn authenticate(&self, _: &str, _: &str) -> anyhow::Result<AuthenticationOutcome> {
        anyhow::bail!("ldap bind exploded")
    }

    async fn get_user_info(&self, _: &str) -> anyhow::Result<Option<UserInfo>> {
        anyhow::bail!("ldap bind exploded")
    }

    async fn get_groups(&self, _: &str) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("ldap bind exploded")
    }

    async fn change_password(&self, _: &str, _: &str, _: &str) -> anyhow::Result<bool> {
        anyhow::bail!("ldap bind exploded")
    }
}

/// Connector that answers only after `delay`
pub struct SlowConnector {
    pub delay: Duration,
}

#[async_trait]
impl Connector for SlowConnector {
    fn name(&self) -> &str {
        "SLOW"
    }

    async fn authenticate(
        &self,
        username: &str,
        _: &str,
    ) -> anyhow::Result<AuthenticationOutcome> {
        tokio::time::sleep(self.delay).await;
        Ok(AuthenticationOutcome::authenticated(
            identity_core::AuthenticatedIdentity::new("slow-1", username),
        ))
    }

    async fn get_user_info(&self, _: &str) -> anyhow::Result<Option<UserInfo>> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn get_groups(&self, _: &str) -> anyhow::Result<Vec<String>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn change_password(&self, _: &str, _: &str, _: &str) -> anyhow::Result<bool> {
        tokio::time::sleep(self.delay).await;
        Ok(false)
    }
}

/// Connector whose `get_user_info` parks until released
///
/// `entered` is signalled when a lookup starts waiting.
#[derive(Default)]
pub struct GatedConnector {
    pub entered: tokio::sync::Notify,
    pub release: tokio::sync::Notify,
}

#[async_trait]
impl Connector for GatedConnector {
    fn name(&self) -> &str {
        "GATED"
    }

    async fn authenticate(
        &self,
        username: &str,
        _: &str,
    ) -> anyhow::Result<AuthenticationOutcome> {
        Ok(AuthenticationOutcome::authenticated(
            identity_core::AuthenticatedIdentity::new("u9", username),
        ))
    }

    async fn get_user_info(&self, subject_id: &str) -> anyhow::Result<Option<UserInfo>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Some(UserInfo {
            subject_id: subject_id.to_string(),
            username: "ivy".to_string(),
            display_name: None,
            email: None,
            roles: Vec::new(),
            claims: Vec::new(),
            enabled: true,
        }))
    }

    async fn get_groups(&self, _: &str) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn change_password(&self, _: &str, _: &str, _: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}
