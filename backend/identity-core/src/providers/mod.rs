/// Pluggable authentication backends
///
/// A `Connector` verifies credentials against one directory or federation
/// (LDAP, OIDC, an in-memory directory, ...). Connectors are registered once
/// with a `ProviderSelector` and looked up by their stable name.
use crate::error::{IdentityError, Result};
use crate::models::{AuthenticationOutcome, UserInfo};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub mod directory;

pub use directory::{DirectoryAccount, StaticDirectoryConnector};

/// Capability consumed from each authentication backend
///
/// Expected failures (bad password, locked account, ...) come back as
/// `AuthenticationOutcome::Failure`. An `Err` means the backend itself broke;
/// the orchestrator reports those as `Unknown` with the message preserved.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable provider identifier, e.g. "LDAP" or "OIDC"
    fn name(&self) -> &str;

    async fn authenticate(&self, username: &str, password: &str)
        -> anyhow::Result<AuthenticationOutcome>;

    async fn get_user_info(&self, subject_id: &str) -> anyhow::Result<Option<UserInfo>>;

    async fn get_groups(&self, subject_id: &str) -> anyhow::Result<Vec<String>>;

    /// `Ok(false)` when the current password does not match
    async fn change_password(
        &self,
        subject_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> anyhow::Result<bool>;
}

/// Registered connectors in registration order
pub struct ProviderSelector {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ProviderSelector {
    /// Fails on duplicate names (compared case-insensitively)
    pub fn new(connectors: Vec<Arc<dyn Connector>>) -> Result<Self> {
        for (i, connector) in connectors.iter().enumerate() {
            let duplicate = connectors[..i]
                .iter()
                .any(|earlier| earlier.name().eq_ignore_ascii_case(connector.name()));
            if duplicate {
                return Err(IdentityError::Configuration(format!(
                    "connector '{}' registered twice",
                    connector.name()
                )));
            }
        }
        Ok(Self { connectors })
    }

    /// Connector named `name`, or the first registered one when `name` is absent
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn Connector>> {
        let found = match name {
            None => self.connectors.first(),
            Some(name) => self
                .connectors
                .iter()
                .find(|connector| connector.name().eq_ignore_ascii_case(name)),
        };

        match found {
            Some(connector) => {
                debug!(provider = %connector.name(), "Resolved connector");
                Ok(Arc::clone(connector))
            }
            None => match name {
                Some(name) => Err(IdentityError::UnknownProvider(name.to_string())),
                None => Err(IdentityError::Configuration(
                    "no connectors registered".to_string(),
                )),
            },
        }
    }

    /// Provider names in registration order
    pub fn names(&self) -> Vec<String> {
        self.connectors
            .iter()
            .map(|connector| connector.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}
