/// In-memory directory connector
///
/// Accounts live in process memory with Argon2id password hashes. Used for
/// local/test deployments and as the reference connector implementation.
use crate::models::{AuthErrorKind, AuthenticatedIdentity, AuthenticationOutcome, Claim, UserInfo};
use crate::providers::Connector;
use crate::security::{hash_password, verify_password};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

pub const LOCAL_PROVIDER: &str = "LOCAL";

/// A directory entry
#[derive(Debug, Clone)]
pub struct DirectoryAccount {
    pub subject_id: String,
    pub username: String,
    password_hash: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub claims: Vec<Claim>,
    pub enabled: bool,
    pub locked: bool,
}

impl DirectoryAccount {
    pub fn new(
        subject_id: impl Into<String>,
        username: impl Into<String>,
        password: &str,
    ) -> crate::Result<Self> {
        Ok(Self {
            subject_id: subject_id.into(),
            username: username.into(),
            password_hash: hash_password(password)?,
            display_name: None,
            email: None,
            roles: Vec::new(),
            groups: Vec::new(),
            claims: Vec::new(),
            enabled: true,
            locked: false,
        })
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_claim(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push(Claim {
            kind: kind.into(),
            value: value.into(),
        });
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    fn identity(&self) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            subject_id: self.subject_id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
            groups: self.groups.clone(),
            claims: self.claims.clone(),
        }
    }

    fn user_info(&self) -> UserInfo {
        UserInfo {
            subject_id: self.subject_id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
            claims: self.claims.clone(),
            enabled: self.enabled,
        }
    }
}

/// Connector over a fixed in-memory set of accounts
pub struct StaticDirectoryConnector {
    name: String,
    // keyed by lowercased username
    accounts: DashMap<String, DirectoryAccount>,
}

impl StaticDirectoryConnector {
    pub fn new() -> Self {
        Self::named(LOCAL_PROVIDER)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accounts: DashMap::new(),
        }
    }

    pub fn with_account(self, account: DirectoryAccount) -> Self {
        self.add_account(account);
        self
    }

    /// Insert or replace an account
    pub fn add_account(&self, account: DirectoryAccount) {
        debug!(provider = %self.name, subject_id = %account.subject_id, "Directory account added");
        self.accounts
            .insert(account.username.to_lowercase(), account);
    }

    /// Update a stored account in place; `false` if the subject is unknown
    pub fn update_account<F>(&self, subject_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut DirectoryAccount),
    {
        match self
            .accounts
            .iter_mut()
            .find(|entry| entry.subject_id == subject_id)
        {
            Some(mut entry) => {
                update(entry.value_mut());
                true
            }
            None => false,
        }
    }

    fn find_by_subject(&self, subject_id: &str) -> Option<DirectoryAccount> {
        self.accounts
            .iter()
            .find(|entry| entry.subject_id == subject_id)
            .map(|entry| entry.value().clone())
    }
}

impl Default for StaticDirectoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for StaticDirectoryConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> anyhow::Result<AuthenticationOutcome> {
        let Some(account) = self
            .accounts
            .get(&username.to_lowercase())
            .map(|entry| entry.value().clone())
        else {
            return Ok(AuthenticationOutcome::failure(
                AuthErrorKind::UserNotFound,
                "User not found",
            ));
        };

        // Status is only revealed to callers who know the password
        if !verify_password(password, &account.password_hash)? {
            info!(provider = %self.name, subject_id = %account.subject_id, "Directory bind rejected");
            return Ok(AuthenticationOutcome::failure(
                AuthErrorKind::InvalidCredentials,
                "Invalid credentials",
            ));
        }
        if !account.enabled {
            return Ok(AuthenticationOutcome::failure(
                AuthErrorKind::UserDisabled,
                "Account disabled",
            ));
        }
        if account.locked {
            return Ok(AuthenticationOutcome::failure(
                AuthErrorKind::UserLocked,
                "Account locked",
            ));
        }

        Ok(AuthenticationOutcome::authenticated(account.identity()))
    }

    async fn get_user_info(&self, subject_id: &str) -> anyhow::Result<Option<UserInfo>> {
        Ok(self
            .find_by_subject(subject_id)
            .map(|account| account.user_info()))
    }

    async fn get_groups(&self, subject_id: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .find_by_subject(subject_id)
            .map(|account| account.groups)
            .unwrap_or_default())
    }

    async fn change_password(
        &self,
        subject_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> anyhow::Result<bool> {
        let Some(account) = self.find_by_subject(subject_id) else {
            return Ok(false);
        };
        if !verify_password(current_password, &account.password_hash)? {
            return Ok(false);
        }

        let new_hash = hash_password(new_password)?;
        Ok(self.update_account(subject_id, |account| {
            account.password_hash = new_hash;
        }))
    }
}
