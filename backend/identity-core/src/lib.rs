/// Identity Core Library
///
/// Orchestrates credential verification against pluggable providers, step-up
/// MFA, and the bearer-token lifecycle (issuance, refresh rotation, revocation).
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `error`: Error types and the public failure taxonomy
/// - `models`: Outcomes, sessions, refresh records, user info
/// - `providers`: Connector capability, provider selection, in-memory directory
/// - `security`: Token issuance, revocation registry, password hashing, TOTP
/// - `services`: MFA orchestration, TOTP verifier, identity facade, sweeper
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod security;
pub mod services;

mod state;

// Re-export commonly used types
pub use config::Settings;
pub use error::{IdentityError, Result};
pub use models::{AuthErrorKind, AuthenticatedIdentity, AuthenticationOutcome, Claim};
pub use providers::{Connector, ProviderSelector};
pub use services::{IdentityOrchestrator, MfaVerifier};
