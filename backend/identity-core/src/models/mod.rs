/// Data models for identity and authentication
pub mod outcome;
pub mod session;
pub mod token_revocation;
pub mod user;

pub use outcome::{
    AuthErrorKind, AuthSuccess, AuthenticatedIdentity, AuthenticationOutcome, Claim, IssuedTokens,
};
pub use session::{MfaSession, RefreshTokenRecord};
pub use token_revocation::RevocationEntry;
pub use user::{MfaSetup, MfaVerification, UserInfo};
