/// Password hashing and verification using Argon2id
use crate::error::{IdentityError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use zxcvbn::zxcvbn;

/// Hash a password using Argon2id algorithm
///
/// ## Security
///
/// - Algorithm: Argon2id (default configuration)
/// - Salt: Random 16-byte salt generated per password
///
/// Strength is not checked here: directory accounts may be provisioned with
/// whatever the upstream directory accepted. New passwords chosen by a user go
/// through `validate_password_strength` first.
///
/// ## Returns
///
/// PHC-formatted hash string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| IdentityError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its hash
///
/// ## Security
///
/// - Uses constant-time comparison to prevent timing attacks
/// - Supports Argon2id PHC format
///
/// ## Arguments
///
/// * `password` - Plaintext password to verify
/// * `password_hash` - PHC-formatted hash
///
/// ## Returns
///
/// `true` if password matches hash, `false` otherwise
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| IdentityError::Internal(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(IdentityError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Validate password strength using composition rules and zxcvbn
///
/// ## Requirements
///
/// - Minimum 8 characters
/// - At least one uppercase letter
/// - At least one lowercase letter
/// - At least one digit
/// - At least one special character
/// - zxcvbn entropy score >= 3 (strong)
///
/// ## Arguments
///
/// * `password` - Password to validate
///
/// ## Errors
///
/// Returns `IdentityError::WeakPassword` with specific failure reason
pub fn validate_password_strength(password: &str) -> Result<()> {
    // Length check
    if password.len() < 8 {
        return Err(IdentityError::WeakPassword(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    // Composition checks
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !has_uppercase {
        return Err(IdentityError::WeakPassword(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }

    if !has_lowercase {
        return Err(IdentityError::WeakPassword(
            "Password must contain at least one lowercase letter".to_string(),
        ));
    }

    if !has_digit {
        return Err(IdentityError::WeakPassword(
            "Password must contain at least one digit".to_string(),
        ));
    }

    if !has_special {
        return Err(IdentityError::WeakPassword(
            "Password must contain at least one special character".to_string(),
        ));
    }

    // Entropy check using zxcvbn
    let entropy = zxcvbn(password, &[]).map_err(|e| {
        IdentityError::Internal(format!("Password entropy calculation failed: {}", e))
    })?;

    if entropy.score() < 3 {
        return Err(IdentityError::WeakPassword(
            "Password is too weak. Please use a stronger password with higher entropy.".to_string(),
        ));
    }

    Ok(())
}
