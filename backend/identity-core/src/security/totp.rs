/// Two-Factor Authentication (2FA) using TOTP (Time-based One-Time Password)
use crate::error::{IdentityError, Result};
use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use rand::Rng;
use subtle::ConstantTimeEq;
use totp_lite::{totp_custom, Sha1};

const TIME_STEP_SECS: u64 = 30;
const CODE_DIGITS: u32 = 6;
const SECRET_BYTES: usize = 20;
/// Adjacent time steps accepted on either side of the current one (clock drift)
const SKEW_STEPS: u64 = 1;
const BACKUP_CODE_COUNT: usize = 8;
const BACKUP_CODE_DIGITS: usize = 8;

pub struct TOTPGenerator;

impl TOTPGenerator {
    /// Generate a new TOTP secret and provisioning URI for QR code
    ///
    /// ## Returns
    ///
    /// Tuple of (base64-encoded secret, otpauth URI for QR code generation)
    ///
    /// ## Arguments
    ///
    /// * `issuer` - Service name shown in the authenticator app
    /// * `account` - Account label (display name or subject id)
    pub fn generate_secret_and_uri(issuer: &str, account: &str) -> Result<(String, String)> {
        let mut rng = rand::thread_rng();
        let mut secret_bytes = [0u8; SECRET_BYTES];
        rng.fill(&mut secret_bytes);

        let secret = base64_engine.encode(secret_bytes);

        // Format: otpauth://totp/Issuer:Account?secret=SECRET&issuer=Issuer
        let uri = format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}&digits={}&period={}",
            urlencoding::encode(issuer),
            urlencoding::encode(account),
            urlencoding::encode(&secret),
            urlencoding::encode(issuer),
            CODE_DIGITS,
            TIME_STEP_SECS
        );

        Ok((secret, uri))
    }

    /// Verify a TOTP code against a stored secret
    ///
    /// ## Security
    ///
    /// - Time window: 30 seconds, one step of drift tolerated each way
    /// - Code format: 6 digits
    /// - Algorithm: TOTP-SHA1
    /// - Comparison is constant-time
    ///
    /// ## Returns
    ///
    /// `true` if code is valid for the current time window, `false` otherwise
    pub fn verify_code(secret: &str, code: &str) -> Result<bool> {
        Self::verify_code_at(secret, code, unix_now()?)
    }

    pub fn verify_code_at(secret: &str, code: &str, unix_secs: u64) -> Result<bool> {
        Ok(Self::matching_step_at(secret, code, unix_secs)?.is_some())
    }

    /// Time step (unix seconds / 30) the code belongs to, if it is valid now
    ///
    /// Callers that remember the last accepted step can refuse a replayed code.
    pub fn matching_step(secret: &str, code: &str) -> Result<Option<u64>> {
        Self::matching_step_at(secret, code, unix_now()?)
    }

    /// Latest step in the skew window whose code equals `code`
    pub fn matching_step_at(secret: &str, code: &str, unix_secs: u64) -> Result<Option<u64>> {
        if code.len() != CODE_DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(None);
        }

        let secret_bytes = decode_secret(secret)?;

        let first = unix_secs.saturating_sub(SKEW_STEPS * TIME_STEP_SECS);
        let last = unix_secs + SKEW_STEPS * TIME_STEP_SECS;
        let mut matched = None;
        let mut t = first;
        while t <= last {
            let expected = totp_custom::<Sha1>(TIME_STEP_SECS, CODE_DIGITS, &secret_bytes, t);
            if bool::from(expected.as_bytes().ct_eq(code.as_bytes())) {
                matched = Some(t / TIME_STEP_SECS);
            }
            t += TIME_STEP_SECS;
        }

        Ok(matched)
    }

    /// Code an authenticator app would display right now for `secret`
    pub fn current_code(secret: &str) -> Result<String> {
        let secret_bytes = decode_secret(secret)?;
        Ok(totp_custom::<Sha1>(
            TIME_STEP_SECS,
            CODE_DIGITS,
            &secret_bytes,
            unix_now()?,
        ))
    }

    /// Generate backup codes for account recovery
    ///
    /// ## Returns
    ///
    /// Vector of 8 backup codes, each 8 digits long
    ///
    /// ## Security Notes
    ///
    /// - Each code is single-use only
    /// - Store hashed versions only
    pub fn generate_backup_codes() -> Vec<String> {
        let mut rng = rand::thread_rng();
        (0..BACKUP_CODE_COUNT)
            .map(|_| {
                (0..BACKUP_CODE_DIGITS)
                    .map(|_| {
                        let idx = rng.gen_range(0..10);
                        (b'0' + idx as u8) as char
                    })
                    .collect()
            })
            .collect()
    }
}

fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    let secret_bytes = base64_engine
        .decode(secret)
        .map_err(|_| IdentityError::InvalidTwoFACode)?;

    if secret_bytes.len() != SECRET_BYTES {
        return Err(IdentityError::InvalidTwoFACode);
    }
    Ok(secret_bytes)
}

fn unix_now() -> Result<u64> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| IdentityError::Internal("system clock before unix epoch".to_string()))
}
