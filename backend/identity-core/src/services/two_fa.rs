/// Two-factor authentication verifier (TOTP)
use crate::config::MfaSettings;
use crate::models::{MfaSetup, MfaVerification};
use crate::security::TOTPGenerator;
use crate::services::MfaVerifier;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct Enrollment {
    secret: String,
    /// SHA-256 of each unused backup code
    backup_code_hashes: Vec<String>,
    /// Time step of the last accepted TOTP code; that step and older are spent
    last_used_step: Option<u64>,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

/// Built-in `MfaVerifier`: TOTP codes accepted once per time step, single-use
/// backup codes, and a failed-attempt lockout
pub struct TotpVerifier {
    issuer: String,
    max_failed_attempts: u32,
    lockout: Duration,
    enrollments: DashMap<String, Enrollment>,
}

impl TotpVerifier {
    pub fn new(settings: &MfaSettings) -> Self {
        Self {
            issuer: settings.totp_issuer.clone(),
            max_failed_attempts: settings.max_failed_attempts.max(1),
            lockout: Duration::seconds(settings.lockout_seconds),
            enrollments: DashMap::new(),
        }
    }

    /// Unused backup codes left for a subject
    pub fn remaining_backup_codes(&self, subject_id: &str) -> usize {
        self.enrollments
            .get(subject_id)
            .map(|enrollment| enrollment.backup_code_hashes.len())
            .unwrap_or(0)
    }

    fn hash_backup_code(code: &str) -> String {
        crypto_core::sha256_hex(code.trim().as_bytes())
    }
}

/// Remove `code` from the unused set if present
fn consume_backup_code(enrollment: &mut Enrollment, code: &str) -> bool {
    let hashed = TotpVerifier::hash_backup_code(code);
    let position = enrollment
        .backup_code_hashes
        .iter()
        .position(|stored| bool::from(stored.as_bytes().ct_eq(hashed.as_bytes())));
    match position {
        Some(index) => {
            enrollment.backup_code_hashes.swap_remove(index);
            true
        }
        None => false,
    }
}

#[async_trait]
impl MfaVerifier for TotpVerifier {
    async fn is_enabled(&self, subject_id: &str) -> anyhow::Result<bool> {
        Ok(self.enrollments.contains_key(subject_id))
    }

    /// Begin TOTP enrollment for a user
    ///
    /// ## Workflow
    ///
    /// 1. Generate TOTP secret
    /// 2. Create provisioning URI for QR code
    /// 3. Generate backup codes, keep only their hashes
    /// 4. Return secret + URI + plaintext codes once
    async fn setup(
        &self,
        subject_id: &str,
        display_name: Option<String>,
    ) -> anyhow::Result<MfaSetup> {
        let account = display_name.unwrap_or_else(|| subject_id.to_string());
        let (secret, provisioning_uri) =
            TOTPGenerator::generate_secret_and_uri(&self.issuer, &account)?;
        let backup_codes = TOTPGenerator::generate_backup_codes();

        self.enrollments.insert(
            subject_id.to_string(),
            Enrollment {
                secret: secret.clone(),
                backup_code_hashes: backup_codes
                    .iter()
                    .map(|code| Self::hash_backup_code(code))
                    .collect(),
                last_used_step: None,
                failed_attempts: 0,
                locked_until: None,
            },
        );
        info!(subject_id = %subject_id, "TOTP enrolled");

        Ok(MfaSetup {
            secret,
            provisioning_uri,
            backup_codes,
        })
    }

    async fn verify(&self, subject_id: &str, code: &str) -> anyhow::Result<MfaVerification> {
        let Some(mut enrollment) = self.enrollments.get_mut(subject_id) else {
            return Ok(MfaVerification::rejected());
        };

        let now = Utc::now();
        if let Some(locked_until) = enrollment.locked_until {
            if locked_until > now {
                return Ok(MfaVerification::locked_out());
            }
            enrollment.locked_until = None;
        }

        let totp_valid = match TOTPGenerator::matching_step(&enrollment.secret, code)? {
            Some(step) if enrollment.last_used_step.map_or(true, |used| step > used) => {
                enrollment.last_used_step = Some(step);
                true
            }
            Some(_) => {
                warn!(subject_id = %subject_id, "Replayed TOTP code refused");
                false
            }
            None => false,
        };
        let valid = totp_valid || consume_backup_code(&mut enrollment, code);

        if valid {
            enrollment.failed_attempts = 0;
            return Ok(MfaVerification::accepted());
        }

        enrollment.failed_attempts += 1;
        if enrollment.failed_attempts >= self.max_failed_attempts {
            enrollment.failed_attempts = 0;
            enrollment.locked_until = Some(now + self.lockout);
            warn!(
                subject_id = %subject_id,
                lockout_seconds = self.lockout.num_seconds(),
                "Too many failed TOTP attempts, locking out"
            );
            return Ok(MfaVerification::locked_out());
        }

        Ok(MfaVerification::rejected())
    }

    async fn disable(&self, subject_id: &str) -> anyhow::Result<bool> {
        let removed = self.enrollments.remove(subject_id).is_some();
        if removed {
            info!(subject_id = %subject_id, "TOTP disabled");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(max_failed_attempts: u32) -> TotpVerifier {
        TotpVerifier::new(&MfaSettings {
            max_failed_attempts,
            ..MfaSettings::default()
        })
    }

    #[tokio::test]
    async fn test_setup_enables_and_current_code_verifies() {
        let verifier = verifier(5);
        assert!(!verifier.is_enabled("u1").await.unwrap());

        let setup = verifier.setup("u1", Some("alice".to_string())).await.unwrap();
        assert!(setup.provisioning_uri.contains("Nova:alice"));
        assert_eq!(setup.backup_codes.len(), 8);
        assert!(verifier.is_enabled("u1").await.unwrap());

        let code = TOTPGenerator::current_code(&setup.secret).unwrap();
        assert!(verifier.verify("u1", &code).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_totp_code_is_single_use() {
        let verifier = verifier(5);
        let setup = verifier.setup("u1", None).await.unwrap();
        let code = TOTPGenerator::current_code(&setup.secret).unwrap();

        assert!(verifier.verify("u1", &code).await.unwrap().success);
        assert_eq!(
            verifier.verify("u1", &code).await.unwrap(),
            MfaVerification::rejected()
        );

        // Backup codes still work after a TOTP code was spent
        assert!(verifier.verify("u1", &setup.backup_codes[0]).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_backup_code_is_single_use() {
        let verifier = verifier(5);
        let setup = verifier.setup("u1", None).await.unwrap();
        let backup = setup.backup_codes[0].clone();

        assert!(verifier.verify("u1", &backup).await.unwrap().success);
        assert_eq!(verifier.remaining_backup_codes("u1"), 7);
        assert!(!verifier.verify("u1", &backup).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_lockout_after_max_failures() {
        let verifier = verifier(3);
        let setup = verifier.setup("u1", None).await.unwrap();

        // Non-numeric codes never match a TOTP or backup code
        assert_eq!(
            verifier.verify("u1", "bad").await.unwrap(),
            MfaVerification::rejected()
        );
        assert_eq!(
            verifier.verify("u1", "bad").await.unwrap(),
            MfaVerification::rejected()
        );
        assert_eq!(
            verifier.verify("u1", "bad").await.unwrap(),
            MfaVerification::locked_out()
        );

        // Even the right code is refused while locked
        let code = TOTPGenerator::current_code(&setup.secret).unwrap();
        assert!(verifier.verify("u1", &code).await.unwrap().is_locked_out);
    }

    #[tokio::test]
    async fn test_unknown_subject_is_rejected() {
        let verifier = verifier(5);
        assert_eq!(
            verifier.verify("nobody", "123456").await.unwrap(),
            MfaVerification::rejected()
        );
        assert!(!verifier.disable("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_disable_removes_enrollment() {
        let verifier = verifier(5);
        verifier.setup("u1", None).await.unwrap();
        assert!(verifier.disable("u1").await.unwrap());
        assert!(!verifier.is_enabled("u1").await.unwrap());
    }
}
