use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Generate an opaque random secret of `num_bytes` bytes, base64url encoded without padding
///
/// The value carries no structure; callers persist only its hash.
pub fn generate_secret(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_length_and_alphabet() {
        let secret = generate_secret(32);
        // 32 bytes -> 43 base64url characters without padding
        assert_eq!(secret.len(), 43);
        assert!(secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_secret_randomness() {
        let s1 = generate_secret(32);
        let s2 = generate_secret(32);
        assert_ne!(s1, s2, "secrets should be random");
    }
}
