/// Access-token codec for Nova identity components
///
/// Access tokens are RS256-signed JWTs. The codec is an owned value built from
/// a PEM key pair, so several independent issuers (one per orchestrator, one per
/// test) can coexist in a process.
///
/// ## Security Design
///
/// - **RS256 ONLY**: No symmetric algorithms (HS256) to prevent confusion attacks
/// - **Strict validation**: signature, `iss`, `aud`, `exp` and `sub` are all required
/// - **Bounded clock skew**: configurable leeway applied to `exp`
///
/// ## Usage
///
/// ```rust,ignore
/// use crypto_core::jwt::JwtCodec;
///
/// let codec = JwtCodec::from_rsa_pem(&private_pem, &public_pem, "https://id.example", "api", 30)?;
/// let token = codec.encode(&claims)?;
/// let data = codec.decode(&token)?;
/// ```
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, Algorithm, DecodingKey, EncodingKey, Header,
    TokenData, Validation,
};
use serde::{Deserialize, Serialize};

/// JWT algorithm - MUST be RS256 for all Nova services
pub const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

// ============================================================================
// Data Structures
// ============================================================================

/// A single named fact embedded in a token (e.g. `department = sales`)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClaimEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// JWT Claims structure - standard claims plus identity fields
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Subject (provider-scoped user identifier)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID, unique per issuance. Revocation is keyed on its hash.
    pub jti: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claims: Vec<ClaimEntry>,
}

/// Fields read from a token payload without checking its signature
///
/// Only suitable for cheap lookups (revocation), never for trust decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedClaims {
    pub jti: String,
}

// ============================================================================
// Codec
// ============================================================================

/// RS256 signer/verifier bound to one issuer and audience
#[derive(Clone)]
pub struct JwtCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    /// Same checks as `validation` minus `exp`
    lenient_validation: Validation,
    issuer: String,
    audience: String,
}

impl JwtCodec {
    /// Build a codec from PEM-formatted RSA keys
    ///
    /// ## Errors
    ///
    /// Returns error if either PEM is malformed or not an RSA key.
    pub fn from_rsa_pem(
        private_key_pem: &str,
        public_key_pem: &str,
        issuer: &str,
        audience: &str,
        leeway_secs: u64,
    ) -> Result<Self> {
        let encoding = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| anyhow!("Failed to parse RSA private key: {e}"))?;
        let decoding = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| anyhow!("Failed to parse RSA public key: {e}"))?;

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = leeway_secs;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let mut lenient_validation = validation.clone();
        lenient_validation.validate_exp = false;

        Ok(Self {
            encoding,
            decoding,
            validation,
            lenient_validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Clock skew tolerated past `exp`, in seconds
    pub fn leeway(&self) -> u64 {
        self.validation.leeway
    }

    /// Sign claims into a compact JWT
    pub fn encode(&self, claims: &AccessClaims) -> Result<String> {
        encode(&Header::new(JWT_ALGORITHM), claims, &self.encoding)
            .map_err(|e| anyhow!("Failed to generate access token: {e}"))
    }

    /// Validate and decode a JWT token
    ///
    /// The raw `jsonwebtoken` error is returned so callers can tell an expired
    /// token apart from a forged or malformed one.
    pub fn decode(&self, token: &str) -> std::result::Result<TokenData<AccessClaims>, JwtError> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation)
    }

    /// Verify signature, issuer and audience but accept an expired token
    ///
    /// For callers that only need a trustworthy `exp` (revocation).
    pub fn decode_ignoring_expiry(
        &self,
        token: &str,
    ) -> std::result::Result<TokenData<AccessClaims>, JwtError> {
        decode::<AccessClaims>(token, &self.decoding, &self.lenient_validation)
    }
}

/// Extract `jti` from a JWT without validating it
///
/// Parses only the payload section.
pub fn peek_unverified(token: &str) -> Result<UnverifiedClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(anyhow!("Invalid JWT format"));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .context("Failed to decode JWT payload")?;

    let claims: serde_json::Value =
        serde_json::from_slice(&payload).context("Failed to parse JWT claims")?;

    let jti = claims
        .get("jti")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Missing jti in token"))?;

    Ok(UnverifiedClaims { jti })
}

// ============================================================================
// Tests
// ============================================================================
