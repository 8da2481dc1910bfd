//! Token signing for the Heidi clinical API.
//!
//! Heidi authenticates with a locally minted HS256 token rather than one
//! issued by the remote service. Every call site shares this single signer.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime in seconds.
const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to serialize token claims: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("Failed to initialize signing key")]
    Key,
}

/// Mint a bearer token for the Heidi API.
///
/// The API key travels as the `sub` claim; the token expires one hour after
/// issue.
pub fn mint(api_key: &str, secret: &str) -> Result<String, JwtError> {
    mint_at(api_key, secret, chrono::Utc::now().timestamp())
}

/// Sign with an explicit issue time.
fn mint_at(api_key: &str, secret: &str, issued_at: i64) -> Result<String, JwtError> {
    let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
    let payload = serde_json::json!({
        "sub": api_key,
        "iat": issued_at,
        "exp": issued_at + TOKEN_TTL_SECS,
    });

    let encoded_header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let encoded_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?);
    let signing_input = format!("{}.{}", encoded_header, encoded_payload);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| JwtError::Key)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}
