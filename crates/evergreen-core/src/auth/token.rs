//! Signed session tokens.
//!
//! A token is `base64(json payload) . base64(hmac-sha256 tag)`, signed
//! with the per-device secret. Verification is constant-time via the
//! hmac crate.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Payload carried by a signed session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            issued_at: Utc::now(),
        }
    }
}

/// Serialize and sign a token with the given secret.
pub fn sign(secret: &[u8], token: &SessionToken) -> Result<String, AuthError> {
    let payload =
        serde_json::to_vec(token).map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
    mac.update(&payload);
    let tag = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&payload),
        URL_SAFE_NO_PAD.encode(tag)
    ))
}

/// Verify a raw token string and return its payload.
pub fn verify(secret: &[u8], raw: &str) -> Result<SessionToken, AuthError> {
    let (payload_b64, tag_b64) = raw
        .split_once('.')
        .ok_or_else(|| AuthError::TokenInvalid("missing signature".to_string()))?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
    let tag = URL_SAFE_NO_PAD
        .decode(tag_b64)
        .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
    mac.update(&payload);
    mac.verify_slice(&tag)
        .map_err(|_| AuthError::TokenInvalid("signature mismatch".to_string()))?;

    serde_json::from_slice(&payload).map_err(|e| AuthError::TokenInvalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-device-secret-0123456789abc";

    #[test]
    fn sign_verify_roundtrip() {
        let token = SessionToken::new("user-42");
        let raw = sign(SECRET, &token).unwrap();
        let back = verify(SECRET, &raw).unwrap();
        assert_eq!(back.user_id, "user-42");
        assert_eq!(back.issued_at, token.issued_at);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let raw = sign(SECRET, &SessionToken::new("user-42")).unwrap();
        assert!(verify(b"another-secret", &raw).is_err());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let raw = sign(SECRET, &SessionToken::new("user-42")).unwrap();
        let (payload_b64, tag_b64) = raw.split_once('.').unwrap();

        let mut payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        let json = String::from_utf8(payload.clone()).unwrap();
        payload = json.replace("user-42", "user-43").into_bytes();

        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), tag_b64);
        let err = verify(SECRET, &forged).expect_err("forged token must fail");
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify(SECRET, "").is_err());
        assert!(verify(SECRET, "no-dot-here").is_err());
        assert!(verify(SECRET, "abc.def").is_err());
    }
}
