//! Token validation at the WebSocket boundary.
//!
//! Session issuance is an external collaborator's job; this module only
//! verifies that the token presented in the first `auth` frame belongs to
//! the claimed user. The `TokenVerifier` trait is the seam: the binary wires
//! in the HMAC-JWT implementation, tests may substitute their own.

use std::path::Path;

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

/// Validates a bearer token and returns the subject user ID.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<String, TokenError>;
}

/// JWT claims shared with the external auth collaborator.
/// sub is the opaque user ID this core routes by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 JWT validation against a shared signing secret.
pub struct JwtVerifier {
    secret: Vec<u8>,
}

impl JwtVerifier {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String, TokenError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;
        Ok(data.claims.sub)
    }
}

/// Load or generate the JWT verification key (256-bit random secret).
/// Key is stored as raw bytes in data_dir/jwt_secret and shared with the
/// auth collaborator that issues tokens.
pub fn load_or_generate_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let key_path = Path::new(data_dir).join("jwt_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("JWT verification key loaded from {}", key_path.display());
            return Ok(key);
        }
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("JWT verification key generated at {}", key_path.display());
    Ok(key.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn issue(secret: &[u8], sub: &str, ttl: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            iat: now,
            exp: now + ttl,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn valid_token_yields_subject() {
        let secret = vec![7u8; 32];
        let verifier = JwtVerifier::new(secret.clone());
        let token = issue(&secret, "u-1", 900);
        assert_eq!(verifier.verify(&token).unwrap(), "u-1");
    }

    #[test]
    fn expired_token_is_rejected() {
        let secret = vec![7u8; 32];
        let verifier = JwtVerifier::new(secret.clone());
        let token = issue(&secret, "u-1", -3600);
        assert!(matches!(verifier.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = JwtVerifier::new(vec![7u8; 32]);
        let token = issue(&[9u8; 32], "u-1", 900);
        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid)));
    }
}
