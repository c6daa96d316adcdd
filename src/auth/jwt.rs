use crate::core::errors::PayError;
use crate::core::models::user::Role;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Session lifetime for dashboard and API logins.
pub const DEFAULT_SESSION_SECS: u64 = 60 * 60;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // account id
    pub role: Role,  // checked again against the stored account on use
    pub iat: usize,  // issued at, unix seconds
    pub exp: usize,  // iat + session lifetime
}

/// Issues and checks HS256 session tokens for accounts.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_secs: u64,
}

impl JwtService {
    pub fn new(secret: String) -> Self {
        Self::with_session_secs(secret, DEFAULT_SESSION_SECS)
    }

    pub fn with_session_secs(secret: String, session_secs: u64) -> Self {
        JwtService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            session_secs,
        }
    }

    pub fn generate_token(&self, account_id: &str, role: Role) -> Result<String, PayError> {
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PayError::InternalServerError(format!("system clock before epoch: {}", e)))?
            .as_secs();
        self.sign(&Claims {
            sub: account_id.to_string(),
            role,
            iat: issued_at as usize,
            exp: (issued_at + self.session_secs) as usize,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, PayError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| PayError::InternalServerError(format!("could not sign session token: {}", e)))
    }

    /// Signature and expiry are both enforced.
    pub fn validate_token(&self, token: &str) -> Result<Claims, PayError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| PayError::InvalidToken(e.to_string()))
    }
}
