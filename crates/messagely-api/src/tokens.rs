use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use messagely_types::api::Claims;

use crate::error::ApiError;

/// Issues and verifies HS256 session tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        let claims = Claims {
            username: username.to_string(),
            iat: now,
            exp: now.saturating_add(usize::try_from(self.ttl.as_secs()).unwrap_or(usize::MAX)),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(e.into()))?;

        Ok(token)
    }

    /// Any failure (malformed, bad signature, expired) is `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                ApiError::Unauthorized
            })
    }
}
