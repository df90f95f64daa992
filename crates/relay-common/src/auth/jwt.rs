//! JWT utilities for the gateway handshake
//!
//! Provides token encoding, decoding, and validation using the `jsonwebtoken`
//! crate, and implements the `TokenVerifier` port so the gateway can consume
//! it without knowing about JWTs.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use relay_core::{DomainError, DomainResult, TokenVerifier, UserId};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Get the user ID carried in the subject
    ///
    /// # Errors
    /// Returns an error if the subject is not a numeric user id
    pub fn user_id(&self) -> Result<UserId, AppError> {
        self.sub
            .parse::<i64>()
            .map(UserId::new)
            .map_err(|_| AppError::InvalidToken)
    }

    /// Check if the token is expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// JWT service for encoding and decoding access tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry: i64,
}

impl JwtService {
    /// Create a new JWT service with the given secret and expiry (seconds)
    #[must_use]
    pub fn new(secret: &str, access_token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry,
        }
    }

    /// Encode an access token for a user
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn encode_token(&self, user_id: UserId) -> Result<String, AppError> {
        let now = Utc::now();

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to encode JWT")))
    }

    /// Decode and validate an access token
    ///
    /// # Errors
    /// Returns an error if the token is invalid or expired
    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::default();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            }
        })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl TokenVerifier for JwtService {
    async fn verify(&self, token: &str) -> DomainResult<UserId> {
        // Tolerate clients that send the credential with its scheme prefix
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        let claims = self
            .decode_token(token)
            .map_err(|e| DomainError::Unauthorized(e.to_string()))?;

        claims
            .user_id()
            .map_err(|e| DomainError::Unauthorized(e.to_string()))
    }
}
