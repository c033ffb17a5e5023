//! Bearer tokens naming the calling actor.
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//! JwtManager::verify ──► Claims.sub ──► ActorDirectory ──► capabilities
//! ```
//!
//! Tokens are HS256 over `[auth].jwt_secret`. A request without a token
//! reaches the core as an anonymous caller; a token that fails
//! verification is rejected before any workflow runs.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthSettings;
use crate::error::{ApiError, ApiResult};

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Actor id, looked up in `[[actors]]`.
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID
    pub jti: String,
}

/// Issues and verifies actor tokens.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(&settings.jwt_secret, settings.token_lifetime_secs)
    }

    /// Signs a token naming `actor_id`.
    pub fn issue(&self, actor_id: &str) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: actor_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.lifetime_secs)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("failed to sign token: {}", e)))
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ApiError::unauthenticated(format!("invalid token: {}", e)))
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
