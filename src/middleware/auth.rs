use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::header,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    /// Username of the principal.
    pub sub: String,
    pub exp: usize,
}

/// HMAC keys used to verify bearer tokens.
#[derive(Clone)]
pub struct AuthConfig {
    keys: Arc<(EncodingKey, DecodingKey)>,
}

impl AuthConfig {
    pub fn new(secret: &str) -> Self {
        Self {
            keys: Arc::new((
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            )),
        }
    }

    /// Signs a token for `username`. Used by the seed binary and tests; the
    /// service itself only verifies tokens.
    pub fn issue_token(&self, username: &str, ttl: Duration) -> anyhow::Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow::anyhow!("Failed to set expiration"))?;
        let claims = Claims {
            sub: username.to_string(),
            exp: expiration.timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.keys.0)?)
    }

    fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.keys.1, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
    }
}

/// The authenticated principal as established by the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?;

        let claims = AuthConfig::from_ref(state).verify(token)?;
        if claims.sub.is_empty() {
            return Err(AppError::Unauthorized("Token has no subject".into()));
        }

        Ok(AuthUser {
            username: claims.sub,
        })
    }
}
