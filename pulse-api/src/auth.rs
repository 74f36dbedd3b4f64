//! Bearer-token verification.
//!
//! Tokens are HS256 JWTs carrying `{id, email, iat, exp}`. The credential is
//! read from the `Authorization` header (with or without a `Bearer ` prefix)
//! and, when the header is absent, from a cookie of the same name.

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const COOKIE_NAME: &str = "Authorization";

/// Verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub iat: Option<i64>,
    pub exp: i64,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("no_token")]
    NoToken,

    #[error("invalid_token")]
    InvalidToken,
}

impl AuthError {
    pub fn tag(self) -> &'static str {
        match self {
            AuthError::NoToken => "no_token",
            AuthError::InvalidToken => "invalid_token",
        }
    }
}

/// Turns an opaque credential into an [`Identity`].
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credential: &str) -> Result<Identity, AuthError>;
}

pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, credential: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(credential, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "auth: token rejected");
            AuthError::InvalidToken
        })?;
        let claims = data.claims;
        if claims.id.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(Identity {
            id: claims.id,
            email: claims.email,
        })
    }
}

/// Pull the raw token out of the request headers.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
