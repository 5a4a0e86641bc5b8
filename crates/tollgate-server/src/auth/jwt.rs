//! Bearer JWT strategy.

use super::verifier::{Done, Strategy};
use crate::directory::IdentityDirectory;
use axum::http::{header, request::Parts, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
    /// Token type.
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

/// Token type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl Claims {
    /// Access token claims for `user_id`, valid for `expires_in` seconds.
    pub fn new_access(user_id: Uuid, expires_in: i64) -> Self {
        Self::new(user_id, TokenType::Access, expires_in)
    }

    /// Refresh token claims. Never accepted by the gate.
    pub fn new_refresh(user_id: Uuid, expires_in: i64) -> Self {
        Self::new(user_id, TokenType::Refresh, expires_in)
    }

    fn new(user_id: Uuid, token_type: TokenType, expires_in: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            iat: now,
            exp: now + expires_in,
            token_type,
        }
    }

    /// Get user ID as UUID.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Encode claims into an HS256 token.
pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Decode and validate a token, including its expiry.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode_with_key(token, &DecodingKey::from_secret(secret.as_bytes()))
}

fn decode_with_key(token: &str, key: &DecodingKey) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    Ok(decode::<Claims>(token, key, &validation)?.claims)
}

/// Pull the raw token from `Authorization: Bearer`, or from the
/// `access_token` cookie when `allow_cookie` is set.
pub fn extract_token(headers: &HeaderMap, allow_cookie: bool) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let (scheme, token) = value.to_str().ok()?.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        return (!token.is_empty()).then(|| token.to_string());
    }

    if !allow_cookie {
        return None;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| cookie.trim().strip_prefix("access_token="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Verifies HS256 access tokens and resolves their subject in a directory.
pub struct JwtStrategy {
    key: DecodingKey,
    directory: Arc<dyn IdentityDirectory>,
    allow_cookie: bool,
}

impl JwtStrategy {
    pub fn new(secret: &str, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            directory,
            allow_cookie: false,
        }
    }

    /// Also accept the `access_token` cookie.
    pub fn with_cookie(mut self, allow: bool) -> Self {
        self.allow_cookie = allow;
        self
    }
}

impl Strategy for JwtStrategy {
    fn name(&self) -> &'static str {
        "jwt"
    }

    fn authenticate(&self, request: &Parts, done: Done) {
        let Some(token) = extract_token(&request.headers, self.allow_cookie) else {
            done.reject("No auth token");
            return;
        };

        let claims = match decode_with_key(&token, &self.key) {
            Ok(claims) => claims,
            Err(err) => {
                done.error(err);
                return;
            }
        };

        if claims.token_type != TokenType::Access {
            done.reject("Invalid token type");
            return;
        }

        let Some(user_id) = claims.user_id() else {
            done.reject("Invalid token subject");
            return;
        };

        let directory = self.directory.clone();
        tokio::spawn(async move {
            match directory.find(user_id).await {
                Ok(Some(user)) => done.verified(user.identity()),
                Ok(None) => done.call(None, None, None),
                Err(err) => done.error(err),
            };
        });
    }
}
