//! Authentication of the requests made by the settings page.
//!
//! The page sends `Authorization: Bearer <token>`, where the token is a JWT
//! signed with HS256 using the app secret. Its subject is the acting user.

use crate::handlers::Context;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct Claims {
    /// The user making the request.
    #[serde(default)]
    pub sub: String,
    pub exp: u64,
}

#[derive(Debug)]
pub struct AuthError(String);

impl std::error::Error for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::warn!("rejected settings request: {}", self.0);
        (StatusCode::UNAUTHORIZED, format!("Unauthorized: {}", self.0)).into_response()
    }
}

pub fn validate_app_request(
    authorization: Option<&str>,
    secret: &SecretString,
) -> Result<Claims, AuthError> {
    let Some(authorization) = authorization else {
        return Err(AuthError("missing authorization header".to_string()));
    };
    let Some(token) = authorization
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return Err(AuthError("expected a bearer token".to_string()));
    };
    let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
    jsonwebtoken::decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))
        .map(|data| data.claims)
        .map_err(|e| AuthError(format!("invalid token: {e}")))
}

/// Extracts the claims of an authenticated settings request.
pub struct AppUser(pub Claims);

impl FromRequestParts<Arc<Context>> for AppUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<Context>,
    ) -> Result<Self, Self::Rejection> {
        let authorization = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| AuthError("authorization header is not valid UTF-8".to_string()))?,
            ),
            None => None,
        };
        validate_app_request(authorization, &ctx.config.app_secret).map(AppUser)
    }
}
