use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

const SERVICE_ROLE: &str = "service_role";
const USER_AUDIENCE: &str = "authenticated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Service role keys carry neither `sub` nor `aud`; user tokens carry both.
#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: Option<String>,
    pub role: String,
    pub aud: Option<Audience>,
    pub email: Option<String>,
    pub exp: usize,
}

impl SupabaseClaims {
    pub fn is_service_role(&self) -> bool {
        self.role == SERVICE_ROLE
    }
}

/// Validates Supabase-issued HS256 access tokens. Installed as a request extension.
#[derive(Clone)]
pub struct SupabaseJwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SupabaseJwtVerifier {
    pub fn new(jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Audience depends on the role, checked in `validate`.
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<SupabaseClaims, AuthError> {
        let token_data = decode::<SupabaseClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError(anyhow::anyhow!("JWT validation failed: {}", e)))?;
        let claims = token_data.claims;

        if claims.is_service_role() {
            return Ok(claims);
        }

        let audience_ok = claims
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains(USER_AUDIENCE));
        if !audience_ok {
            return Err(AuthError(anyhow::anyhow!(
                "JWT validation failed: invalid audience"
            )));
        }
        if claims.sub.is_none() {
            return Err(AuthError(anyhow::anyhow!(
                "JWT validation failed: missing subject"
            )));
        }

        Ok(claims)
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Nil for service role callers, which act for no user account.
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: String,
}

impl AuthUser {
    /// Server-to-server callers holding the service role key act with admin rights.
    pub fn is_service_role(&self) -> bool {
        self.role == SERVICE_ROLE
    }

    /// The user account behind the token, if any.
    pub fn account_id(&self) -> Option<Uuid> {
        (!self.is_service_role()).then_some(self.user_id)
    }
}

#[derive(Debug)]
pub struct AuthError(anyhow::Error);

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError(err)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn unauthorized(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, message)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let verifier = parts
            .extensions
            .get::<Arc<SupabaseJwtVerifier>>()
            .cloned()
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication is not configured",
                )
            })?;

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| unauthorized("Invalid Authorization header"))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization header format"))?;

        let claims = verifier
            .validate(token)
            .map_err(|e| unauthorized(&e.to_string()))?;

        let user_id = match (&claims.sub, claims.is_service_role()) {
            (Some(sub), _) => {
                Uuid::parse_str(sub).map_err(|_| unauthorized("Invalid user ID in token"))?
            }
            (None, true) => Uuid::nil(),
            (None, false) => return Err(unauthorized("Missing user ID in token")),
        };

        Ok(AuthUser {
            user_id,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests;
