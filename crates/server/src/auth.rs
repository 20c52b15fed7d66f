use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use course_core::model::StudentId;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Bearer token claims; `sub` is the student id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: u64,
    pub exp: u64,
}

/// Verifies HS256 bearer tokens issued by the authentication service.
#[derive(Clone)]
pub struct AuthKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthKeys {
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// # Errors
    ///
    /// Returns the `jsonwebtoken` error for bad signatures, expired or malformed tokens.
    pub fn verify(&self, token: &str) -> Result<StudentId, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(StudentId::new(data.claims.sub))
    }
}

/// The calling student, resolved from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthStudent(pub StudentId);

impl FromRequestParts<AppState> for AuthStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        state.auth.verify(token.trim()).map(AuthStudent).map_err(|e| {
            debug!(error = %e, "rejected bearer token");
            ApiError::Unauthorized
        })
    }
}
