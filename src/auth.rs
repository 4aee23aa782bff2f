//! JWT bearer authentication
//!
//! HS256 tokens issued by the account service. The gateway only verifies;
//! `Claims` is injected into request extensions for handlers.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, error_codes};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    /// Administrative access
    #[serde(default)]
    pub admin: bool,
    pub exp: i64,
    pub iat: i64,
}

pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

type AuthRejection = (StatusCode, Json<ApiResponse<()>>);

fn unauthorized(code: &str, msg: &str) -> AuthRejection {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(code, msg)),
    )
}

/// Axum middleware: verify the bearer token and inject `Claims`
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthRejection> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized(error_codes::MISSING_AUTH, "Missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized(error_codes::AUTH_FAILED, "Invalid token format"))?;

    match state.verifier.verify(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(_) => Err(unauthorized(
            error_codes::AUTH_FAILED,
            "Invalid or expired token",
        )),
    }
}

/// Axum middleware for the `/internal/*` surface: shared-secret header
/// check, scheduler-to-service only.
pub async fn internal_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthRejection> {
    let presented = request
        .headers()
        .get("x-internal-secret")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized(error_codes::MISSING_AUTH, "Missing X-Internal-Secret"))?;

    if presented != state.internal_secret {
        return Err(unauthorized(error_codes::AUTH_FAILED, "Invalid internal secret"));
    }

    Ok(next.run(request).await)
}
