use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::AppState;

/// Verified identity of the caller, derived from a bearer credential.
///
/// This is the single source of truth for "who is asking": handlers read it
/// from request extensions and never from request bodies or query strings.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
    pub session_id: Option<String>,
}

/// Capability interface for identity verification, so the token issuer can
/// be swapped (hosted IdP, self-issued HS256, test doubles) without touching
/// handlers. Constructed once at startup and held in `AppState`.
pub trait AuthProvider: Send + Sync {
    /// Verify a raw bearer token (without the `Bearer ` prefix) and return
    /// the principal it asserts, or `None` if invalid or expired.
    fn verify_token(&self, token: &str) -> Option<Principal>;
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

/// HS256 verifier. Doubles as the issuer for locally minted tokens
/// (dev tooling and the integration tests).
pub struct JwtAuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtAuthService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Option<String> {
        encode(&Header::default(), claims, &self.encoding_key).ok()
    }
}

impl AuthProvider for JwtAuthService {
    fn verify_token(&self, token: &str) -> Option<Principal> {
        let validation = Validation::default();

        let claims = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
            })
            .ok()?;

        Some(Principal {
            user_id: claims.sub,
            email: claims.email,
            session_id: claims.sid,
        })
    }
}

/// Middleware guarding the authenticated route group. On success the
/// verified [`Principal`] is stored in request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let principal = state.auth.verify_token(token).ok_or_else(|| {
        tracing::warn!("Bearer token rejected");
        StatusCode::UNAUTHORIZED
    })?;

    tracing::debug!("Authenticated user: {}", principal.user_id);

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
