//! Authentication middleware for Axum

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use super::cookie::CookieSettings;
use super::jwt::{Claims, JwtError, JwtManager};

/// Identity resolved from a validated token
///
/// Constructed only in this module, and only after the token has passed
/// signature and expiry checks. Handlers receive their own read-only copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    user_id: Uuid,
    expires_at: i64,
}

impl AuthUser {
    fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            expires_at: claims.exp,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.expires_at).ok()
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// State needed for authentication
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
    pub cookie: CookieSettings,
}

/// Extract the token from the auth cookie; an empty value counts as absent
fn extract_token_from_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name.trim() == cookie_name).then(|| value.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

/// Extract bearer token from Authorization header or HttpOnly cookie
/// Prefers Authorization header but falls back to cookie for browser clients
pub(crate) fn extract_bearer_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(header) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        let trimmed = header.trim();
        if let Some(token) = trimmed
            .strip_prefix("Bearer ")
            .or_else(|| trimmed.strip_prefix("bearer "))
        {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    extract_token_from_cookie(headers, cookie_name)
}

/// Resolve the caller's identity from request headers, all-or-nothing
pub fn authenticate(auth_state: &AuthState, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
    let token =
        extract_bearer_token(headers, &auth_state.cookie.name).ok_or(AuthError::MissingAuth)?;

    match auth_state.jwt_manager.validate_token(&token) {
        Ok(claims) => Ok(AuthUser::from_claims(claims)),
        Err(err) => {
            let token_prefix = token.get(..12).unwrap_or(token.as_str());
            match err {
                JwtError::Expired => {
                    tracing::debug!(token_prefix = %token_prefix, "Token expired")
                }
                _ => tracing::debug!(token_prefix = %token_prefix, "Token failed validation"),
            }
            Err(AuthError::InvalidToken)
        }
    }
}

/// Middleware that requires authentication
///
/// On success the resolved `AuthUser` is inserted into the request
/// extensions before the inner handler runs; on failure the handler is
/// never called.
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    match authenticate(&auth_state, request.headers()) {
        Ok(auth_user) => {
            tracing::debug!(
                path = %path,
                user_id = %auth_user.user_id,
                "require_auth: authentication successful"
            );
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %path, error = ?err, "require_auth: authentication failed");
            err.into_response()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingAuth,
    #[error("Invalid or expired credential")]
    InvalidToken,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingAuth => "Missing credential",
            AuthError::InvalidToken => "Invalid or expired credential",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.message(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
