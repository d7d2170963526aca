//! Sign-up, sign-in, sign-out and profile routes

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Registration},
    error::{ApiError, ApiResult},
    state::AppState,
    store::UserProfile,
};

// Missing fields deserialize as empty and are reported by validation.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Sign-in result. The token itself only travels in the cookie.
#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub message: &'static str,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let Json(req) = payload?;

    let user = state
        .credentials
        .register(Registration {
            name: req.name,
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

/// POST /auth/signin
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(req) = payload?;
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "email and password are required".to_string(),
        ));
    }

    let issued = state
        .credentials
        .authenticate(&req.email, &req.password)
        .await?;

    let cookie = state
        .cookie
        .auth_cookie(&issued.token, issued.max_age_seconds)
        .map_err(|e| ApiError::Internal(format!("failed to build auth cookie: {e}")))?;

    let body = SigninResponse {
        message: "Signed in",
        user_id: issued.user_id,
        expires_at: issued.expires_at,
    };

    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /auth/signout
///
/// Clears the cookie on the client. Tokens are stateless, so a copy kept
/// elsewhere stays valid until it expires.
pub async fn signout(State(state): State<AppState>) -> ApiResult<Response> {
    let cookie = state
        .cookie
        .clear_auth_cookie()
        .map_err(|e| ApiError::Internal(format!("failed to build auth cookie: {e}")))?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Signed out",
        }),
    )
        .into_response())
}

/// GET /auth/profile
pub async fn profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Json<UserProfile>> {
    let profile = state.credentials.fetch_self(&auth_user).await?;
    Ok(Json(profile))
}
