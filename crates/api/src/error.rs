//! API error type and HTTP mapping

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::{middleware::AuthError, password::PasswordError, JwtError};
use crate::store::{StoreError, UniqueField};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Unknown email and wrong password share this variant
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Not found")]
    NotFound,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Auth(err) => err.status(),
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Validation(msg) | ApiError::Conflict(msg) => msg.clone(),
            ApiError::InvalidCredentials => "Invalid email or password".to_string(),
            ApiError::Auth(err) => err.message().to_string(),
            ApiError::NotFound => "User not found".to_string(),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error while handling request");
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(UniqueField::Username) => {
                ApiError::Conflict("Username already exists".to_string())
            }
            StoreError::Conflict(UniqueField::Email) => {
                ApiError::Conflict("Email already exists".to_string())
            }
            StoreError::Conflict(UniqueField::Unknown) => {
                ApiError::Conflict("Email or username already exists".to_string())
            }
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired | JwtError::InvalidToken => ApiError::Auth(AuthError::InvalidToken),
            JwtError::InvalidConfig(_) | JwtError::Encoding(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Auth(AuthError::MissingAuth).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_not_exposed() {
        let (status, body) = render(ApiError::Internal("connection refused on 10.0.0.5".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], 500);
    }

    #[tokio::test]
    async fn test_token_failures_collapse() {
        let (_, expired) = render(JwtError::Expired.into()).await;
        let (_, invalid) = render(JwtError::InvalidToken.into()).await;
        assert_eq!(expired, invalid);
        assert_eq!(expired["code"], 401);
    }

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        assert!(matches!(
            ApiError::from(StoreError::Conflict(UniqueField::Email)),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::NotFound),
            ApiError::NotFound
        ));
        assert!(matches!(
            ApiError::from(StoreError::Internal("x".into())),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(JwtError::Encoding("x".into())),
            ApiError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn test_password_failures_are_internal() {
        for err in [
            PasswordError::Hash("unreadable verifier".into()),
            PasswordError::InvalidParams("m_cost".into()),
            PasswordError::Task("panicked".into()),
        ] {
            let api_err = ApiError::from(err);
            assert!(matches!(api_err, ApiError::Internal(_)));

            let (status, body) = render(api_err).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["error"], "Internal server error");
        }
    }
}
