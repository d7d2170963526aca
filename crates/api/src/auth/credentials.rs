//! Sign-up, sign-in and profile lookup
//!
//! `CredentialGate` ties the password service, the token codec and the
//! credential store together. It only sees `UserStore`, so it behaves the
//! same over Postgres and the in-memory store.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::jwt::JwtManager;
use super::middleware::AuthUser;
use super::password::{validate_password_strength, PasswordService};
use crate::error::{ApiError, ApiResult};
use crate::store::{NewUser, StoreError, User, UserProfile, UserStore};

const MAX_FIELD_LENGTH: usize = 255;

#[allow(clippy::expect_used)] // literal pattern, exercised by the tests below
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern compiles")
});

/// Sign-up input, as received from the client
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A token issued at sign-in, with what the transport needs to carry it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub max_age_seconds: i64,
}

/// Lower-case and trim an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn require_field(field: &str, value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(ApiError::Validation(format!(
            "{field} must be at most {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate and normalise sign-up input
fn validate_registration(registration: Registration) -> ApiResult<Registration> {
    let name = registration.name.trim().to_string();
    let username = registration.username.trim().to_string();
    let email = normalize_email(&registration.email);

    require_field("name", &name)?;
    require_field("username", &username)?;
    require_field("email", &email)?;

    if username.chars().any(char::is_whitespace) {
        return Err(ApiError::Validation(
            "username must not contain whitespace".to_string(),
        ));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(ApiError::Validation("email is not a valid address".to_string()));
    }
    validate_password_strength(&registration.password).map_err(ApiError::Validation)?;

    Ok(Registration {
        name,
        username,
        email,
        password: registration.password,
    })
}

#[derive(Clone)]
pub struct CredentialGate {
    store: Arc<dyn UserStore>,
    passwords: PasswordService,
    jwt_manager: JwtManager,
}

impl CredentialGate {
    pub fn new(store: Arc<dyn UserStore>, passwords: PasswordService, jwt_manager: JwtManager) -> Self {
        Self {
            store,
            passwords,
            jwt_manager,
        }
    }

    /// Create a credential record. Duplicates surface from the store as
    /// `Conflict`; there is no lookup before the insert.
    pub async fn register(&self, registration: Registration) -> ApiResult<User> {
        let registration = validate_registration(registration)?;

        let password_hash = self
            .passwords
            .hash_password_blocking(registration.password)
            .await?;

        let result = self
            .store
            .insert(NewUser {
                name: registration.name,
                username: registration.username,
                email: registration.email,
                password_hash,
            })
            .await;

        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, username = %user.username, "User registered");
                Ok(user)
            }
            Err(StoreError::Conflict(field)) => {
                tracing::info!(field = ?field, "Registration rejected: duplicate field");
                Err(StoreError::Conflict(field).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Verify an email/password pair and issue a token
    ///
    /// An unknown email still pays for one Argon2 verification against a
    /// decoy verifier, and both failure paths return `InvalidCredentials`.
    pub async fn authenticate(&self, email: &str, password: &str) -> ApiResult<IssuedToken> {
        let email = normalize_email(email);

        let user = match self.store.find_by_email(&email).await {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => None,
            Err(err) => return Err(err.into()),
        };

        let verified = self
            .passwords
            .verify_password_blocking(
                password.to_string(),
                user.as_ref().map(|u| u.password_hash.clone()),
            )
            .await?;

        let user = match user {
            Some(user) if verified => user,
            _ => {
                tracing::info!("Sign-in rejected: invalid credentials");
                return Err(ApiError::InvalidCredentials);
            }
        };

        let (token, claims) = self.jwt_manager.generate_access_token(user.id)?;
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| ApiError::Internal("token expiry out of range".to_string()))?;

        tracing::info!(user_id = %user.id, "User signed in");

        Ok(IssuedToken {
            token,
            user_id: user.id,
            expires_at,
            max_age_seconds: claims.exp - claims.iat,
        })
    }

    /// Load the record of the caller the access filter admitted
    pub async fn fetch_self(&self, auth_user: &AuthUser) -> ApiResult<UserProfile> {
        let user = self.store.find_by_id(auth_user.user_id()).await?;
        Ok(UserProfile::from(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::tests::fast_service;
    use crate::auth::{AuthState, CookieSettings};
    use crate::store::InMemoryUserStore;
    use async_trait::async_trait;

    /// Store whose backend is always unavailable
    struct FailingUserStore;

    #[async_trait]
    impl UserStore for FailingUserStore {
        async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Internal("connection reset".to_string()))
        }

        async fn find_by_email(&self, _email: &str) -> Result<User, StoreError> {
            Err(StoreError::Internal("connection reset".to_string()))
        }

        async fn find_by_id(&self, _id: Uuid) -> Result<User, StoreError> {
            Err(StoreError::Internal("connection reset".to_string()))
        }
    }

    fn auth_user_for(jwt: &JwtManager, user_id: Uuid) -> AuthUser {
        let (token, _) = jwt.generate_access_token(user_id).unwrap();
        let state = AuthState {
            jwt_manager: jwt.clone(),
            cookie: CookieSettings::new("jwt", true),
        };
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        crate::auth::authenticate(&state, &headers).unwrap()
    }

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            name: "Ann".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: "pw123456".to_string(),
        }
    }

    fn gate() -> (CredentialGate, InMemoryUserStore, JwtManager) {
        let store = InMemoryUserStore::new();
        let jwt = JwtManager::new("test-secret", 1, 0).unwrap();
        let gate = CredentialGate::new(Arc::new(store.clone()), fast_service(), jwt.clone());
        (gate, store, jwt)
    }

    #[tokio::test]
    async fn test_register_stores_verifier_not_plaintext() {
        let (gate, store, _) = gate();
        let user = gate
            .register(registration("ann", "Ann@X.com "))
            .await
            .unwrap();

        assert_eq!(user.email, "ann@x.com");
        assert_ne!(user.password_hash, "pw123456");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_and_keeps_one_record() {
        let (gate, store, _) = gate();
        gate.register(registration("ann", "ann@x.com")).await.unwrap();

        let second = gate.register(registration("ann2", "ANN@x.com")).await;
        assert!(matches!(second, Err(ApiError::Conflict(_))));

        let third = gate.register(registration("ann", "other@x.com")).await;
        assert!(matches!(third, Err(ApiError::Conflict(_))));

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (gate, store, _) = gate();

        let mut missing_name = registration("ann", "ann@x.com");
        missing_name.name = "   ".to_string();
        let bad_email = registration("ann", "ann-at-x.com");
        let mut short_password = registration("ann", "ann@x.com");
        short_password.password = "short".to_string();
        let spaced_username = registration("ann smith", "ann@x.com");

        for input in [missing_name, bad_email, short_password, spaced_username] {
            assert!(matches!(
                gate.register(input).await,
                Err(ApiError::Validation(_))
            ));
        }
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_email_pattern() {
        for ok in ["ann@x.com", "a.b+c@sub.example.org"] {
            assert!(EMAIL_RE.is_match(ok), "{ok} should be accepted");
        }
        for bad in ["ann", "ann@", "@x.com", "ann@x", "ann @x.com", "ann@x..com"] {
            assert!(!EMAIL_RE.is_match(bad), "{bad} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_authenticate_issues_valid_token() {
        let (gate, _, jwt) = gate();
        let user = gate.register(registration("ann", "ann@x.com")).await.unwrap();

        let issued = gate.authenticate(" ANN@x.com", "pw123456").await.unwrap();
        let claims = jwt.validate_token(&issued.token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(issued.user_id, user.id);
        assert_eq!(issued.max_age_seconds, 3600);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
        let (gate, _, _) = gate();
        gate.register(registration("ann", "ann@x.com")).await.unwrap();

        let wrong_password = gate.authenticate("ann@x.com", "not-the-password").await;
        let unknown_email = gate.authenticate("nobody@x.com", "pw123456").await;

        let wrong_password = wrong_password.unwrap_err();
        let unknown_email = unknown_email.unwrap_err();
        assert!(matches!(wrong_password, ApiError::InvalidCredentials));
        assert!(matches!(unknown_email, ApiError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.status(), unknown_email.status());
    }

    #[tokio::test]
    async fn test_fetch_self_returns_profile() {
        let (gate, _, jwt) = gate();
        let user = gate.register(registration("ann", "ann@x.com")).await.unwrap();
        let issued = gate.authenticate("ann@x.com", "pw123456").await.unwrap();

        assert_eq!(issued.user_id, user.id);
        let auth_user = auth_user_for(&jwt, issued.user_id);

        let profile = gate.fetch_self(&auth_user).await.unwrap();
        assert_eq!(profile.id, user.id);
        assert_eq!(profile.username, "ann");

        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal() {
        let jwt = JwtManager::new("test-secret", 1, 0).unwrap();
        let gate = CredentialGate::new(Arc::new(FailingUserStore), fast_service(), jwt.clone());

        let registered = gate.register(registration("ann", "ann@x.com")).await;
        assert!(matches!(registered, Err(ApiError::Internal(_))));

        let signed_in = gate.authenticate("ann@x.com", "pw123456").await;
        assert!(matches!(signed_in, Err(ApiError::Internal(_))));

        let profile = gate.fetch_self(&auth_user_for(&jwt, Uuid::new_v4())).await;
        assert!(matches!(profile, Err(ApiError::Internal(_))));
    }

    #[tokio::test]
    async fn test_unreadable_verifier_is_internal() {
        let (gate, store, _) = gate();
        store
            .insert(NewUser {
                name: "Ann".to_string(),
                username: "ann".to_string(),
                email: "ann@x.com".to_string(),
                password_hash: "not-a-phc-string".to_string(),
            })
            .await
            .unwrap();

        let result = gate.authenticate("ann@x.com", "pw123456").await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[tokio::test]
    async fn test_overlong_field_counts_characters() {
        let (gate, _, _) = gate();

        let mut accepted = registration("ann", "ann@x.com");
        accepted.name = "é".repeat(MAX_FIELD_LENGTH);
        assert!(gate.register(accepted).await.is_ok());

        let mut rejected = registration("bob", "bob@x.com");
        rejected.name = "é".repeat(MAX_FIELD_LENGTH + 1);
        assert!(matches!(
            gate.register(rejected).await,
            Err(ApiError::Validation(_))
        ));
    }
}
