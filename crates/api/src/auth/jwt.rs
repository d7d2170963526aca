//! JWT issuance and validation
//!
//! Tokens are HS256-signed and fully self-contained: the server keeps no
//! record of issued tokens, so validation needs only the token and the key.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

const SECONDS_PER_HOUR: u64 = 3600;

/// Longest token lifetime accepted at construction (one year)
pub const MAX_EXPIRY_HOURS: u64 = 24 * 366;

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.exp).ok()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("invalid JWT configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to sign token: {0}")]
    Encoding(String),
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    InvalidToken,
}

/// Signs and validates tokens with a process-wide secret
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry_hours: u64,
}

impl JwtManager {
    /// Fails closed on an empty secret, a zero lifetime, or a lifetime
    /// above `MAX_EXPIRY_HOURS`.
    pub fn new(secret: &str, expiry_hours: u64, leeway_seconds: u64) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::InvalidConfig("signing secret must not be empty"));
        }
        if expiry_hours == 0 {
            return Err(JwtError::InvalidConfig("token lifetime must be positive"));
        }
        if expiry_hours > MAX_EXPIRY_HOURS {
            return Err(JwtError::InvalidConfig("token lifetime exceeds one year"));
        }

        // HS256 only; `alg` from the token header is never trusted
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_seconds;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry_hours,
        })
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        i64::try_from(self.expiry_hours.saturating_mul(SECONDS_PER_HOUR)).unwrap_or(i64::MAX)
    }

    /// Issue a token for `user_id` with the configured lifetime
    pub fn generate_access_token(&self, user_id: Uuid) -> Result<(String, Claims), JwtError> {
        self.generate_token_with_ttl(user_id, Duration::seconds(self.access_token_expiry_seconds()))
    }

    /// Issue a token with an explicit lifetime; non-positive lifetimes are refused
    pub fn generate_token_with_ttl(
        &self,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(String, Claims), JwtError> {
        if !ttl.is_positive() {
            return Err(JwtError::InvalidConfig("token lifetime must be positive"));
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = now
            .checked_add(ttl)
            .ok_or(JwtError::InvalidConfig("token lifetime overflows"))?;

        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };

        let token = self.sign_claims(&claims)?;
        Ok((token, claims))
    }

    /// Sign an arbitrary claim set
    pub fn sign_claims(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    /// Validate signature and expiry, returning the embedded claims
    ///
    /// Malformed input and signature mismatches both come back as
    /// `InvalidToken`; only expiry is reported separately, for logging.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => JwtError::Expired,
                    _ => JwtError::InvalidToken,
                }
            })?;

        Ok(data.claims)
    }
}
