//! Authentication for the gatekeep API
//!
//! Passwords are stored as Argon2id verifiers and callers prove identity
//! with a stateless HS256 token carried in a cookie or a bearer header.

pub mod cookie;
pub mod credentials;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use cookie::CookieSettings;
pub use credentials::{CredentialGate, IssuedToken, Registration};
pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::{authenticate, require_auth, AuthError, AuthState, AuthUser};
pub use password::{validate_password_strength, PasswordConfig, PasswordError, PasswordService};
