//! Token carrier cookie
//!
//! The token travels in an `HttpOnly`, `SameSite=Lax` cookie. Sign-out
//! overwrites it with an empty, already-expired value; the token itself
//! stays valid until its own expiry if a client replays it.

use axum::http::{header::InvalidHeaderValue, HeaderValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub name: String,
    /// Adds `Secure`; disable only for plain-HTTP local development
    pub secure: bool,
}

impl CookieSettings {
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    /// Build the `Set-Cookie` value carrying a freshly issued token
    pub fn auth_cookie(
        &self,
        token: &str,
        max_age_seconds: i64,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let name = &self.name;
        let mut cookie = format!(
            "{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            max_age_seconds.max(0)
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// Build the `Set-Cookie` value that clears the carrier
    pub fn clear_auth_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let name = &self.name;
        let mut cookie = format!(
            "{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookie_attributes() {
        let settings = CookieSettings::new("jwt", true);
        let cookie = settings.auth_cookie("abc.def.ghi", 3600).unwrap();
        let cookie = cookie.to_str().unwrap();

        assert!(cookie.starts_with("jwt=abc.def.ghi;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn test_insecure_cookie_omits_secure_flag() {
        let settings = CookieSettings::new("jwt", false);
        let cookie = settings.auth_cookie("t", 60).unwrap();
        assert!(!cookie.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn test_clear_cookie_is_empty_and_expired() {
        let settings = CookieSettings::new("jwt", true);
        let cookie = settings.clear_auth_cookie().unwrap();
        let cookie = cookie.to_str().unwrap();

        assert!(cookie.starts_with("jwt=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_control_characters_are_refused() {
        let settings = CookieSettings::new("jwt", true);
        assert!(settings.auth_cookie("bad\nvalue", 60).is_err());
    }
}
