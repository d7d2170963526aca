//! Application configuration loaded from the environment
//!
//! Built once in `main` and handed to the components that need it; nothing
//! reads the environment after startup.

use std::env;

use crate::auth::{jwt::MAX_EXPIRY_HOURS, password::PasswordConfig};

/// Upper bound on clock-skew leeway accepted for token expiry checks
pub const MAX_JWT_LEEWAY_SECONDS: u64 = 300;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8082";
const DEFAULT_COOKIE_NAME: &str = "jwt";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub jwt_leeway_seconds: u64,
    pub database_url: Option<String>,
    pub bind_address: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub password: PasswordConfig,
    pub allowed_origins: Vec<String>,
}

// Hand-written so the signing secret never reaches the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .field("database_configured", &self.database_url.is_some())
            .field("bind_address", &self.bind_address)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("password", &self.password)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expiry_hours = lookup("JWT_EXPIRY_HOURS")
            .ok_or(ConfigError::Missing("JWT_EXPIRY_HOURS"))
            .and_then(|raw| parse_positive("JWT_EXPIRY_HOURS", &raw))?;
        if jwt_expiry_hours > MAX_EXPIRY_HOURS {
            return Err(ConfigError::Invalid {
                name: "JWT_EXPIRY_HOURS",
                reason: format!("must not exceed {MAX_EXPIRY_HOURS}"),
            });
        }

        let jwt_leeway_seconds = match lookup("JWT_LEEWAY_SECONDS") {
            Some(raw) => {
                let leeway: u64 = parse_number("JWT_LEEWAY_SECONDS", &raw)?;
                if leeway > MAX_JWT_LEEWAY_SECONDS {
                    return Err(ConfigError::Invalid {
                        name: "JWT_LEEWAY_SECONDS",
                        reason: format!("must not exceed {MAX_JWT_LEEWAY_SECONDS}"),
                    });
                }
                leeway
            }
            None => 0,
        };

        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());

        let bind_address =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let cookie_name = lookup("AUTH_COOKIE_NAME")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());
        if !cookie_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid {
                name: "AUTH_COOKIE_NAME",
                reason: "only ASCII letters, digits, '_' and '-' are allowed".to_string(),
            });
        }

        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
            None => true,
        };

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: optional_number(&lookup, "PASSWORD_HASH_MEMORY_KIB")?
                .unwrap_or(defaults.memory_kib),
            iterations: optional_number(&lookup, "PASSWORD_HASH_ITERATIONS")?
                .unwrap_or(defaults.iterations),
            parallelism: optional_number(&lookup, "PASSWORD_HASH_PARALLELISM")?
                .unwrap_or(defaults.parallelism),
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            jwt_secret,
            jwt_expiry_hours,
            jwt_leeway_seconds,
            database_url,
            bind_address,
            cookie_name,
            cookie_secure,
            password,
            allowed_origins,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        reason: format!("'{raw}' is not a valid number"),
    })
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let value: u64 = parse_number(name, raw)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            reason: format!("'{raw}' is not a boolean"),
        }),
    }
}

fn optional_number<F>(lookup: &F, name: &'static str) -> Result<Option<u32>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map(|raw| parse_number(name, &raw)).transpose()
}
