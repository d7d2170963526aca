//! Application state

use std::sync::Arc;

use crate::{
    auth::{AuthState, CookieSettings, CredentialGate, JwtManager, PasswordService},
    config::Config,
    store::UserStore,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub jwt_manager: JwtManager,
    pub credentials: CredentialGate,
    pub cookie: CookieSettings,
}

impl AppState {
    /// Build the state from validated config and a credential store.
    /// Fails if the signing key or hashing parameters are rejected.
    pub fn new(config: &Config, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let jwt_manager = JwtManager::new(
            &config.jwt_secret,
            config.jwt_expiry_hours,
            config.jwt_leeway_seconds,
        )?;
        let passwords = PasswordService::new(&config.password)?;
        let cookie = CookieSettings::new(config.cookie_name.clone(), config.cookie_secure);
        let credentials = CredentialGate::new(store, passwords, jwt_manager.clone());

        Ok(Self {
            jwt_manager,
            credentials,
            cookie,
        })
    }

    /// Create auth state for middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
            cookie: self.cookie.clone(),
        }
    }
}
