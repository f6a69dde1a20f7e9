use std::env;
use std::sync::Arc;

use color_eyre::eyre::eyre;
use tracing::info;

use crate::accounts::AccountManager;
use crate::store::{AccountStore, MemoryStore};

/// Token issuance/verification settings, loaded once at startup and shared
/// by the login path and the request middleware.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 symmetric signing key.
    pub key: String,
    pub issuer: String,
    pub audience: String,
    /// Fixed expiry horizon from issuance time.
    pub lifetime: chrono::Duration,
}

impl AuthConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let key =
            env::var("JWT_KEY").map_err(|_| eyre!("JWT_KEY environment variable not set"))?;
        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "dbd-wiki-api".to_string());
        let audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dbd-wiki-frontend".to_string());
        let hours: i64 = match env::var("JWT_LIFETIME_HOURS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| eyre!("JWT_LIFETIME_HOURS is not a number: {raw}"))?,
            Err(_) => 8,
        };

        Ok(Self {
            key,
            issuer,
            audience,
            lifetime: chrono::Duration::hours(hours),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountManager,
    pub auth: AuthConfig,
    pub frontend_origin: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AccountStore>,
        auth: AuthConfig,
        frontend_origin: impl Into<String>,
    ) -> Self {
        Self {
            accounts: AccountManager::new(store, auth.clone()),
            auth,
            frontend_origin: frontend_origin.into(),
        }
    }

    pub fn from_env() -> color_eyre::Result<Self> {
        let auth = AuthConfig::from_env()?;

        let store: Arc<dyn AccountStore> = match env::var("STORE_PATH") {
            Ok(path) => {
                info!(%path, "using JSON snapshot account store");
                Arc::new(MemoryStore::with_snapshot(path)?)
            }
            Err(_) => {
                info!("STORE_PATH not set, accounts are in-memory only");
                Arc::new(MemoryStore::new())
            }
        };

        let frontend_origin =
            env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self::new(store, auth, frontend_origin))
    }
}
