//! Bridge configuration: which realm to authenticate against and where its user data lives.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::identity::{register_default_realm, RealmRegistry, UserStore};
use crate::ssh::{RealmAuthenticator, DEFAULT_REALM};

pub const ENV_REALM: &str = "REALM_AUTH_REALM";
pub const ENV_USERS_FILE: &str = "REALM_AUTH_USERS_FILE";
pub const ENV_KEYS_FILE: &str = "REALM_AUTH_KEYS_FILE";

fn default_realm() -> String { DEFAULT_REALM.to_string() }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default)]
    pub users_file: Option<PathBuf>,
    #[serde(default)]
    pub keys_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self { Self { realm: default_realm(), users_file: None, keys_file: None } }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    // Split out so tests do not have to mutate the process environment.
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        Self {
            realm: non_empty(ENV_REALM).unwrap_or_else(default_realm),
            users_file: non_empty(ENV_USERS_FILE).map(PathBuf::from),
            keys_file: non_empty(ENV_KEYS_FILE).map(PathBuf::from),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid auth config JSON")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading auth config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn load_store(&self) -> Result<UserStore> {
        UserStore::load(self.users_file.as_deref(), self.keys_file.as_deref())
    }

    /// Load the user store, register the standard realm under the configured name and
    /// return an authenticator bound to it.
    pub fn build_authenticator(&self) -> Result<RealmAuthenticator> {
        let store = Arc::new(self.load_store()?);
        let registry = Arc::new(RealmRegistry::new());
        register_default_realm(&registry, &self.realm, store);
        info!(
            target: "realm_auth::config",
            realm = %self.realm,
            users_file = ?self.users_file,
            keys_file = ?self.keys_file,
            "authenticator ready"
        );
        Ok(RealmAuthenticator::with_realm(self.realm.clone(), registry))
    }
}
