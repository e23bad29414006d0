//! Read-only registry credential store.
//!
//! Loads per-registry credentials from a Docker `config.json`
//! (`$DOCKER_CONFIG/config.json` or `~/.docker/config.json`). The store is
//! built once at startup and handed to the registry client; it never writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use a3s_lock_core::error::{LockError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

use super::registry::RegistryAuth;

/// Per-registry entry of a Docker config file.
#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// The subset of Docker's `config.json` we consume.
#[derive(Debug, Default, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default, rename = "credsStore")]
    creds_store: Option<String>,
}

/// Credentials keyed by normalized registry hostname.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    entries: HashMap<String, RegistryAuth>,
    fallback: RegistryAuth,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl CredentialStore {
    /// A store without any credentials.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: RegistryAuth::anonymous(),
        }
    }

    /// Location of Docker's client config.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        dirs::home_dir().map(|h| h.join(".docker").join("config.json"))
    }

    /// Load the default config file; a missing file yields an empty store.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::empty()),
        }
    }

    /// Load credentials from a Docker config file. Returns empty if not found.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No registry credential file");
            return Ok(Self::empty());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            LockError::ConfigError(format!(
                "Failed to read credential file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&data).map_err(|e| {
            LockError::ConfigError(format!(
                "Failed to parse credential file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse the contents of a Docker config file.
    pub fn from_json(data: &str) -> Result<Self> {
        let file: DockerConfigFile = serde_json::from_str(data)?;
        if let Some(helper) = &file.creds_store {
            tracing::debug!(helper = %helper, "Credential helpers are not consulted");
        }

        let mut store = Self::empty();
        for (registry, entry) in file.auths {
            match decode_entry(&entry)? {
                Some(auth) => store.insert(&registry, auth),
                None => tracing::debug!(registry = %registry, "Skipping credential entry without auth"),
            }
        }
        Ok(store)
    }

    /// Use `REGISTRY_USERNAME`/`REGISTRY_PASSWORD` for registries without an entry.
    pub fn with_env_fallback(mut self) -> Self {
        self.fallback = RegistryAuth::from_env();
        self
    }

    /// Store credentials for a registry. Overwrites existing entry.
    pub fn insert(&mut self, registry: &str, auth: RegistryAuth) {
        self.entries.insert(normalize_registry(registry), auth);
    }

    /// Credentials for a registry, or the fallback.
    pub fn get(&self, registry: &str) -> RegistryAuth {
        self.entries
            .get(&normalize_registry(registry))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// List all registries with stored credentials.
    pub fn list_registries(&self) -> Vec<String> {
        let mut registries: Vec<String> = self.entries.keys().cloned().collect();
        registries.sort();
        registries
    }
}

fn decode_entry(entry: &AuthEntry) -> Result<Option<RegistryAuth>> {
    if let (Some(u), Some(p)) = (&entry.username, &entry.password) {
        return Ok(Some(RegistryAuth::basic(u, p)));
    }
    let Some(encoded) = entry.auth.as_deref().filter(|a| !a.is_empty()) else {
        return Ok(None);
    };
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|e| LockError::ConfigError(format!("Invalid base64 in auth entry: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| LockError::ConfigError("Auth entry is not valid UTF-8".to_string()))?;
    let (username, password) = decoded.split_once(':').ok_or_else(|| {
        LockError::ConfigError("Auth entry must encode username:password".to_string())
    })?;
    Ok(Some(RegistryAuth::basic(username, password)))
}

/// Normalize registry names so all Docker Hub aliases share one entry.
///
/// Accepts bare hosts as well as URLs such as `https://index.docker.io/v1/`.
pub fn normalize_registry(registry: &str) -> String {
    let r = registry.trim().to_lowercase();
    let r = r
        .strip_prefix("https://")
        .or_else(|| r.strip_prefix("http://"))
        .unwrap_or(&r);
    let host = r.split('/').next().unwrap_or(r);
    if host == "docker.io" || host == "registry-1.docker.io" {
        "index.docker.io".to_string()
    } else {
        host.to_string()
    }
}
