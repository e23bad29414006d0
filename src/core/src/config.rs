use serde::{Deserialize, Serialize};

use crate::error::{LockError, Result};

/// Default per-request registry timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding [`RegistryConfig::timeout_secs`].
pub const TIMEOUT_ENV: &str = "A3S_LOCK_TIMEOUT";

/// Environment variable listing registries reached over plain HTTP.
pub const INSECURE_REGISTRIES_ENV: &str = "A3S_LOCK_INSECURE_REGISTRIES";

/// What to do with `FROM` instructions that already carry a digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Pin unpinned images, leave pinned ones alone
    #[default]
    Lock,
    /// Additionally re-resolve pinned images by tag
    Upgrade,
}

/// Transport used to reach a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientProtocol {
    Http,
    #[default]
    Https,
    /// HTTPS for everything except the listed registries
    HttpsExcept(Vec<String>),
}

impl ClientProtocol {
    /// URL scheme to use for `registry`.
    pub fn scheme_for(&self, registry: &str) -> &'static str {
        match self {
            ClientProtocol::Http => "http",
            ClientProtocol::Https => "https",
            ClientProtocol::HttpsExcept(insecure) => {
                if insecure.iter().any(|r| r == registry) {
                    "http"
                } else {
                    "https"
                }
            }
        }
    }
}

/// Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Transport selection
    pub protocol: ClientProtocol,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            protocol: ClientProtocol::Https,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("a3s-lock/{}", crate::VERSION),
        }
    }
}

impl RegistryConfig {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(TIMEOUT_ENV) {
            config.timeout_secs = parse_timeout(&value)?;
        }
        if let Ok(value) = std::env::var(INSECURE_REGISTRIES_ENV) {
            let hosts: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect();
            config.add_insecure_registries(hosts);
        }
        Ok(config)
    }

    /// Reach the given registries over plain HTTP.
    pub fn add_insecure_registries(&mut self, hosts: impl IntoIterator<Item = String>) {
        let mut hosts: Vec<String> = hosts.into_iter().collect();
        if hosts.is_empty() {
            return;
        }
        match &mut self.protocol {
            ClientProtocol::Http => {}
            ClientProtocol::Https => self.protocol = ClientProtocol::HttpsExcept(hosts),
            ClientProtocol::HttpsExcept(existing) => existing.append(&mut hosts),
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

fn parse_timeout(value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(LockError::ConfigError(format!(
            "{TIMEOUT_ENV} must be a positive number of seconds, got '{value}'"
        ))),
        Ok(secs) => Ok(secs),
    }
}
