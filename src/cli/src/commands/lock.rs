//! `a3s-lock` command: lock or upgrade Dockerfile base images.

use std::path::PathBuf;
use std::sync::Arc;

use a3s_lock_core::config::{LockMode, RegistryConfig};
use a3s_lock_engine::{process_files, CredentialStore, RegistryClient};
use clap::Args;

use crate::output;

#[derive(Args)]
pub struct LockArgs {
    /// Dockerfiles to process
    #[arg(default_value = "Dockerfile")]
    pub paths: Vec<PathBuf>,

    /// Re-resolve images that are already pinned and move them to the current digest
    #[arg(long)]
    pub upgrade: bool,

    /// Docker config file with registry credentials (default: ~/.docker/config.json)
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Reach this registry over plain HTTP (repeatable)
    #[arg(long, value_name = "HOST")]
    pub insecure_registry: Vec<String>,

    /// Per-request registry timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

impl LockArgs {
    pub fn mode(&self) -> LockMode {
        if self.upgrade {
            LockMode::Upgrade
        } else {
            LockMode::Lock
        }
    }

    /// Environment configuration with command-line overrides applied.
    pub fn registry_config(&self) -> Result<RegistryConfig, Box<dyn std::error::Error>> {
        let mut config = RegistryConfig::from_env()?;
        config.add_insecure_registries(self.insecure_registry.iter().cloned());
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
        Ok(config)
    }

    fn credential_store(&self) -> Result<CredentialStore, Box<dyn std::error::Error>> {
        let store = match &self.credentials {
            Some(path) if !path.exists() => {
                return Err(format!("Credential file not found: {}", path.display()).into())
            }
            Some(path) => CredentialStore::load(path)?,
            None => CredentialStore::load_default()?,
        };
        Ok(store.with_env_fallback())
    }
}

pub async fn execute(args: LockArgs, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.registry_config()?;
    let credentials = args.credential_store()?;
    tracing::debug!(
        registries = ?credentials.list_registries(),
        timeout_secs = config.timeout_secs,
        "Loaded registry configuration"
    );

    let client = Arc::new(RegistryClient::new(config, credentials)?);
    let reports = process_files(&args.paths, client, args.mode()).await;

    print!("{}", output::render_reports(&reports, verbose));

    let failed = output::failed_files(&reports);
    if failed > 0 {
        return Err(format!("{} of {} Dockerfiles had failures", failed, reports.len()).into());
    }
    Ok(())
}
