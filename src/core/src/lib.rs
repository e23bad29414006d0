//! A3S Lock Core - Foundational Types
//!
//! Error taxonomy and configuration shared by the lock engine and the CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{ClientProtocol, LockMode, RegistryConfig};
pub use error::{ErrorKind, LockError, Result};

/// A3S Lock version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
