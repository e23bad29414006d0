//! A3S Lock Engine - pins Dockerfile base images to digests.
//!
//! This crate provides the image reference model, the registry digest
//! resolver, the byte-preserving Dockerfile model, the lock engine and the
//! file rewriter used by the `a3s-lock` CLI.

#![allow(clippy::result_large_err)]

pub mod dockerfile;
pub mod lock;
pub mod oci;
pub mod report;
pub mod rewrite;

// Re-export common types
pub use dockerfile::{BaseImage, DockerfileDocument, FromInstruction};
pub use lock::{CachingResolver, DigestResolver, LockDecision, LockEngine, LockOutcome};
pub use oci::{CredentialStore, Digest, ImageReference, RegistryAuth, RegistryClient};
pub use report::{FileReport, LockSummary};
pub use rewrite::{process_file, process_files, write_atomic};

/// A3S Lock Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
