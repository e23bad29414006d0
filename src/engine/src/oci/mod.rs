//! OCI registry support for A3S Lock.
//!
//! This module covers everything needed to turn a mutable image tag into an
//! immutable manifest digest:
//!
//! - Image reference parsing and serialization
//! - Content digests
//! - `WWW-Authenticate` challenge parsing
//! - Registry client (Docker Registry HTTP API V2)
//! - Read-only credential store
//!
//! # Resolution flow
//!
//! ```text
//! HEAD /v2/<name>/manifests/<tag>
//!   ├── 2xx + Docker-Content-Digest ───────────────► digest
//!   ├── 2xx without header ──► GET, header or sha256(body)
//!   ├── 401 + WWW-Authenticate ──► token from realm ──► retry once
//!   ├── 403 / second 401 ──► AuthError
//!   └── 404 ──► NotFoundError
//! ```

mod challenge;
pub mod credentials;
mod digest;
pub mod reference;
pub mod registry;

pub use challenge::{AuthChallenge, AuthScheme};
pub use credentials::CredentialStore;
pub use digest::Digest;
pub use reference::ImageReference;
pub use registry::{RegistryAuth, RegistryClient};
