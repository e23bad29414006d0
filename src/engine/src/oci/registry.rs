//! Registry client for resolving manifest digests.
//!
//! Speaks the Docker Registry HTTP API V2 directly over `reqwest`:
//! `HEAD /v2/<name>/manifests/<reference>`, answering `401` challenges with a
//! bearer token (or basic credentials) and retrying once. Manifest lists and
//! OCI indexes are never descended into; the digest of the list itself is the
//! platform-independent pin.

use a3s_lock_core::config::RegistryConfig;
use a3s_lock_core::error::{LockError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde::Deserialize;

use super::challenge::{AuthChallenge, AuthScheme};
use super::credentials::CredentialStore;
use super::digest::Digest;
use super::reference::ImageReference;
use crate::lock::DigestResolver;

/// Docker image manifest, schema 2.
pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// Docker multi-architecture manifest list.
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
/// OCI image manifest.
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
/// OCI image index.
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Media types sent in the `Accept` header of manifest requests.
pub const MANIFEST_MEDIA_TYPES: &[&str] = &[
    DOCKER_MANIFEST_V2,
    DOCKER_MANIFEST_LIST,
    OCI_MANIFEST,
    OCI_INDEX,
];

const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// Authentication credentials for a container registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.credentials().is_none()
    }

    /// `(username, password)` when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }

    /// Value for an `Authorization: Basic ...` header.
    fn basic_header(&self) -> Option<String> {
        self.credentials()
            .map(|(u, p)| format!("Basic {}", STANDARD.encode(format!("{}:{}", u, p))))
    }
}

/// Classified response to a manifest request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ManifestOutcome {
    /// 2xx; the digest header may be missing
    Found {
        digest: Option<String>,
        media_type: Option<String>,
    },
    /// 401 with the raw `WWW-Authenticate` value, if any
    ChallengeRequired(Option<String>),
    /// 403
    Denied,
    /// 404
    NotFound,
    /// Anything else
    Unexpected(StatusCode),
}

fn classify(status: StatusCode, headers: &HeaderMap) -> ManifestOutcome {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    match status {
        s if s.is_success() => ManifestOutcome::Found {
            digest: header(DOCKER_CONTENT_DIGEST).filter(|d| !d.is_empty()),
            media_type: header(CONTENT_TYPE.as_str()),
        },
        StatusCode::UNAUTHORIZED => ManifestOutcome::ChallengeRequired(header(WWW_AUTHENTICATE.as_str())),
        StatusCode::FORBIDDEN => ManifestOutcome::Denied,
        StatusCode::NOT_FOUND => ManifestOutcome::NotFound,
        other => ManifestOutcome::Unexpected(other),
    }
}

fn is_manifest_list(media_type: Option<&str>) -> bool {
    media_type.map_or(false, |m| {
        let m = m.split(';').next().unwrap_or(m).trim();
        m == DOCKER_MANIFEST_LIST || m == OCI_INDEX
    })
}

/// Token endpoint response. Registries use either field name.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Resolves manifest digests from container registries.
///
/// Holds no mutable state; one client can serve many files concurrently.
pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryConfig,
    credentials: CredentialStore,
}

impl RegistryClient {
    /// Create a client with explicit configuration and credentials.
    pub fn new(config: RegistryConfig, credentials: CredentialStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LockError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    /// Resolve the current manifest digest for `reference`.
    ///
    /// Looks up the tag when present, otherwise the existing digest,
    /// otherwise `latest`.
    pub async fn resolve_digest(&self, reference: &ImageReference) -> Result<Digest> {
        let registry = reference.registry_or_default();
        let url = self.manifest_url(reference);
        let mut authorization: Option<String> = None;

        tracing::debug!(reference = %reference, url = %url, "Resolving manifest digest");

        loop {
            let outcome = self.head_manifest(&url, authorization.as_deref(), registry).await?;
            match outcome {
                ManifestOutcome::Found {
                    digest: Some(digest),
                    media_type,
                } => {
                    let digest = parse_digest_header(registry, &digest)?;
                    log_resolved(reference, &digest, media_type.as_deref());
                    return Ok(digest);
                }
                // Some registries only answer GET on manifests
                ManifestOutcome::Found { digest: None, .. }
                | ManifestOutcome::Unexpected(StatusCode::METHOD_NOT_ALLOWED) => {
                    return self
                        .get_manifest_digest(reference, &url, authorization.as_deref())
                        .await;
                }
                ManifestOutcome::ChallengeRequired(header) if authorization.is_none() => {
                    authorization =
                        Some(self.authorize(reference, header.as_deref()).await?);
                }
                other => return Err(outcome_error(registry, &url, other)),
            }
        }
    }

    fn manifest_url(&self, reference: &ImageReference) -> String {
        let host = reference.api_host();
        format!(
            "{}://{}/v2/{}/manifests/{}",
            self.config.protocol.scheme_for(host),
            host,
            reference.api_repository(),
            reference.lookup_key()
        )
    }

    async fn head_manifest(
        &self,
        url: &str,
        authorization: Option<&str>,
        registry: &str,
    ) -> Result<ManifestOutcome> {
        let response = self
            .manifest_request(self.http.head(url), authorization)
            .send()
            .await
            .map_err(|e| network_error(registry, e))?;
        Ok(classify(response.status(), response.headers()))
    }

    /// Fallback for registries that omit `Docker-Content-Digest` on `HEAD`.
    async fn get_manifest_digest(
        &self,
        reference: &ImageReference,
        url: &str,
        authorization: Option<&str>,
    ) -> Result<Digest> {
        let registry = reference.registry_or_default();
        let response = self
            .manifest_request(self.http.get(url), authorization)
            .send()
            .await
            .map_err(|e| network_error(registry, e))?;

        match classify(response.status(), response.headers()) {
            ManifestOutcome::Found { digest, media_type } => {
                let body = response.bytes().await.map_err(|e| network_error(registry, e))?;
                let digest = match digest {
                    Some(header) => parse_digest_header(registry, &header)?,
                    None => {
                        tracing::debug!(
                            reference = %reference,
                            "No digest header, hashing manifest body"
                        );
                        Digest::sha256_of(&body)
                    }
                };
                log_resolved(reference, &digest, media_type.as_deref());
                Ok(digest)
            }
            other => Err(outcome_error(registry, url, other)),
        }
    }

    fn manifest_request(
        &self,
        request: reqwest::RequestBuilder,
        authorization: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = request.header(ACCEPT, MANIFEST_MEDIA_TYPES.join(", "));
        match authorization {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    /// Answer a `401` challenge, returning the `Authorization` header value.
    async fn authorize(&self, reference: &ImageReference, header: Option<&str>) -> Result<String> {
        let registry = reference.registry_or_default();
        let header = header.ok_or_else(|| LockError::ProtocolError {
            registry: registry.to_string(),
            message: "401 response without WWW-Authenticate header".to_string(),
        })?;
        let challenge = AuthChallenge::parse(header).map_err(|message| LockError::ProtocolError {
            registry: registry.to_string(),
            message: format!("Malformed WWW-Authenticate header: {}", message),
        })?;
        let auth = self.credentials.get(registry);

        match challenge.scheme {
            AuthScheme::Basic => auth.basic_header().ok_or_else(|| LockError::AuthError {
                registry: registry.to_string(),
                message: "Registry requires credentials but none are configured".to_string(),
            }),
            AuthScheme::Bearer => {
                let token = self.fetch_token(reference, &challenge, &auth).await?;
                Ok(format!("Bearer {}", token))
            }
        }
    }

    async fn fetch_token(
        &self,
        reference: &ImageReference,
        challenge: &AuthChallenge,
        auth: &RegistryAuth,
    ) -> Result<String> {
        let registry = reference.registry_or_default();
        let realm = challenge.realm.as_deref().ok_or_else(|| LockError::ProtocolError {
            registry: registry.to_string(),
            message: "Bearer challenge without realm".to_string(),
        })?;
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", reference.api_repository()));

        let mut request = self.http.get(realm).query(&[("scope", scope.as_str())]);
        if let Some(service) = &challenge.service {
            request = request.query(&[("service", service.as_str())]);
        }
        if let Some((username, password)) = auth.credentials() {
            request = request.basic_auth(username, Some(password));
        }

        tracing::debug!(realm = %realm, scope = %scope, "Requesting registry token");

        let response = request.send().await.map_err(|e| network_error(registry, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LockError::AuthError {
                registry: registry.to_string(),
                message: format!("Token request to {} failed with status {}", realm, status),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| LockError::ProtocolError {
            registry: registry.to_string(),
            message: format!("Invalid token response from {}: {}", realm, e),
        })?;

        body.token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LockError::ProtocolError {
                registry: registry.to_string(),
                message: format!("Token response from {} contains no token", realm),
            })
    }
}

#[async_trait]
impl DigestResolver for RegistryClient {
    async fn resolve(&self, reference: &ImageReference) -> Result<Digest> {
        self.resolve_digest(reference).await
    }
}

fn log_resolved(reference: &ImageReference, digest: &Digest, media_type: Option<&str>) {
    if is_manifest_list(media_type) {
        tracing::debug!(
            reference = %reference,
            digest = %digest,
            "Resolved to multi-platform manifest list"
        );
    } else {
        tracing::debug!(reference = %reference, digest = %digest, "Resolved manifest digest");
    }
}

fn parse_digest_header(registry: &str, value: &str) -> Result<Digest> {
    Digest::parse(value).map_err(|e| LockError::ProtocolError {
        registry: registry.to_string(),
        message: format!("Invalid Docker-Content-Digest header: {}", e),
    })
}

fn network_error(registry: &str, err: reqwest::Error) -> LockError {
    let message = if err.is_timeout() {
        format!("Request timed out: {}", err)
    } else {
        err.to_string()
    };
    LockError::NetworkError {
        registry: registry.to_string(),
        message,
    }
}

fn outcome_error(registry: &str, url: &str, outcome: ManifestOutcome) -> LockError {
    let registry = registry.to_string();
    match outcome {
        ManifestOutcome::NotFound => LockError::NotFoundError {
            registry,
            message: format!("Manifest not found: {}", url),
        },
        ManifestOutcome::ChallengeRequired(_) => LockError::AuthError {
            registry,
            message: format!("Credentials rejected for {}", url),
        },
        ManifestOutcome::Denied => LockError::AuthError {
            registry,
            message: format!("Access denied to {}", url),
        },
        ManifestOutcome::Unexpected(status) => LockError::ProtocolError {
            registry,
            message: format!("Unexpected status {} from {}", status, url),
        },
        ManifestOutcome::Found { .. } => LockError::ProtocolError {
            registry,
            message: format!("Unexpected manifest response from {}", url),
        },
    }
}
