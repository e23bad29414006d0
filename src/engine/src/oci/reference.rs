//! Image reference parsing.
//!
//! Parses references like `ghcr.io/a3s-lab/lock:v0.1.0@sha256:...` into
//! structured components. Components are kept exactly as written so that a
//! parsed reference serializes back to the same text; defaults are applied
//! through accessors only.

use a3s_lock_core::error::{LockError, Result};

use super::digest::Digest;

/// Default registry when none is specified.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Host serving the registry API for Docker Hub.
pub const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

/// Default tag when neither tag nor digest is specified.
pub const DEFAULT_TAG: &str = "latest";

const MAX_TAG_LEN: usize = 128;

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageReference {
    /// Registry hostname with optional port (e.g., "ghcr.io", "localhost:5000")
    pub registry: Option<String>,
    /// Repository path as written (e.g., "python", "a3s-lab/lock")
    pub repository: String,
    /// Tag (e.g., "3.8-slim-buster")
    pub tag: Option<String>,
    /// Manifest digest
    pub digest: Option<Digest>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `nginx`
    /// - `nginx:1.25`
    /// - `myuser/myimage`
    /// - `ghcr.io/org/image:tag`
    /// - `localhost:5000/image` (port, not a tag)
    /// - `ghcr.io/org/image@sha256:abc...`
    /// - `nginx:1.25@sha256:abc...`
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(LockError::ParseError("Empty image reference".to_string()));
        }

        // Split off digest first (first @)
        let (name_tag, digest) = match reference.split_once('@') {
            Some((name_tag, digest)) => (name_tag, Some(Digest::parse(digest)?)),
            None => (reference, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag
        let (name, tag) = match name_tag.rfind(':') {
            Some(pos) if !name_tag[pos + 1..].contains('/') => {
                (&name_tag[..pos], Some(&name_tag[pos + 1..]))
            }
            _ => (name_tag, None),
        };

        if let Some(tag) = tag {
            validate_tag(tag, reference)?;
        }

        let (registry, repository) = split_registry_repository(name, reference)?;

        Ok(ImageReference {
            registry,
            repository,
            tag: tag.map(str::to_string),
            digest,
        })
    }

    /// Render `[registry/]repository[:tag][@digest]`, omitting unset parts.
    pub fn full_reference(&self) -> String {
        let mut s = String::new();
        if let Some(ref registry) = self.registry {
            s.push_str(registry);
            s.push('/');
        }
        s.push_str(&self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(&digest.to_string());
        }
        s
    }

    /// Copy of this reference pinned to `digest`, keeping the tag visible.
    pub fn with_digest(&self, digest: Digest) -> Self {
        Self {
            digest: Some(digest),
            ..self.clone()
        }
    }

    /// Registry, falling back to Docker Hub.
    pub fn registry_or_default(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    /// Tag, falling back to `latest`.
    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// Whether this reference points at Docker Hub.
    pub fn is_docker_hub(&self) -> bool {
        matches!(
            self.registry_or_default(),
            "docker.io" | "index.docker.io" | "registry-1.docker.io"
        )
    }

    /// Host (with port) serving the registry API.
    pub fn api_host(&self) -> &str {
        if self.is_docker_hub() {
            DOCKER_HUB_API_HOST
        } else {
            self.registry_or_default()
        }
    }

    /// Repository name as used in API paths (`library/` for official Hub images).
    pub fn api_repository(&self) -> String {
        if self.is_docker_hub() && !self.repository.contains('/') {
            format!("library/{}", self.repository)
        } else {
            self.repository.clone()
        }
    }

    /// Manifest reference to query: the tag when present, else the digest,
    /// else `latest`.
    pub fn lookup_key(&self) -> String {
        match (&self.tag, &self.digest) {
            (Some(tag), _) => tag.clone(),
            (None, Some(digest)) => digest.to_string(),
            (None, None) => DEFAULT_TAG.to_string(),
        }
    }
}

/// Split a name into registry and repository components.
///
/// The first component is a registry when it looks like a hostname
/// (contains a dot or colon, or is "localhost").
fn split_registry_repository(name: &str, reference: &str) -> Result<(Option<String>, String)> {
    let (registry, repository) = match name.split_once('/') {
        Some((first, rest)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            (Some(first.to_string()), rest)
        }
        _ => (None, name),
    };

    if repository.is_empty() {
        return Err(LockError::ParseError(format!(
            "Empty repository in reference '{}'",
            reference
        )));
    }
    if repository.split('/').any(str::is_empty) {
        return Err(LockError::ParseError(format!(
            "Empty path component in reference '{}'",
            reference
        )));
    }

    Ok((registry, repository.to_string()))
}

fn validate_tag(tag: &str, reference: &str) -> Result<()> {
    let valid_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    let valid = match tag.chars().next() {
        Some(first) => {
            (first.is_ascii_alphanumeric() || first == '_')
                && tag.len() <= MAX_TAG_LEN
                && tag.chars().all(valid_char)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(LockError::ParseError(format!(
            "Invalid tag '{}' in reference '{}'",
            tag, reference
        )))
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";

    #[test]
    fn test_parse_simple_name() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.registry, None);
        assert_eq!(r.repository, "nginx");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest, None);
        assert_eq!(r.registry_or_default(), "docker.io");
        assert_eq!(r.tag_or_default(), "latest");
    }

    #[test]
    fn test_parse_name_with_tag() {
        let r = ImageReference::parse("python:3.8-slim-buster").unwrap();
        assert_eq!(r.repository, "python");
        assert_eq!(r.tag.as_deref(), Some("3.8-slim-buster"));
    }

    #[test]
    fn test_parse_user_repo_with_tag() {
        let r = ImageReference::parse("myuser/myimage:v1.0").unwrap();
        assert_eq!(r.registry, None);
        assert_eq!(r.repository, "myuser/myimage");
        assert_eq!(r.tag.as_deref(), Some("v1.0"));
    }

    #[test]
    fn test_parse_custom_registry() {
        let r = ImageReference::parse("ghcr.io/a3s-lab/lock:v0.1.0").unwrap();
        assert_eq!(r.registry.as_deref(), Some("ghcr.io"));
        assert_eq!(r.repository, "a3s-lab/lock");
        assert_eq!(r.tag.as_deref(), Some("v0.1.0"));
    }

    #[test]
    fn test_parse_digest_only() {
        let r = ImageReference::parse(&format!("ghcr.io/a3s-lab/lock@{DIGEST}")).unwrap();
        assert_eq!(r.registry.as_deref(), Some("ghcr.io"));
        assert_eq!(r.repository, "a3s-lab/lock");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest.unwrap().to_string(), DIGEST);
    }

    #[test]
    fn test_parse_tag_and_digest() {
        let r = ImageReference::parse(&format!("python:3.8@{DIGEST}")).unwrap();
        assert_eq!(r.repository, "python");
        assert_eq!(r.tag.as_deref(), Some("3.8"));
        assert!(r.digest.is_some());
    }

    #[test]
    fn test_parse_localhost_registry() {
        let r = ImageReference::parse("localhost/myimage:test").unwrap();
        assert_eq!(r.registry.as_deref(), Some("localhost"));
        assert_eq!(r.repository, "myimage");
        assert_eq!(r.tag.as_deref(), Some("test"));
    }

    #[test]
    fn test_parse_registry_with_port() {
        let r = ImageReference::parse("myregistry.io:5000/myimage:v1").unwrap();
        assert_eq!(r.registry.as_deref(), Some("myregistry.io:5000"));
        assert_eq!(r.repository, "myimage");
        assert_eq!(r.tag.as_deref(), Some("v1"));
    }

    #[test]
    fn test_parse_registry_with_port_no_tag() {
        let r = ImageReference::parse("localhost:5000/team/app").unwrap();
        assert_eq!(r.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(r.repository, "team/app");
        assert_eq!(r.tag, None);
    }

    #[test]
    fn test_parse_deep_repository_path() {
        let r = ImageReference::parse("ghcr.io/org/sub/image:v1").unwrap();
        assert_eq!(r.registry.as_deref(), Some("ghcr.io"));
        assert_eq!(r.repository, "org/sub/image");
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "   ",
            ":tag",
            "ghcr.io/",
            "a//b",
            "python:",
            "python:-dash",
            "python@sha256:abc",
            "python@invaliddigest",
        ] {
            assert!(ImageReference::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_round_trip() {
        let digest_only = format!("python@{DIGEST}");
        let fully_locked = format!("quay.io/org/app:3.1@{DIGEST}");
        for text in [
            "nginx",
            "nginx:1.25",
            "library/nginx:1.25",
            "ghcr.io/org/sub/image:v1",
            "localhost:5000/app",
            "localhost:5000/app:dev",
            digest_only.as_str(),
            fully_locked.as_str(),
        ] {
            let r = ImageReference::parse(text).unwrap();
            assert_eq!(r.to_string(), text);
        }
    }

    #[test]
    fn test_with_digest_keeps_tag() {
        let r = ImageReference::parse("python:3.8-slim-buster").unwrap();
        let locked = r.with_digest(Digest::parse(DIGEST).unwrap());
        assert_eq!(locked.to_string(), format!("python:3.8-slim-buster@{DIGEST}"));
    }

    #[test]
    fn test_with_digest_does_not_invent_tag() {
        let r = ImageReference::parse("debian").unwrap();
        let locked = r.with_digest(Digest::parse(DIGEST).unwrap());
        assert_eq!(locked.to_string(), format!("debian@{DIGEST}"));
    }

    #[test]
    fn test_equality_is_case_sensitive() {
        let a = ImageReference::parse("Debian:11").unwrap();
        let b = ImageReference::parse("debian:11").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, ImageReference::parse("Debian:11").unwrap());
    }

    #[test]
    fn test_api_mapping_docker_hub() {
        let r = ImageReference::parse("python:3.8").unwrap();
        assert_eq!(r.api_host(), "registry-1.docker.io");
        assert_eq!(r.api_repository(), "library/python");

        let r = ImageReference::parse("docker.io/grafana/grafana").unwrap();
        assert_eq!(r.api_host(), "registry-1.docker.io");
        assert_eq!(r.api_repository(), "grafana/grafana");
    }

    #[test]
    fn test_api_mapping_custom_registry() {
        let r = ImageReference::parse("quay.io/coreos/etcd").unwrap();
        assert_eq!(r.api_host(), "quay.io");
        assert_eq!(r.api_repository(), "coreos/etcd");
    }

    #[test]
    fn test_lookup_key() {
        assert_eq!(ImageReference::parse("nginx").unwrap().lookup_key(), "latest");
        assert_eq!(ImageReference::parse("nginx:1.25").unwrap().lookup_key(), "1.25");
        assert_eq!(
            ImageReference::parse(&format!("nginx:1.25@{DIGEST}")).unwrap().lookup_key(),
            "1.25"
        );
        assert_eq!(
            ImageReference::parse(&format!("nginx@{DIGEST}")).unwrap().lookup_key(),
            DIGEST
        );
    }
}
