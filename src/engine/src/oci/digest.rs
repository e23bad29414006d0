//! Content digests (`algorithm:hex`).

use std::fmt;
use std::str::FromStr;

use a3s_lock_core::error::{LockError, Result};
use sha2::{Digest as _, Sha256};

/// Content-addressed identifier of a manifest, e.g. `sha256:0944c6...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Parse and validate `algorithm:hex`.
    pub fn parse(s: &str) -> Result<Self> {
        let (algorithm, hex) = s.split_once(':').ok_or_else(|| {
            LockError::ParseError(format!(
                "Invalid digest '{}': expected algorithm:hex",
                s
            ))
        })?;

        let expected_len = match algorithm {
            "sha256" => 64,
            "sha384" => 96,
            "sha512" => 128,
            _ => {
                return Err(LockError::ParseError(format!(
                    "Unsupported digest algorithm '{}' in '{}'",
                    algorithm, s
                )))
            }
        };

        if hex.len() != expected_len {
            return Err(LockError::ParseError(format!(
                "Invalid {} digest length in '{}': expected {} hex characters, got {}",
                algorithm,
                s,
                expected_len,
                hex.len()
            )));
        }
        if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(LockError::ParseError(format!(
                "Invalid digest '{}': hex part must be lower-case hexadecimal",
                s
            )));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    /// SHA-256 digest of raw bytes.
    pub fn sha256_of(data: &[u8]) -> Self {
        Self {
            algorithm: "sha256".to_string(),
            hex: hex::encode(Sha256::digest(data)),
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
