use thiserror::Error;

/// A3S Lock error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Malformed image reference or digest
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Dockerfile syntax the parser cannot accept
    #[error("Dockerfile error: line {line}: {message}")]
    DockerfileError { line: usize, message: String },

    /// Repository, tag or digest absent on the registry
    #[error("Not found: {registry} - {message}")]
    NotFoundError { registry: String, message: String },

    /// Credentials rejected or missing
    #[error("Authentication failed: {registry} - {message}")]
    AuthError { registry: String, message: String },

    /// Registry answered with something we cannot interpret
    #[error("Registry protocol error: {registry} - {message}")]
    ProtocolError { registry: String, message: String },

    /// Connection failure or timeout
    #[error("Network error: {registry} - {message}")]
    NetworkError { registry: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse classification of a [`LockError`], used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    NotFound,
    Auth,
    Protocol,
    Network,
    Config,
    Io,
}

impl LockError {
    /// Map the error onto the reporting taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LockError::ParseError(_) | LockError::DockerfileError { .. } => ErrorKind::Parse,
            LockError::NotFoundError { .. } => ErrorKind::NotFound,
            LockError::AuthError { .. } => ErrorKind::Auth,
            LockError::ProtocolError { .. } => ErrorKind::Protocol,
            LockError::NetworkError { .. } => ErrorKind::Network,
            LockError::ConfigError(_) | LockError::SerializationError(_) => ErrorKind::Config,
            LockError::IoError(_) => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::NotFound => "not found",
            ErrorKind::Auth => "authentication error",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::Network => "network error",
            ErrorKind::Config => "configuration error",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(name)
    }
}

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        LockError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        LockError::SerializationError(err.to_string())
    }
}

/// Result type alias for A3S Lock operations
pub type Result<T> = std::result::Result<T, LockError>;
