//! Error types for certificate extraction

use std::path::PathBuf;

use thiserror::Error;

/// Result type for extraction operations
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that can occur while extracting and writing certificate material
///
/// None of these are fatal to the daemon: they are logged where they are
/// detected and the next trigger retries
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Configuration document is missing or unreadable
    #[error("failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration document is not valid JSON or lacks the TLS fields
    #[error("invalid config: {0}")]
    ConfigParse(String),

    /// Certificate is not well-formed or its expiry cannot be read
    #[error("invalid certificate: {0}")]
    CertificateParse(String),

    /// I/O failure on an output target
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// Short machine-friendly label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::ConfigRead { .. } => "config_read",
            ExtractError::ConfigParse(_) => "config_parse",
            ExtractError::CertificateParse(_) => "certificate_parse",
            ExtractError::Write { .. } => "write",
        }
    }
}
