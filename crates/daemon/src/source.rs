//! Configuration document loading

use std::fs;
use std::path::PathBuf;

use tracing::trace;

use crate::error::{ExtractError, ExtractResult};
use crate::material::CertificateMaterial;

/// Produces fresh certificate material on every call
pub trait ConfigLoader: Send + Sync {
    /// Read and parse the current configuration
    fn load(&self) -> ExtractResult<CertificateMaterial>;

    /// Human-readable description of the source, for log lines
    fn describe(&self) -> String;
}

/// Loads material from a JSON document on disk
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    path: PathBuf,
    section: String,
}

impl FileConfigLoader {
    pub fn new(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            section: section.into(),
        }
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load(&self) -> ExtractResult<CertificateMaterial> {
        let raw = fs::read_to_string(&self.path).map_err(|source| ExtractError::ConfigRead {
            path: self.path.clone(),
            source,
        })?;

        trace!(path = %self.path.display(), bytes = raw.len(), "Read configuration document");

        CertificateMaterial::from_document(&raw, &self.section)
    }

    fn describe(&self) -> String {
        format!("{} [{}]", self.path.display(), self.section)
    }
}
