//! Cluster manifest loading and file I/O operations.

use super::types::ClusterManifest;
use crate::ClusterError;
use std::path::Path;

/// Serialization format of a manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
    /// Unrecognised extension: JSON is tried first, then YAML.
    Detect,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => ManifestFormat::Json,
            Some("yaml" | "yml") => ManifestFormat::Yaml,
            _ => ManifestFormat::Detect,
        }
    }
}

/// Manifest loader with file I/O operations.
pub struct ManifestLoader;

impl ManifestLoader {
    /// Load and validate a manifest, choosing the format by file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ClusterManifest, ClusterError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClusterError::from_io_error(e, "manifest loading"))?;
        Self::parse(&content, ManifestFormat::from_path(path))
    }

    /// Parse and validate manifest text.
    pub fn parse(content: &str, format: ManifestFormat) -> Result<ClusterManifest, ClusterError> {
        let manifest: ClusterManifest = match format {
            ManifestFormat::Json => serde_json::from_str(content)
                .map_err(|e| ClusterError::from_parse_error(e, "JSON manifest parsing"))?,
            ManifestFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| ClusterError::from_parse_error(e, "YAML manifest parsing"))?,
            ManifestFormat::Detect => serde_json::from_str(content)
                .or_else(|_| serde_yaml::from_str(content))
                .map_err(|e| {
                    ClusterError::from_parse_error(e, "manifest parsing (tried both JSON and YAML)")
                })?,
        };
        manifest.validate()?;
        Ok(manifest)
    }
}
