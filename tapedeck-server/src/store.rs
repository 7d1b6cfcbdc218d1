//! Artifact store.
//!
//! Resolves session names to `.tdr` paths under a data directory and
//! handles listing, metadata extraction and deletion.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use directories::ProjectDirs;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use tapedeck_core::{Error, Result};

use super::artifact::{TdrHeader, TDR_EXTENSION};

/// Default artifact directory for this machine/user.
pub fn default_artifact_dir() -> PathBuf {
    let mut path = ProjectDirs::from("", "", "tapedeck")
        .map(|dirs| dirs.data_dir().to_owned())
        .unwrap_or_else(|| PathBuf::from("."));
    path.push("recordings");
    path
}

/// Information about one stored artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    /// Session name (filename without extension)
    pub name: String,
    /// Full path to the file
    #[serde(skip_serializing)]
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Number of records
    pub record_count: u64,
    /// File modification time (Unix timestamp ms)
    pub modified_ms: u64,
}

/// Manager for the artifact directory
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store over the default data directory
    pub fn new() -> Self {
        Self::with_base_dir(default_artifact_dir())
    }

    /// Create with a custom base directory (for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&base_dir) {
            error!("Failed to create artifact directory: {}", e);
        } else {
            debug!("Artifact directory: {}", base_dir.display());
        }
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Full path for a session name. A trailing `.tdr` on the name is
    /// tolerated and stripped first.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        let stem = name.strip_suffix(".tdr").unwrap_or(name);
        self.base_dir.join(format!("{}.{}", stem, TDR_EXTENSION))
    }

    /// Whether an artifact exists under this session name
    pub fn has_artifact(&self, name: &str) -> bool {
        self.artifact_path(name).exists()
    }

    /// List all stored artifacts, newest first
    pub fn list_artifacts(&self) -> Vec<ArtifactInfo> {
        let mut artifacts = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.base_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == TDR_EXTENSION) {
                    if let Some(info) = self.artifact_info(&path) {
                        artifacts.push(info);
                    }
                }
            }
        }

        artifacts.sort_by(|a, b| b.modified_ms.cmp(&a.modified_ms));
        artifacts
    }

    /// Metadata for the artifact at `path`, read from its header
    pub fn artifact_info(&self, path: &Path) -> Option<ArtifactInfo> {
        let name = path.file_stem()?.to_str()?.to_string();

        let metadata = fs::metadata(path).ok()?;
        let size = metadata.len();
        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        let header = TdrHeader::read(&mut reader).ok()?;

        Some(ArtifactInfo {
            name,
            path: path.to_path_buf(),
            size,
            record_count: header.record_count,
            modified_ms,
        })
    }

    /// Delete the artifact stored under `name`
    pub fn delete_artifact(&self, name: &str) -> Result<()> {
        let path = self.artifact_path(name);

        if !path.exists() {
            return Err(Error::ArtifactNotFound {
                name: name.to_string(),
            });
        }

        // Path traversal in the name must not escape the store
        if !self.is_safe_path(&path) {
            return Err(Error::Corrupt(format!("invalid artifact name: {}", name)));
        }

        fs::remove_file(&path)?;
        info!("Deleted artifact: {}", path.display());
        Ok(())
    }

    /// Default session name: local timestamp of the recording start
    pub fn default_name(&self) -> String {
        chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
    }

    /// Check that a path is within our base directory
    fn is_safe_path(&self, path: &Path) -> bool {
        match path.canonicalize() {
            Ok(canonical) => match self.base_dir.canonicalize() {
                Ok(base) => canonical.starts_with(&base),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}
