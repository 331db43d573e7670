//! Plugin manifests.
//!
//! A manifest is the JSON form of a feature package: its name, version, the
//! host versions it supports and its declarations.
//!
//! ```json
//! {
//!   "name": "model-registry",
//!   "version": "1.2.0",
//!   "requiredHost": ">=0.1.0",
//!   "extensions": [
//!     { "type": "app.navigation/href",
//!       "flags": { "required": ["MODEL_REGISTRY"] },
//!       "properties": { "id": "registry", "title": "Registry", "href": "/modelRegistry" } }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use hub_extension_sdk::Extension;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};

/// Declarations shipped by one feature package.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub name: String,
    pub version: Version,
    /// Host versions this plugin supports; any when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_host: Option<VersionReq>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

impl PluginManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check that `host` satisfies `required_host`.
    pub fn check_host(&self, host: &Version) -> Result<()> {
        match &self.required_host {
            Some(req) if !req.matches(host) => Err(HubError::IncompatibleHost {
                plugin: self.name.clone(),
                required: req.to_string(),
                actual: host.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Reads manifests from disk.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    dirs: Vec<PathBuf>,
    host_version: Version,
}

impl ManifestLoader {
    pub fn new(host_version: Version) -> Self {
        Self {
            dirs: Vec::new(),
            host_version,
        }
    }

    /// Add a directory to scan.
    pub fn add_dir(&mut self, path: impl Into<PathBuf>) {
        self.dirs.push(path.into());
    }

    pub fn with_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.dirs.extend(dirs);
        self
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Load and check a single manifest file.
    pub async fn load_file(&self, path: &Path) -> Result<PluginManifest> {
        let text = tokio::fs::read_to_string(path).await?;
        let manifest = serde_json::from_str::<PluginManifest>(&text).map_err(|e| {
            HubError::Manifest {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        manifest.check_host(&self.host_version)?;
        Ok(manifest)
    }

    /// Load every `*.json` manifest in the configured directories.
    ///
    /// Files are visited in name order per directory. Unreadable, malformed
    /// and incompatible manifests are skipped with a warning.
    pub async fn discover(&self) -> Vec<PluginManifest> {
        let mut manifests = Vec::new();

        for dir in &self.dirs {
            let mut paths = match list_manifest_files(dir).await {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Cannot read manifest directory");
                    continue;
                }
            };
            paths.sort();

            for path in paths {
                match self.load_file(&path).await {
                    Ok(manifest) => {
                        tracing::debug!(
                            plugin = %manifest.name,
                            version = %manifest.version,
                            path = %path.display(),
                            "Discovered plugin manifest"
                        );
                        manifests.push(manifest);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping plugin manifest");
                    }
                }
            }
        }

        manifests
    }
}

async fn list_manifest_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_manifest_file(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

fn is_manifest_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext == "json")
        .unwrap_or(false)
}
