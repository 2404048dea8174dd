//! External plugins declared by JSON manifests
//!
//! A manifest in `<plugin dir>/plugins/` describes an extension built
//! from components the node already has, e.g.
//!
//! ```json
//! { "name": "archive", "kind": "datastore", "datastore": "archive",
//!   "backend": "sled", "max_size_gb": 50 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Plugin, PluginError, PluginRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PluginKind {
    /// Named datastore kind backed by a registered datastore
    Datastore {
        datastore: String,
        backend: String,
        /// Overrides the repository's size cap when set
        #[serde(default)]
        max_size_gb: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(flatten)]
    pub kind: PluginKind,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

impl PluginManifest {
    pub fn from_file(path: &Path) -> Result<Self, PluginError> {
        let raw = std::fs::read(path).map_err(|source| PluginError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| PluginError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Plugin backed by a manifest file
#[derive(Debug)]
pub struct ManifestPlugin {
    manifest: PluginManifest,
    source: PathBuf,
}

impl ManifestPlugin {
    pub fn new(manifest: PluginManifest, source: PathBuf) -> Self {
        Self { manifest, source }
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }
}

impl Plugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn version(&self) -> &str {
        &self.manifest.version
    }

    fn init(&mut self) -> Result<(), PluginError> {
        let invalid = |reason: &str| PluginError::Init {
            plugin: self.manifest.name.clone(),
            reason: format!("{} ({})", reason, self.source.display()),
        };

        if self.manifest.name.trim().is_empty() {
            return Err(invalid("plugin name is empty"));
        }
        match &self.manifest.kind {
            PluginKind::Datastore {
                datastore, backend, ..
            } => {
                if datastore.trim().is_empty() || backend.trim().is_empty() {
                    return Err(invalid("datastore and backend must be set"));
                }
                if datastore == backend {
                    return Err(invalid("datastore cannot be its own backend"));
                }
            }
        }
        Ok(())
    }

    fn inject(&self, registry: &mut PluginRegistry) -> Result<(), PluginError> {
        match &self.manifest.kind {
            PluginKind::Datastore {
                datastore,
                backend,
                max_size_gb,
            } => {
                let opener =
                    registry
                        .datastore(backend)
                        .ok_or_else(|| PluginError::UnknownBackend {
                            plugin: self.manifest.name.clone(),
                            backend: backend.clone(),
                        })?;
                let cap = *max_size_gb;
                registry.register_datastore(
                    datastore.clone(),
                    Arc::new(move |path: &Path, max_size_gb: u64| {
                        opener(path, cap.unwrap_or(max_size_gb))
                    }),
                )
            }
        }
    }
}
