//! Plugin subsystem
//!
//! Plugins extend the node before it is built. The loader collects the
//! built-in plugins plus any manifests found under `<plugin dir>/plugins`,
//! initializes them, then injects them into a [`PluginRegistry`] that the
//! repository consults when opening its datastore.

pub mod builtin;
pub mod manifest;
pub mod registry;

pub use builtin::{builtin_plugins, MemoryDatastorePlugin, SledDatastorePlugin};
pub use manifest::{ManifestPlugin, PluginKind, PluginManifest};
pub use registry::{DatastoreOpener, PluginRegistry};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Subdirectory of the plugin directory holding manifests
pub const PLUGINS_SUBDIR: &str = "plugins";

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid plugin manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("plugin {plugin} failed to initialize: {reason}")]
    Init { plugin: String, reason: String },
    #[error("plugin {plugin} needs unknown datastore backend {backend}")]
    UnknownBackend { plugin: String, backend: String },
    #[error("datastore kind {0} is already registered")]
    DuplicateDatastore(String),
    #[error("plugin loader is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: LoaderState,
        actual: LoaderState,
    },
}

/// A node extension
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Validate and prepare the plugin. Called once before injection.
    fn init(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Register the plugin's extensions
    fn inject(&self, registry: &mut PluginRegistry) -> Result<(), PluginError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Loaded,
    Initialized,
    Injected,
}

/// Loads, initializes and injects plugins, in that order
pub struct PluginLoader {
    plugins: Vec<Box<dyn Plugin>>,
    state: LoaderState,
}

impl PluginLoader {
    /// Collect built-in plugins and the manifests under `<plugin_dir>/plugins`.
    ///
    /// With no plugin directory, or one without a `plugins` subdirectory,
    /// only the built-in plugins are loaded.
    pub fn load(plugin_dir: Option<&Path>) -> Result<Self, PluginError> {
        let mut plugins = builtin_plugins();

        if let Some(dir) = plugin_dir {
            let manifests_dir = dir.join(PLUGINS_SUBDIR);
            if manifests_dir.is_dir() {
                plugins.extend(load_manifests(&manifests_dir)?);
            } else {
                debug!("No plugins at {}, using built-ins only", manifests_dir.display());
            }
        }

        Ok(Self {
            plugins,
            state: LoaderState::Loaded,
        })
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Names of the loaded plugins, built-ins first
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn initialize(&mut self) -> Result<(), PluginError> {
        self.expect_state(LoaderState::Loaded)?;
        for plugin in &mut self.plugins {
            plugin.init()?;
            debug!("Initialized plugin {} v{}", plugin.name(), plugin.version());
        }
        self.state = LoaderState::Initialized;
        Ok(())
    }

    pub fn inject(&mut self, registry: &mut PluginRegistry) -> Result<(), PluginError> {
        self.expect_state(LoaderState::Initialized)?;
        for plugin in &self.plugins {
            plugin.inject(registry)?;
        }
        self.state = LoaderState::Injected;
        info!(
            "Injected {} plugins, datastores: {:?}",
            self.plugins.len(),
            registry.datastore_kinds()
        );
        Ok(())
    }

    fn expect_state(&self, expected: LoaderState) -> Result<(), PluginError> {
        if self.state != expected {
            return Err(PluginError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}

/// Manifests are applied in file name order so that one may build on another
fn load_manifests(dir: &Path) -> Result<Vec<Box<dyn Plugin>>, PluginError> {
    let read_err = |source| PluginError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut plugins: Vec<Box<dyn Plugin>> = Vec::with_capacity(paths.len());
    for path in paths {
        let manifest = PluginManifest::from_file(&path)?;
        debug!("Found plugin manifest {} at {}", manifest.name, path.display());
        plugins.push(Box::new(ManifestPlugin::new(manifest, path)));
    }
    Ok(plugins)
}
