//! On-disk node repository
//!
//! Layout:
//! - `version`: repository format version
//! - `config`: JSON [`RepoConfig`]
//! - `blocks/`: datastore directory (name set by the config)

pub mod config;
pub mod ephemeral;

pub use config::{AddressesConfig, DatastoreConfig, IdentityConfig, RepoConfig};

use libp2p::{identity::Keypair, PeerId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::plugins::PluginRegistry;
use crate::storage::{BlockStore, StorageError};

pub const CONFIG_FILE: &str = "config";
pub const VERSION_FILE: &str = "version";
pub const REPO_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("repository already initialized at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("no repository at {0}")]
    NotInitialized(PathBuf),
    #[error("repository version {found} is not supported (expected {expected})")]
    VersionMismatch { found: String, expected: u32 },
    #[error("invalid repository config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("invalid identity: {0}")]
    Identity(String),
    #[error("invalid listen address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },
    #[error("no plugin provides datastore kind {0}")]
    UnknownDatastore(String),
    #[error("datastore error: {0}")]
    Storage(#[from] StorageError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> RepoError + '_ {
    move |source| RepoError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// An opened repository
#[derive(Debug)]
pub struct Repository {
    path: PathBuf,
    config: RepoConfig,
    keypair: Keypair,
    blocks: Arc<BlockStore>,
}

impl Repository {
    pub fn is_initialized(path: &Path) -> bool {
        path.join(CONFIG_FILE).is_file()
    }

    /// Write a new repository at `path`, creating the directory if needed
    pub fn init(path: &Path, config: &RepoConfig) -> Result<(), RepoError> {
        if Self::is_initialized(path) {
            return Err(RepoError::AlreadyInitialized(path.to_path_buf()));
        }

        std::fs::create_dir_all(path).map_err(io_err(path))?;

        let datastore_dir = path.join(&config.datastore.path);
        std::fs::create_dir_all(&datastore_dir).map_err(io_err(&datastore_dir))?;

        let config_path = path.join(CONFIG_FILE);
        let raw = serde_json::to_vec_pretty(config)?;
        std::fs::write(&config_path, raw).map_err(io_err(&config_path))?;

        let version_path = path.join(VERSION_FILE);
        std::fs::write(&version_path, REPO_VERSION.to_string())
            .map_err(io_err(&version_path))?;

        info!("Initialized repository at {}", path.display());
        Ok(())
    }

    /// Open an initialized repository, resolving its datastore through `registry`
    pub fn open(path: &Path, registry: &PluginRegistry) -> Result<Self, RepoError> {
        if !Self::is_initialized(path) {
            return Err(RepoError::NotInitialized(path.to_path_buf()));
        }

        let version_path = path.join(VERSION_FILE);
        let version = std::fs::read_to_string(&version_path).map_err(io_err(&version_path))?;
        if version.trim() != REPO_VERSION.to_string() {
            return Err(RepoError::VersionMismatch {
                found: version.trim().to_string(),
                expected: REPO_VERSION,
            });
        }

        let config_path = path.join(CONFIG_FILE);
        let raw = std::fs::read(&config_path).map_err(io_err(&config_path))?;
        let config: RepoConfig = serde_json::from_slice(&raw)?;
        let keypair = config.keypair()?;

        let opener = registry
            .datastore(&config.datastore.kind)
            .ok_or_else(|| RepoError::UnknownDatastore(config.datastore.kind.clone()))?;
        let blocks = opener(
            &path.join(&config.datastore.path),
            config.datastore.max_size_gb,
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
            keypair,
            blocks: Arc::new(blocks),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.keypair.public().to_peer_id()
    }

    pub fn blocks(&self) -> &Arc<BlockStore> {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentId;
    use crate::plugins::PluginLoader;
    use tempfile::tempdir;

    fn builtin_registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        let mut loader = PluginLoader::load(None).unwrap();
        loader.initialize().unwrap();
        loader.inject(&mut registry).unwrap();
        registry
    }

    #[test]
    fn test_init_and_open() {
        let dir = tempdir().unwrap();
        let config = RepoConfig::generate(vec!["/ip4/127.0.0.1/tcp/0".to_string()]).unwrap();

        Repository::init(dir.path(), &config).unwrap();
        assert!(dir.path().join("blocks").is_dir());

        let repo = Repository::open(dir.path(), &builtin_registry()).unwrap();
        assert_eq!(repo.local_peer_id().to_string(), config.identity.peer_id);
        assert_eq!(repo.config().addresses.swarm, config.addresses.swarm);

        let id = ContentId::from_data(b"stored");
        repo.blocks().put(&id, b"stored").unwrap();
        assert!(repo.blocks().has(&id).unwrap());
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = tempdir().unwrap();
        let config = RepoConfig::generate(vec![]).unwrap();
        Repository::init(dir.path(), &config).unwrap();

        assert!(matches!(
            Repository::init(dir.path(), &config),
            Err(RepoError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Repository::open(dir.path(), &builtin_registry()),
            Err(RepoError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_open_needs_registered_datastore() {
        let dir = tempdir().unwrap();
        let config = RepoConfig::generate(vec![]).unwrap();
        Repository::init(dir.path(), &config).unwrap();

        assert!(matches!(
            Repository::open(dir.path(), &PluginRegistry::new()),
            Err(RepoError::UnknownDatastore(kind)) if kind == "sled"
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempdir().unwrap();
        let config = RepoConfig::generate(vec![]).unwrap();
        Repository::init(dir.path(), &config).unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "99").unwrap();

        assert!(matches!(
            Repository::open(dir.path(), &builtin_registry()),
            Err(RepoError::VersionMismatch { .. })
        ));
    }
}
