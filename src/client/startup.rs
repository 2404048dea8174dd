//! Startup sequence: plugins, ephemeral repository, node, bootstrap.
//!
//! Every step fails fast. Individual bootstrap dials are the exception:
//! the connector logs and counts them without failing.

use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::config::ClientConfig;
use crate::network::{connect_to_peers, AddrError, NetworkNode, NodeError, NodeOptions};
use crate::plugins::{PluginError, PluginLoader, PluginRegistry};
use crate::repo::{ephemeral, RepoConfig, RepoError, Repository};

/// A startup failure. The node is unusable after any of these.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("error loading plugins: {0}")]
    Plugins(#[from] PluginError),
    #[error("failed to create repository: {0}")]
    Repository(#[from] RepoError),
    #[error("failed to create node: {0}")]
    Node(#[from] NodeError),
    #[error("invalid bootstrap peer: {0}")]
    Bootstrap(#[from] AddrError),
}

pub(crate) struct Started {
    pub repo_path: PathBuf,
    pub node: NetworkNode,
}

/// Run the startup sequence. The cleanup task is parked in `cleanup` as
/// soon as the repository directory exists, so it can be awaited even when
/// a later step fails.
pub(crate) async fn run(
    config: &ClientConfig,
    cancel: CancellationToken,
    cleanup: &Mutex<Option<JoinHandle<()>>>,
) -> Result<Started, StartupError> {
    let mut registry = PluginRegistry::new();
    let mut loader = PluginLoader::load(config.plugin_dir.as_deref())?;
    loader.initialize()?;
    loader.inject(&mut registry)?;
    info!("Loaded plugins: {}", loader.plugin_names().join(", "));

    let repo_path = ephemeral::create(ephemeral::DEFAULT_PREFIX).map_err(|source| {
        RepoError::Io {
            path: std::env::temp_dir(),
            source,
        }
    })?;
    *cleanup.lock().await = Some(ephemeral::spawn_cleanup(repo_path.clone(), cancel));

    let mut repo_config = RepoConfig::generate(config.listen_addrs.clone())?;
    repo_config.datastore.kind = config.datastore.clone();
    Repository::init(&repo_path, &repo_config)?;
    info!("Created repository at {}", repo_path.display());

    let repo = Repository::open(&repo_path, &registry)?;
    let node = NetworkNode::construct(
        &repo,
        NodeOptions {
            online: true,
            routing: config.routing,
        },
    )
    .await?;
    info!("Node {} is online", node.local_peer_id());

    connect_to_peers(&node, &config.bootstrap_peers).await?;

    Ok(Started { repo_path, node })
}
