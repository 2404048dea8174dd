//! Embedded retrieval client
//!
//! A [`Client`] owns one embedded node and its throwaway repository.
//! [`Client::start`] brings the node up and connects to the bootstrap
//! peers; [`Client::retrieve`] waits for that to finish and then streams
//! content by ID.
//!
//! ```no_run
//! # async fn demo() -> Result<(), p2p_fetch::ClientError> {
//! use p2p_fetch::client::{self, Client};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let client = Client::new([client::with_plugin_dir("/var/lib/p2p-fetch")]);
//!
//! let starter = client.clone();
//! let token = cancel.clone();
//! tokio::spawn(async move { starter.start(token).await });
//!
//! let reader = client.retrieve(&cancel, "<content id>").await?;
//! # drop(reader);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod readiness;
pub mod startup;

pub use config::{
    with_bootstrap_peers, with_datastore, with_listen_addrs, with_plugin_dir, with_routing,
    ClientConfig, ClientOption, DEFAULT_BOOTSTRAP_PEERS,
};
pub use readiness::ReadinessGate;
pub use startup::StartupError;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::content::{self, ContentId, ContentIdError, ContentReader};
use crate::network::{NetworkNode, NodeError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("initialization failed: {0}")]
    InitializationFailed(#[from] StartupError),
    #[error("retrieval failed: {0}")]
    RetrievalFailed(#[source] NodeError),
    #[error("node is not ready")]
    RetrievalNotReady,
    #[error("retrieval cancelled")]
    Cancelled,
    #[error("invalid content id {cid:?}: {source}")]
    InvalidContentId {
        cid: String,
        #[source]
        source: ContentIdError,
    },
    #[error("client already started")]
    AlreadyStarted,
}

struct Inner {
    config: ClientConfig,
    ready: ReadinessGate,
    started: AtomicBool,
    // Written once by start, read-only afterwards
    node: OnceLock<Arc<NetworkNode>>,
    repo_path: OnceLock<PathBuf>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle; clones share the same node
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("ready", &self.is_ready())
            .field("repo_path", &self.repo_path())
            .finish()
    }
}

impl Client {
    /// Build a client from the defaults with `options` applied in order
    pub fn new(options: impl IntoIterator<Item = ClientOption>) -> Self {
        Self::with_config(ClientConfig::from_options(options))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                ready: ReadinessGate::new(),
                started: AtomicBool::new(false),
                node: OnceLock::new(),
                repo_path: OnceLock::new(),
                cleanup: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Bring the node up and signal readiness.
    ///
    /// Meant to be spawned on its own task. `cancel` controls the lifetime
    /// of the repository: it is deleted once the token fires. Any error
    /// leaves the client permanently not ready. Only the first call does
    /// anything; later calls return [`ClientError::AlreadyStarted`].
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), ClientError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }

        let started = startup::run(&self.inner.config, cancel, &self.inner.cleanup).await?;
        let _ = self.inner.repo_path.set(started.repo_path);
        let _ = self.inner.node.set(Arc::new(started.node));

        self.inner.ready.set_ready();
        info!("Client ready");
        Ok(())
    }

    /// Open the content named by `cid` for reading.
    ///
    /// Waits for [`start`](Self::start) to finish first. Cancelling `cancel`
    /// while waiting gives [`ClientError::RetrievalNotReady`]; cancelling
    /// while the root block is being fetched gives
    /// [`ClientError::Cancelled`]. The remaining blocks are fetched as the
    /// reader is read.
    pub async fn retrieve(
        &self,
        cancel: &CancellationToken,
        cid: &str,
    ) -> Result<ContentReader, ClientError> {
        tokio::select! {
            biased;
            _ = self.inner.ready.wait() => {}
            _ = cancel.cancelled() => return Err(ClientError::RetrievalNotReady),
        }
        let node = self
            .inner
            .node
            .get()
            .cloned()
            .ok_or(ClientError::RetrievalNotReady)?;

        let id: ContentId = cid.parse().map_err(|source| ClientError::InvalidContentId {
            cid: cid.to_string(),
            source,
        })?;

        tokio::select! {
            result = content::get(node, &id) => result.map_err(ClientError::RetrievalFailed),
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.is_ready()
    }

    /// The running node, once started
    pub fn node(&self) -> Option<&Arc<NetworkNode>> {
        self.inner.node.get()
    }

    /// The ephemeral repository directory, once started
    pub fn repo_path(&self) -> Option<&Path> {
        self.inner.repo_path.get().map(PathBuf::as_path)
    }

    /// Wait for the repository directory to be removed.
    ///
    /// Only returns after the token given to [`start`](Self::start) has
    /// fired. Returns at once if no repository was ever created.
    pub async fn wait_for_cleanup(&self) {
        let handle = self.inner.cleanup.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Repository cleanup task failed: {}", e);
            }
        }
    }
}
