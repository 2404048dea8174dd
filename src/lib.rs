//! p2p-fetch - embedded peer-to-peer content retrieval
//!
//! Runs a private libp2p node inside the host process and fetches
//! content-addressed data through it:
//! - Each client gets a throwaway repository, removed when its
//!   cancellation token fires
//! - Datastores are provided by plugins, built in or declared on disk
//! - Startup dials all bootstrap peers concurrently and tolerates failures
//! - Retrieval waits for startup, then streams content block by block

pub mod client;
pub mod content;
pub mod network;
pub mod plugins;
pub mod repo;
pub mod storage;

pub use client::{Client, ClientConfig, ClientError, ClientOption, StartupError};
pub use content::{ContentId, ContentReader};
pub use network::{BlockApi, NetworkNode, NodeError, PeerInfo, RoutingMode, SwarmApi};
pub use plugins::{Plugin, PluginLoader, PluginRegistry};
pub use repo::{RepoConfig, Repository};
pub use storage::BlockStore;
