use std::path::PathBuf;

use crate::network::RoutingMode;
use crate::repo::config::{default_datastore_kind, default_swarm_addrs};

/// Public bootstrap peers dialed when no list is configured
pub const DEFAULT_BOOTSTRAP_PEERS: &[&str] = &[
    "/dnsaddr/bootstrap.libp2p.io/ipfs/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN",
    "/dnsaddr/bootstrap.libp2p.io/ipfs/QmQCU2EcMqAqQPR2i9bChDtGNJchTbq5TbXJJ16u19uLTa",
    "/dnsaddr/bootstrap.libp2p.io/ipfs/QmbLHAnMoJPWSCR5Zhtx6BHJX9KiKNN6tpvbUcqanj75Nb",
    "/dnsaddr/bootstrap.libp2p.io/ipfs/QmcZf59bWwK5XFi76CZX8cbJ4BhTzzA3gU1ZjYZcYW3dwt",
];

/// Client configuration.
///
/// Nothing is validated here; bad values surface when the client starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Directory holding a `plugins/` subdirectory of plugin manifests.
    /// `None` loads the built-in plugins only. A manifest only registers a
    /// datastore kind; select it with [`with_datastore`].
    pub plugin_dir: Option<PathBuf>,
    /// Datastore kind the repository is created with. Must be registered
    /// by a built-in or manifest plugin.
    pub datastore: String,
    /// Peer descriptors dialed at startup
    pub bootstrap_peers: Vec<String>,
    /// Swarm listen addresses for the node
    pub listen_addrs: Vec<String>,
    pub routing: RoutingMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            datastore: default_datastore_kind(),
            bootstrap_peers: DEFAULT_BOOTSTRAP_PEERS.iter().map(|s| s.to_string()).collect(),
            listen_addrs: default_swarm_addrs(),
            routing: RoutingMode::DhtClient,
        }
    }
}

/// A named change to one [`ClientConfig`] field
#[derive(Debug, Clone)]
pub enum ClientOption {
    PluginDir(PathBuf),
    Datastore(String),
    BootstrapPeers(Vec<String>),
    ListenAddrs(Vec<String>),
    Routing(RoutingMode),
}

impl ClientOption {
    pub fn apply(self, config: &mut ClientConfig) {
        match self {
            ClientOption::PluginDir(dir) => config.plugin_dir = Some(dir),
            ClientOption::Datastore(kind) => config.datastore = kind,
            ClientOption::BootstrapPeers(peers) => config.bootstrap_peers = peers,
            ClientOption::ListenAddrs(addrs) => config.listen_addrs = addrs,
            ClientOption::Routing(routing) => config.routing = routing,
        }
    }
}

pub fn with_plugin_dir(dir: impl Into<PathBuf>) -> ClientOption {
    ClientOption::PluginDir(dir.into())
}

pub fn with_datastore(kind: impl Into<String>) -> ClientOption {
    ClientOption::Datastore(kind.into())
}

pub fn with_bootstrap_peers<I, S>(peers: I) -> ClientOption
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ClientOption::BootstrapPeers(peers.into_iter().map(Into::into).collect())
}

pub fn with_listen_addrs<I, S>(addrs: I) -> ClientOption
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ClientOption::ListenAddrs(addrs.into_iter().map(Into::into).collect())
}

pub fn with_routing(routing: RoutingMode) -> ClientOption {
    ClientOption::Routing(routing)
}

impl ClientConfig {
    /// Defaults with `options` applied in order
    pub fn from_options(options: impl IntoIterator<Item = ClientOption>) -> Self {
        let mut config = Self::default();
        for option in options {
            option.apply(&mut config);
        }
        config
    }
}
