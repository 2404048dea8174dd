use libp2p::{identity::Keypair, Multiaddr, PeerId};
use serde::{Deserialize, Serialize};

use super::RepoError;

/// Repository configuration, stored as JSON in `<repo>/config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub identity: IdentityConfig,
    #[serde(default)]
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub addresses: AddressesConfig,
}

/// Node identity.
/// Keys are always Ed25519 (256-bit); the private key is the hex-encoded
/// protobuf form used by libp2p.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub peer_id: String,
    pub private_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Datastore kind, resolved through the plugin registry
    #[serde(default = "default_datastore_kind")]
    pub kind: String,

    /// Directory relative to the repository root
    #[serde(default = "default_datastore_path")]
    pub path: String,

    /// Size cap in GiB
    /// Default: 10
    #[serde(default = "default_max_size_gb")]
    pub max_size_gb: u64,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            kind: default_datastore_kind(),
            path: default_datastore_path(),
            max_size_gb: default_max_size_gb(),
        }
    }
}

/// Datastore kind used when none is configured
pub fn default_datastore_kind() -> String {
    "sled".to_string()
}
fn default_datastore_path() -> String {
    "blocks".to_string()
}
fn default_max_size_gb() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressesConfig {
    /// Addresses the swarm listens on
    #[serde(default = "default_swarm_addrs")]
    pub swarm: Vec<String>,
}

impl Default for AddressesConfig {
    fn default() -> Self {
        Self {
            swarm: default_swarm_addrs(),
        }
    }
}

pub fn default_swarm_addrs() -> Vec<String> {
    vec![
        "/ip4/0.0.0.0/tcp/0".to_string(),
        "/ip4/0.0.0.0/udp/0/quic-v1".to_string(),
    ]
}

impl RepoConfig {
    /// Fresh configuration with a newly generated identity
    pub fn generate(listen_addrs: Vec<String>) -> Result<Self, RepoError> {
        for addr in &listen_addrs {
            parse_addr(addr)?;
        }

        let keypair = Keypair::generate_ed25519();
        let private_key = keypair
            .to_protobuf_encoding()
            .map_err(|e| RepoError::Identity(e.to_string()))?;

        Ok(Self {
            identity: IdentityConfig {
                peer_id: keypair.public().to_peer_id().to_string(),
                private_key: hex::encode(private_key),
            },
            datastore: DatastoreConfig::default(),
            addresses: AddressesConfig {
                swarm: listen_addrs,
            },
        })
    }

    /// Decode the identity keypair, checking it matches the recorded peer ID
    pub fn keypair(&self) -> Result<Keypair, RepoError> {
        let bytes = hex::decode(&self.identity.private_key)
            .map_err(|e| RepoError::Identity(e.to_string()))?;
        let keypair = Keypair::from_protobuf_encoding(&bytes)
            .map_err(|e| RepoError::Identity(e.to_string()))?;

        let expected: PeerId = self
            .identity
            .peer_id
            .parse()
            .map_err(|e| RepoError::Identity(format!("invalid peer id: {e}")))?;
        if keypair.public().to_peer_id() != expected {
            return Err(RepoError::Identity(
                "private key does not match peer id".to_string(),
            ));
        }
        Ok(keypair)
    }

    pub fn listen_addrs(&self) -> Result<Vec<Multiaddr>, RepoError> {
        self.addresses.swarm.iter().map(|a| parse_addr(a)).collect()
    }
}

fn parse_addr(addr: &str) -> Result<Multiaddr, RepoError> {
    addr.parse().map_err(|e: libp2p::multiaddr::Error| RepoError::InvalidAddress {
        addr: addr.to_string(),
        reason: e.to_string(),
    })
}
