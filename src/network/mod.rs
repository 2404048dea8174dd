//! P2P networking layer
//!
//! Uses libp2p for peer-to-peer communication with:
//! - Kademlia DHT for provider lookups (optional, see [`RoutingMode`])
//! - Request-Response protocol for block transfer
//! - TCP and QUIC transports, Noise for encryption, Yamux for multiplexing

pub mod api;
pub mod behaviour;
pub mod connector;
pub mod node;
pub mod protocol;

pub use api::{BlockApi, SwarmApi};
pub use behaviour::NodeBehaviour;
pub use connector::{connect_to_peers, merge_peer_infos, AddrError, ConnectSummary, PeerInfo};
pub use node::{NetworkNode, NodeError, NodeOptions, RoutingMode};
pub use protocol::{BlockRequest, BlockResponse};
