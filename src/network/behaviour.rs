//! Combined network behaviour for the embedded node

use libp2p::{
    identify, identity, kad, ping,
    request_response::{self, ProtocolSupport},
    swarm::{behaviour::toggle::Toggle, NetworkBehaviour},
};
use std::time::Duration;

use super::node::RoutingMode;
use super::protocol::{BlockCodec, BlockRequest, BlockResponse, BLOCK_PROTOCOL};

/// Identify protocol version advertised to peers
pub const IDENTIFY_PROTOCOL: &str = "/ipfs/0.1.0";

/// Combined network behaviour
#[derive(NetworkBehaviour)]
pub struct NodeBehaviour {
    /// Kademlia DHT for peer discovery and provider lookups, absent when
    /// routing is disabled
    pub kademlia: Toggle<kad::Behaviour<kad::store::MemoryStore>>,
    /// Request-response for block transfers
    pub blocks: request_response::Behaviour<BlockCodec>,
    pub identify: identify::Behaviour,
    /// Ping for connection keepalive
    pub ping: ping::Behaviour,
}

impl NodeBehaviour {
    pub fn new(keypair: &identity::Keypair, routing: RoutingMode) -> Self {
        let local_peer_id = keypair.public().to_peer_id();

        let kademlia = match routing {
            RoutingMode::None => None,
            RoutingMode::Dht | RoutingMode::DhtClient => {
                let mut kad_config = kad::Config::new(kad::PROTOCOL_NAME);
                kad_config.set_query_timeout(Duration::from_secs(60));

                let store = kad::store::MemoryStore::new(local_peer_id);
                let mut kademlia = kad::Behaviour::with_config(local_peer_id, store, kad_config);
                // Client mode queries the DHT without answering queries for others
                kademlia.set_mode(Some(match routing {
                    RoutingMode::Dht => kad::Mode::Server,
                    _ => kad::Mode::Client,
                }));
                Some(kademlia)
            }
        };

        let blocks = request_response::Behaviour::new(
            [(BLOCK_PROTOCOL, ProtocolSupport::Full)],
            request_response::Config::default().with_request_timeout(Duration::from_secs(30)),
        );

        let identify = identify::Behaviour::new(identify::Config::new(
            IDENTIFY_PROTOCOL.to_string(),
            keypair.public(),
        ));

        let ping = ping::Behaviour::new(ping::Config::new().with_interval(Duration::from_secs(30)));

        Self {
            kademlia: Toggle::from(kademlia),
            blocks,
            identify,
            ping,
        }
    }
}

/// Events from the block transfer protocol
pub type BlockTransferEvent = request_response::Event<BlockRequest, BlockResponse>;
