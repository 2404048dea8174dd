//! Bootstrap peer connection
//!
//! Peer descriptors are multiaddr strings ending in `/p2p/<peer-id>` (the
//! legacy `/ipfs/` spelling is accepted). Descriptors naming the same peer
//! are merged so each peer is dialed once with all of its addresses.

use futures::future::join_all;
use libp2p::{
    multiaddr::{self, Protocol},
    Multiaddr, PeerId,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::api::SwarmApi;

#[derive(Error, Debug)]
pub enum AddrError {
    #[error("invalid peer address {addr}: {source}")]
    InvalidMultiaddr {
        addr: String,
        #[source]
        source: multiaddr::Error,
    },
    #[error("peer address {0} does not end with a peer id")]
    MissingPeerId(String),
}

/// A peer and the addresses it may be reached at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub addrs: Vec<Multiaddr>,
}

impl PeerInfo {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            addrs: Vec::new(),
        }
    }

    /// Split a `<transport>/p2p/<peer-id>` address into its peer and
    /// transport parts. A bare `/p2p/<peer-id>` yields no addresses.
    pub fn from_p2p_addr(addr: Multiaddr) -> Result<Self, AddrError> {
        let mut transport = addr.clone();
        match transport.pop() {
            Some(Protocol::P2p(peer_id)) => {
                let addrs = if transport.is_empty() {
                    Vec::new()
                } else {
                    vec![transport]
                };
                Ok(Self { peer_id, addrs })
            }
            _ => Err(AddrError::MissingPeerId(addr.to_string())),
        }
    }

    fn add_addr(&mut self, addr: Multiaddr) {
        if !self.addrs.contains(&addr) {
            self.addrs.push(addr);
        }
    }
}

/// Parse descriptors and group their addresses by peer.
///
/// Peers keep the order in which they were first named. Any malformed
/// descriptor fails the whole batch.
pub fn merge_peer_infos<I, S>(descriptors: I) -> Result<Vec<PeerInfo>, AddrError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut peers: Vec<PeerInfo> = Vec::new();
    let mut index: HashMap<PeerId, usize> = HashMap::new();

    for descriptor in descriptors {
        let descriptor = descriptor.as_ref();
        let addr: Multiaddr = descriptor
            .parse()
            .map_err(|source| AddrError::InvalidMultiaddr {
                addr: descriptor.to_string(),
                source,
            })?;
        let parsed = PeerInfo::from_p2p_addr(addr)?;

        match index.get(&parsed.peer_id) {
            Some(&i) => {
                for addr in parsed.addrs {
                    peers[i].add_addr(addr);
                }
            }
            None => {
                index.insert(parsed.peer_id, peers.len());
                peers.push(parsed);
            }
        }
    }

    Ok(peers)
}

/// Outcome of a bootstrap round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectSummary {
    pub attempted: usize,
    pub connected: usize,
}

impl ConnectSummary {
    pub fn failed(&self) -> usize {
        self.attempted - self.connected
    }
}

/// Dial every peer named in `descriptors` concurrently and wait for all
/// attempts to finish.
///
/// Only malformed descriptors are an error, and they abort before any dial.
/// Individual connection failures are logged and counted.
pub async fn connect_to_peers<A>(
    swarm: &A,
    descriptors: &[String],
) -> Result<ConnectSummary, AddrError>
where
    A: SwarmApi + ?Sized,
{
    let peers = merge_peer_infos(descriptors)?;

    let attempts = peers.into_iter().map(|peer| async move {
        let peer_id = peer.peer_id;
        match swarm.connect(peer).await {
            Ok(()) => {
                debug!("Connected to bootstrap peer {}", peer_id);
                true
            }
            Err(e) => {
                warn!("failed to connect to {}: {}", peer_id, e);
                false
            }
        }
    });
    let results = join_all(attempts).await;

    let summary = ConnectSummary {
        attempted: results.len(),
        connected: results.iter().filter(|connected| **connected).count(),
    };
    if summary.attempted > 0 {
        info!(
            "Connected to {}/{} bootstrap peers",
            summary.connected, summary.attempted
        );
    }
    Ok(summary)
}
