//! Embedded network node
//!
//! [`NetworkNode`] is a cheap, cloneable handle. The swarm itself lives in a
//! background task and is driven through a command channel; the handle
//! reads local blocks directly from the repository's store and only goes
//! to the event loop for dials and remote fetches.

use async_trait::async_trait;
use futures::StreamExt;
use libp2p::{
    identify, identity::Keypair, kad, noise,
    request_response::{self, OutboundRequestId, ResponseChannel},
    swarm::{dial_opts::DialOpts, DialError, SwarmEvent},
    tcp, yamux, Multiaddr, PeerId, Swarm,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use super::api::{BlockApi, SwarmApi};
use super::behaviour::{BlockTransferEvent, NodeBehaviour, NodeBehaviourEvent};
use super::connector::PeerInfo;
use super::protocol::{BlockRequest, BlockResponse};
use crate::content::{verify_block, ContentId, DagError};
use crate::repo::Repository;
use crate::storage::{BlockStore, StorageError};

/// How long construction waits for the first listener to come up
pub const LISTEN_TIMEOUT: Duration = Duration::from_secs(10);

const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Listen error: {0}")]
    Listen(String),
    #[error("Dial error: {0}")]
    Dial(String),
    #[error("Node is offline")]
    Offline,
    #[error("Node event loop has stopped")]
    Stopped,
    #[error("Block not found: {0}")]
    BlockNotFound(ContentId),
    #[error("Storage error: {0}")]
    Storage(StorageError),
    #[error("Malformed content: {0}")]
    Dag(#[from] DagError),
    #[error("Content produced no blocks")]
    EmptyDag,
}

impl From<StorageError> for NodeError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => NodeError::BlockNotFound(id),
            other => NodeError::Storage(other),
        }
    }
}

/// Content routing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingMode {
    /// Full DHT participant
    Dht,
    /// Query the DHT without serving it
    #[default]
    DhtClient,
    /// No content routing; blocks are only fetched from connected peers
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeOptions {
    /// Whether to start networking at all
    pub online: bool,
    pub routing: RoutingMode,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            online: true,
            routing: RoutingMode::default(),
        }
    }
}

type DialReply = oneshot::Sender<Result<(), NodeError>>;
type FetchReply = oneshot::Sender<Result<Vec<u8>, NodeError>>;

enum NodeCommand {
    Connect { peer: PeerInfo, reply: DialReply },
    FetchBlock { id: ContentId, reply: FetchReply },
    Provide { id: ContentId },
}

/// Handle to a running node
#[derive(Clone)]
pub struct NetworkNode {
    local_peer_id: PeerId,
    blocks: Arc<BlockStore>,
    commands: Option<mpsc::UnboundedSender<NodeCommand>>,
    listen_addrs: Arc<RwLock<Vec<Multiaddr>>>,
}

impl std::fmt::Debug for NetworkNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkNode")
            .field("local_peer_id", &self.local_peer_id)
            .field("online", &self.is_online())
            .finish()
    }
}

impl NetworkNode {
    /// Construct a node over an opened repository.
    ///
    /// An online node starts listening on the repository's swarm addresses
    /// and returns once the first listener is up. The swarm then runs in a
    /// background task for as long as any handle is alive.
    pub async fn construct(repo: &Repository, options: NodeOptions) -> Result<Self, NodeError> {
        let local_peer_id = repo.local_peer_id();
        let blocks = repo.blocks().clone();
        let listen_addrs = Arc::new(RwLock::new(Vec::new()));

        if !options.online {
            info!("Constructed offline node {}", local_peer_id);
            return Ok(Self {
                local_peer_id,
                blocks,
                commands: None,
                listen_addrs,
            });
        }

        let addrs = repo
            .config()
            .listen_addrs()
            .map_err(|e| NodeError::Listen(e.to_string()))?;

        let mut swarm = build_swarm(repo.keypair().clone(), options.routing)?;
        for addr in &addrs {
            swarm
                .listen_on(addr.clone())
                .map_err(|e| NodeError::Listen(format!("{addr}: {e}")))?;
        }
        if !addrs.is_empty() {
            let first = tokio::time::timeout(LISTEN_TIMEOUT, wait_for_listen_addr(&mut swarm))
                .await
                .map_err(|_| NodeError::Listen("timed out waiting for a listener".to_string()))??;
            listen_addrs.write().await.push(first);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(swarm, blocks.clone(), rx, listen_addrs.clone());
        tokio::spawn(event_loop.run());

        info!(
            "Constructed node {} ({:?} routing)",
            local_peer_id, options.routing
        );
        Ok(Self {
            local_peer_id,
            blocks,
            commands: Some(tx),
            listen_addrs,
        })
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    pub fn is_online(&self) -> bool {
        self.commands.is_some()
    }

    pub fn blocks(&self) -> &Arc<BlockStore> {
        &self.blocks
    }

    /// Addresses the node is currently listening on
    pub async fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.listen_addrs.read().await.clone()
    }

    fn send(&self, command: NodeCommand) -> Result<(), NodeError> {
        let tx = self.commands.as_ref().ok_or(NodeError::Offline)?;
        tx.send(command).map_err(|_| NodeError::Stopped)
    }
}

#[async_trait]
impl SwarmApi for NetworkNode {
    async fn connect(&self, peer: PeerInfo) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.send(NodeCommand::Connect { peer, reply })?;
        rx.await.map_err(|_| NodeError::Stopped)?
    }
}

#[async_trait]
impl BlockApi for NetworkNode {
    async fn get_block(&self, id: &ContentId) -> Result<Vec<u8>, NodeError> {
        match self.blocks.get(id) {
            Ok(data) => return Ok(data),
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        if !self.is_online() {
            return Err(NodeError::BlockNotFound(*id));
        }

        let (reply, rx) = oneshot::channel();
        self.send(NodeCommand::FetchBlock { id: *id, reply })?;
        rx.await.map_err(|_| NodeError::Stopped)?
    }

    async fn put_block(&self, data: Vec<u8>) -> Result<ContentId, NodeError> {
        let id = ContentId::from_data(&data);
        self.blocks.put(&id, &data)?;
        if let Some(tx) = &self.commands {
            let _ = tx.send(NodeCommand::Provide { id });
        }
        Ok(id)
    }
}

fn build_swarm(keypair: Keypair, routing: RoutingMode) -> Result<Swarm<NodeBehaviour>, NodeError> {
    Ok(libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default(),
            noise::Config::new,
            yamux::Config::default,
        )
        .map_err(|e| NodeError::Transport(e.to_string()))?
        .with_quic()
        .with_dns()
        .map_err(|e| NodeError::Transport(e.to_string()))?
        .with_behaviour(|key| NodeBehaviour::new(key, routing))
        .map_err(|e| NodeError::Transport(e.to_string()))?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT))
        .build())
}

async fn wait_for_listen_addr(swarm: &mut Swarm<NodeBehaviour>) -> Result<Multiaddr, NodeError> {
    loop {
        match swarm.select_next_some().await {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!("Listening on {}", address);
                return Ok(address);
            }
            SwarmEvent::ListenerError { error, .. } => {
                warn!("Listener error: {}", error);
            }
            SwarmEvent::ListenerClosed {
                reason: Err(error), ..
            } => {
                warn!("Listener closed: {}", error);
            }
            _ => {}
        }
    }
}

/// One outstanding remote block fetch.
///
/// Peers are asked one at a time; providers found through the DHT are
/// appended as candidates while the lookup runs.
struct BlockFetch {
    candidates: VecDeque<PeerId>,
    tried: HashSet<PeerId>,
    in_flight: Option<OutboundRequestId>,
    provider_query: Option<kad::QueryId>,
    waiters: Vec<FetchReply>,
}

impl BlockFetch {
    fn offer(&mut self, peer: PeerId) {
        if !self.tried.contains(&peer) && !self.candidates.contains(&peer) {
            self.candidates.push_back(peer);
        }
    }

    fn succeed(self, data: &[u8]) {
        for waiter in self.waiters {
            let _ = waiter.send(Ok(data.to_vec()));
        }
    }

    fn fail(self, id: ContentId) {
        for waiter in self.waiters {
            let _ = waiter.send(Err(NodeError::BlockNotFound(id)));
        }
    }
}

struct EventLoop {
    swarm: Swarm<NodeBehaviour>,
    blocks: Arc<BlockStore>,
    commands: mpsc::UnboundedReceiver<NodeCommand>,
    listen_addrs: Arc<RwLock<Vec<Multiaddr>>>,
    pending_dials: HashMap<PeerId, Vec<DialReply>>,
    fetches: HashMap<ContentId, BlockFetch>,
    outbound: HashMap<OutboundRequestId, ContentId>,
    provider_queries: HashMap<kad::QueryId, ContentId>,
}

impl EventLoop {
    fn new(
        swarm: Swarm<NodeBehaviour>,
        blocks: Arc<BlockStore>,
        commands: mpsc::UnboundedReceiver<NodeCommand>,
        listen_addrs: Arc<RwLock<Vec<Multiaddr>>>,
    ) -> Self {
        Self {
            swarm,
            blocks,
            commands,
            listen_addrs,
            pending_dials: HashMap::new(),
            fetches: HashMap::new(),
            outbound: HashMap::new(),
            provider_queries: HashMap::new(),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.swarm.select_next_some() => self.handle_swarm_event(event).await,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All node handles dropped, stopping event loop");
                        break;
                    }
                },
            }
        }
    }

    fn handle_command(&mut self, command: NodeCommand) {
        match command {
            NodeCommand::Connect { peer, reply } => self.handle_connect(peer, reply),
            NodeCommand::FetchBlock { id, reply } => self.handle_fetch(id, reply),
            NodeCommand::Provide { id } => self.provide(&id),
        }
    }

    fn handle_connect(&mut self, peer: PeerInfo, reply: DialReply) {
        let PeerInfo { peer_id, addrs } = peer;
        if self.swarm.is_connected(&peer_id) {
            let _ = reply.send(Ok(()));
            return;
        }

        if let Some(kademlia) = self.swarm.behaviour_mut().kademlia.as_mut() {
            for addr in &addrs {
                kademlia.add_address(&peer_id, addr.clone());
            }
        }

        let opts = DialOpts::peer_id(peer_id).addresses(addrs).build();
        match self.swarm.dial(opts) {
            // A dial to this peer is already in progress; its outcome answers us too
            Ok(()) | Err(DialError::DialPeerConditionFalse(_)) => {
                self.pending_dials.entry(peer_id).or_default().push(reply);
            }
            Err(e) => {
                let _ = reply.send(Err(NodeError::Dial(e.to_string())));
            }
        }
    }

    fn handle_fetch(&mut self, id: ContentId, reply: FetchReply) {
        if let Ok(data) = self.blocks.get(&id) {
            let _ = reply.send(Ok(data));
            return;
        }
        if let Some(fetch) = self.fetches.get_mut(&id) {
            fetch.waiters.push(reply);
            return;
        }

        let candidates: VecDeque<PeerId> = self.swarm.connected_peers().copied().collect();
        let provider_query = self
            .swarm
            .behaviour_mut()
            .kademlia
            .as_mut()
            .map(|kademlia| kademlia.get_providers(kad::RecordKey::new(&id.as_bytes())));
        if let Some(query_id) = provider_query {
            self.provider_queries.insert(query_id, id);
        }

        debug!(
            "Fetching block {} ({} connected peers)",
            id,
            candidates.len()
        );
        self.fetches.insert(
            id,
            BlockFetch {
                candidates,
                tried: HashSet::new(),
                in_flight: None,
                provider_query,
                waiters: vec![reply],
            },
        );
        self.advance(id);
    }

    /// Ask the next untried candidate, or give up once there are no
    /// candidates left and no lookup is still producing them.
    fn advance(&mut self, id: ContentId) {
        let Some(fetch) = self.fetches.get_mut(&id) else {
            return;
        };
        if fetch.in_flight.is_some() {
            return;
        }

        while let Some(peer) = fetch.candidates.pop_front() {
            if !fetch.tried.insert(peer) {
                continue;
            }
            let request_id = self
                .swarm
                .behaviour_mut()
                .blocks
                .send_request(&peer, BlockRequest::Get { id });
            fetch.in_flight = Some(request_id);
            self.outbound.insert(request_id, id);
            debug!("Requesting block {} from {}", id, peer);
            return;
        }

        if fetch.provider_query.is_none() {
            if let Some(fetch) = self.fetches.remove(&id) {
                debug!("No peer could provide block {}", id);
                fetch.fail(id);
            }
        }
    }

    fn complete(&mut self, id: ContentId, data: Vec<u8>) {
        match self.blocks.put(&id, &data) {
            Ok(()) => self.provide(&id),
            Err(e) => warn!("Failed to cache block {}: {}", id, e),
        }
        if let Some(fetch) = self.fetches.remove(&id) {
            fetch.succeed(&data);
        }
    }

    fn provide(&mut self, id: &ContentId) {
        if let Some(kademlia) = self.swarm.behaviour_mut().kademlia.as_mut() {
            if let Err(e) = kademlia.start_providing(kad::RecordKey::new(&id.as_bytes())) {
                debug!("Failed to announce block {}: {:?}", id, e);
            }
        }
    }

    /// A newly connected peer becomes a candidate for every active fetch
    fn offer_peer(&mut self, peer: PeerId) {
        let ids: Vec<ContentId> = self.fetches.keys().copied().collect();
        for id in ids {
            if let Some(fetch) = self.fetches.get_mut(&id) {
                fetch.offer(peer);
            }
            self.advance(id);
        }
    }

    async fn handle_swarm_event(&mut self, event: SwarmEvent<NodeBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!("Listening on {}", address);
                let mut addrs = self.listen_addrs.write().await;
                if !addrs.contains(&address) {
                    addrs.push(address);
                }
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                self.listen_addrs.write().await.retain(|a| a != &address);
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!("Connected to {}", peer_id);
                if let Some(waiters) = self.pending_dials.remove(&peer_id) {
                    for waiter in waiters {
                        let _ = waiter.send(Ok(()));
                    }
                }
                self.offer_peer(peer_id);
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!("Disconnected from {}", peer_id);
            }
            SwarmEvent::OutgoingConnectionError {
                peer_id: Some(peer_id),
                error,
                ..
            } => {
                if let Some(waiters) = self.pending_dials.remove(&peer_id) {
                    let message = error.to_string();
                    for waiter in waiters {
                        let _ = waiter.send(Err(NodeError::Dial(message.clone())));
                    }
                }
            }
            SwarmEvent::Behaviour(event) => self.handle_behaviour_event(event),
            _ => {}
        }
    }

    fn handle_behaviour_event(&mut self, event: NodeBehaviourEvent) {
        match event {
            NodeBehaviourEvent::Blocks(event) => self.handle_block_event(event),
            NodeBehaviourEvent::Kademlia(event) => self.handle_kad_event(event),
            NodeBehaviourEvent::Identify(identify::Event::Received { peer_id, info, .. }) => {
                debug!("Identified peer {}: {}", peer_id, info.agent_version);
                if !info.protocols.iter().any(|p| p == &kad::PROTOCOL_NAME) {
                    return;
                }
                if let Some(kademlia) = self.swarm.behaviour_mut().kademlia.as_mut() {
                    for addr in info.listen_addrs {
                        kademlia.add_address(&peer_id, addr);
                    }
                }
            }
            NodeBehaviourEvent::Identify(_) | NodeBehaviourEvent::Ping(_) => {}
        }
    }

    fn handle_block_event(&mut self, event: BlockTransferEvent) {
        match event {
            request_response::Event::Message { peer, message, .. } => match message {
                request_response::Message::Request {
                    request, channel, ..
                } => self.handle_block_request(peer, request, channel),
                request_response::Message::Response {
                    request_id,
                    response,
                    ..
                } => self.handle_block_response(peer, request_id, response),
            },
            request_response::Event::OutboundFailure {
                peer,
                request_id,
                error,
                ..
            } => {
                debug!("Block request to {} failed: {}", peer, error);
                self.request_failed(request_id);
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                warn!("Inbound block request from {} failed: {}", peer, error);
            }
            _ => {}
        }
    }

    fn handle_block_request(
        &mut self,
        peer: PeerId,
        request: BlockRequest,
        channel: ResponseChannel<BlockResponse>,
    ) {
        let response = match request {
            BlockRequest::Get { id } => match self.blocks.get(&id) {
                Ok(data) => BlockResponse::Block { id, data },
                Err(_) => BlockResponse::NotFound { id },
            },
        };

        if self
            .swarm
            .behaviour_mut()
            .blocks
            .send_response(channel, response)
            .is_err()
        {
            debug!("Peer {} went away before its block response", peer);
        }
    }

    fn handle_block_response(
        &mut self,
        peer: PeerId,
        request_id: OutboundRequestId,
        response: BlockResponse,
    ) {
        let Some(id) = self.take_request(request_id) else {
            return;
        };

        match response {
            BlockResponse::Block { id: got, data } if got == id && verify_block(&id, &data) => {
                debug!("Received block {} from {}", id, peer);
                self.complete(id, data);
            }
            BlockResponse::Block { .. } => {
                warn!("Peer {} sent data that does not match block {}", peer, id);
                self.advance(id);
            }
            BlockResponse::NotFound { .. } => {
                debug!("Peer {} does not have block {}", peer, id);
                self.advance(id);
            }
        }
    }

    fn take_request(&mut self, request_id: OutboundRequestId) -> Option<ContentId> {
        let id = self.outbound.remove(&request_id)?;
        if let Some(fetch) = self.fetches.get_mut(&id) {
            if fetch.in_flight == Some(request_id) {
                fetch.in_flight = None;
            }
        }
        Some(id)
    }

    fn request_failed(&mut self, request_id: OutboundRequestId) {
        if let Some(id) = self.take_request(request_id) {
            self.advance(id);
        }
    }

    fn handle_kad_event(&mut self, event: kad::Event) {
        match event {
            kad::Event::RoutingUpdated { peer, .. } => {
                debug!("Kademlia routing updated for {}", peer);
            }
            kad::Event::OutboundQueryProgressed {
                id: query_id,
                result,
                step,
                ..
            } => match result {
                kad::QueryResult::GetProviders(result) => {
                    self.handle_providers(query_id, result, step.last)
                }
                kad::QueryResult::StartProviding(Ok(kad::AddProviderOk { key })) => {
                    debug!("Started providing {:?}", key);
                }
                kad::QueryResult::StartProviding(Err(e)) => {
                    debug!("Provider announcement failed: {}", e);
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn handle_providers(
        &mut self,
        query_id: kad::QueryId,
        result: kad::GetProvidersResult,
        last: bool,
    ) {
        let Some(&id) = self.provider_queries.get(&query_id) else {
            return;
        };
        let local_peer_id = *self.swarm.local_peer_id();

        let mut done = last;
        match result {
            Ok(kad::GetProvidersOk::FoundProviders { providers, .. }) => {
                if let Some(fetch) = self.fetches.get_mut(&id) {
                    for provider in providers {
                        if provider != local_peer_id {
                            fetch.offer(provider);
                        }
                    }
                }
            }
            Ok(kad::GetProvidersOk::FinishedWithNoAdditionalRecord { .. }) => done = true,
            Err(e) => {
                debug!("Provider lookup for {} failed: {}", id, e);
                done = true;
            }
        }

        if done {
            self.provider_queries.remove(&query_id);
            if let Some(fetch) = self.fetches.get_mut(&id) {
                if fetch.provider_query == Some(query_id) {
                    fetch.provider_query = None;
                }
            }
        }
        self.advance(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;
    use crate::plugins::PluginRegistry;
    use crate::repo::RepoConfig;
    use tempfile::tempdir;

    fn open_repo(dir: &std::path::Path, listen: Vec<String>) -> Repository {
        let mut registry = PluginRegistry::new();
        registry
            .register_datastore(
                "memory",
                Arc::new(|_: &std::path::Path, max_size_gb: u64| {
                    BlockStore::temporary(max_size_gb)
                }),
            )
            .unwrap();

        let mut config = RepoConfig::generate(listen).unwrap();
        config.datastore.kind = "memory".to_string();
        Repository::init(dir, &config).unwrap();
        Repository::open(dir, &registry).unwrap()
    }

    #[tokio::test]
    async fn test_offline_node_serves_local_blocks_only() {
        let dir = tempdir().unwrap();
        let repo = open_repo(dir.path(), vec![]);
        let node = NetworkNode::construct(
            &repo,
            NodeOptions {
                online: false,
                routing: RoutingMode::None,
            },
        )
        .await
        .unwrap();

        assert!(!node.is_online());
        let id = node.put_block(b"local".to_vec()).await.unwrap();
        assert_eq!(node.get_block(&id).await.unwrap(), b"local");

        let missing = ContentId::from_data(b"missing");
        assert!(matches!(
            node.get_block(&missing).await,
            Err(NodeError::BlockNotFound(m)) if m == missing
        ));
        assert!(matches!(
            node.connect(PeerInfo::new(PeerId::random())).await,
            Err(NodeError::Offline)
        ));
    }

    #[tokio::test]
    async fn test_online_node_reports_listen_addr() {
        let dir = tempdir().unwrap();
        let repo = open_repo(dir.path(), vec!["/ip4/127.0.0.1/tcp/0".to_string()]);
        let node = NetworkNode::construct(
            &repo,
            NodeOptions {
                online: true,
                routing: RoutingMode::None,
            },
        )
        .await
        .unwrap();

        assert!(node.is_online());
        assert_eq!(node.local_peer_id(), repo.local_peer_id());
        let addrs = node.listen_addrs().await;
        assert_eq!(addrs.len(), 1);
        assert!(addrs[0].to_string().starts_with("/ip4/127.0.0.1/tcp/"));
    }

    #[tokio::test]
    async fn test_missing_block_without_peers_fails() {
        let dir = tempdir().unwrap();
        let repo = open_repo(dir.path(), vec!["/ip4/127.0.0.1/tcp/0".to_string()]);
        let node = NetworkNode::construct(
            &repo,
            NodeOptions {
                online: true,
                routing: RoutingMode::None,
            },
        )
        .await
        .unwrap();

        let missing = ContentId::from_data(b"nobody has this");
        assert!(matches!(
            node.get_block(&missing).await,
            Err(NodeError::BlockNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dial_failure_reported() {
        let dir = tempdir().unwrap();
        let repo = open_repo(dir.path(), vec!["/ip4/127.0.0.1/tcp/0".to_string()]);
        let node = NetworkNode::construct(
            &repo,
            NodeOptions {
                online: true,
                routing: RoutingMode::None,
            },
        )
        .await
        .unwrap();

        // No addresses and nothing known about the peer
        let result = node.connect(PeerInfo::new(PeerId::random())).await;
        assert!(matches!(result, Err(NodeError::Dial(_))));
    }

    #[tokio::test]
    async fn test_blocks_fetched_from_connected_peer() {
        let server_dir = tempdir().unwrap();
        let client_dir = tempdir().unwrap();
        let listen = vec!["/ip4/127.0.0.1/tcp/0".to_string()];
        let options = NodeOptions {
            online: true,
            routing: RoutingMode::None,
        };

        let server_repo = open_repo(server_dir.path(), listen.clone());
        let server = NetworkNode::construct(&server_repo, options).await.unwrap();
        let data: Vec<u8> = (0..600_000u32).map(|i| (i % 251) as u8).collect();
        let root = content::add(&server, &data).await.unwrap();

        let client_repo = open_repo(client_dir.path(), listen);
        let client = Arc::new(NetworkNode::construct(&client_repo, options).await.unwrap());
        client
            .connect(PeerInfo {
                peer_id: server.local_peer_id(),
                addrs: server.listen_addrs().await,
            })
            .await
            .unwrap();

        let mut reader = content::get(client.clone(), &root).await.unwrap();
        let mut fetched = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut fetched)
            .await
            .unwrap();
        assert_eq!(fetched, data);

        // Fetched blocks are kept locally
        assert!(client.blocks().has(&root).unwrap());
    }

    #[test]
    fn test_storage_not_found_maps_to_block_not_found() {
        let id = ContentId::from_data(b"x");
        assert!(matches!(
            NodeError::from(StorageError::NotFound(id)),
            NodeError::BlockNotFound(m) if m == id
        ));
        assert!(matches!(
            NodeError::from(StorageError::StorageFull),
            NodeError::Storage(_)
        ));
    }
}
