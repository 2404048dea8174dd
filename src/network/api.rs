//! Node API surface used by the client
//!
//! The connector and content reader only see these traits, so either can
//! run against the real [`NetworkNode`](super::NetworkNode), a bare
//! [`BlockStore`], or a test double.

use async_trait::async_trait;

use super::connector::PeerInfo;
use super::node::NodeError;
use crate::content::ContentId;
use crate::storage::BlockStore;

/// Peer connection management
#[async_trait]
pub trait SwarmApi: Send + Sync {
    /// Connect to a peer using any of its addresses.
    ///
    /// Resolves once a connection is established or the dial has failed.
    async fn connect(&self, peer: PeerInfo) -> Result<(), NodeError>;
}

/// Block exchange
#[async_trait]
pub trait BlockApi: Send + Sync {
    async fn get_block(&self, id: &ContentId) -> Result<Vec<u8>, NodeError>;

    async fn put_block(&self, data: Vec<u8>) -> Result<ContentId, NodeError>;
}

/// Local-only block service
#[async_trait]
impl BlockApi for BlockStore {
    async fn get_block(&self, id: &ContentId) -> Result<Vec<u8>, NodeError> {
        Ok(self.get(id)?)
    }

    async fn put_block(&self, data: Vec<u8>) -> Result<ContentId, NodeError> {
        let id = ContentId::from_data(&data);
        self.put(&id, &data)?;
        Ok(id)
    }
}
