//! File DAG layout
//!
//! Content is split into fixed-size chunks. Each chunk is stored as a
//! `Raw` leaf block; content spanning several chunks gets a `File` root
//! that links the leaves in order. Single-chunk content is its own root.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ContentId;

/// Default chunk size: 256 KiB
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Error, Debug)]
pub enum DagError {
    #[error("Malformed block: {0}")]
    Decode(#[from] bincode::Error),
}

/// Link from an interior node to a child block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: ContentId,
    /// Content bytes reachable through this link
    pub size: u64,
}

/// A decoded block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DagNode {
    /// Leaf holding content bytes
    Raw(Vec<u8>),
    /// Interior node whose content is the concatenation of its links
    File { size: u64, links: Vec<Link> },
}

impl DagNode {
    pub fn encode(&self) -> Result<Vec<u8>, DagError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DagError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Total content size under this node
    pub fn size(&self) -> u64 {
        match self {
            DagNode::Raw(data) => data.len() as u64,
            DagNode::File { size, .. } => *size,
        }
    }
}

/// A block ready to be stored
#[derive(Clone, Debug)]
pub struct EncodedBlock {
    pub id: ContentId,
    pub data: Vec<u8>,
}

impl EncodedBlock {
    fn from_node(node: &DagNode) -> Result<Self, DagError> {
        let data = node.encode()?;
        Ok(Self {
            id: ContentId::from_data(&data),
            data,
        })
    }
}

/// Split content into encoded blocks.
///
/// Returns the blocks leaves-first; the root is always the last element.
pub fn build_dag(data: &[u8], chunk_size: usize) -> Result<Vec<EncodedBlock>, DagError> {
    let chunk_size = chunk_size.max(1);

    if data.len() <= chunk_size {
        return Ok(vec![EncodedBlock::from_node(&DagNode::Raw(data.to_vec()))?]);
    }

    let mut blocks = Vec::with_capacity(data.len() / chunk_size + 2);
    let mut links = Vec::with_capacity(data.len() / chunk_size + 1);

    for chunk in data.chunks(chunk_size) {
        let leaf = EncodedBlock::from_node(&DagNode::Raw(chunk.to_vec()))?;
        links.push(Link {
            id: leaf.id,
            size: chunk.len() as u64,
        });
        blocks.push(leaf);
    }

    let root = DagNode::File {
        size: data.len() as u64,
        links,
    };
    blocks.push(EncodedBlock::from_node(&root)?);

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_content_is_single_raw_block() {
        let blocks = build_dag(b"Hello, World!", DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(blocks.len(), 1);

        let node = DagNode::decode(&blocks[0].data).unwrap();
        assert_eq!(node, DagNode::Raw(b"Hello, World!".to_vec()));
    }

    #[test]
    fn test_empty_content() {
        let blocks = build_dag(&[], DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(DagNode::decode(&blocks[0].data).unwrap().size(), 0);
    }

    #[test]
    fn test_large_content_links_chunks_in_order() {
        let data: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let blocks = build_dag(&data, 1000).unwrap();

        // 1000 + 1000 + 500, plus the root
        assert_eq!(blocks.len(), 4);

        let root = DagNode::decode(&blocks[3].data).unwrap();
        let DagNode::File { size, links } = root else {
            panic!("expected file root");
        };
        assert_eq!(size, 2500);
        assert_eq!(links.len(), 3);
        assert_eq!(links[2].size, 500);
        for (link, block) in links.iter().zip(&blocks[..3]) {
            assert_eq!(link.id, block.id);
        }
    }

    #[test]
    fn test_block_ids_match_encoded_bytes() {
        let blocks = build_dag(&[7u8; 3000], 1024).unwrap();
        for block in blocks {
            assert_eq!(block.id, ContentId::from_data(&block.data));
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(DagNode::decode(&[0xff, 0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
