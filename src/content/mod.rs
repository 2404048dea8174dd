//! Content addressing and file retrieval
//!
//! Adds byte content as a DAG of blocks and reads it back as a stream,
//! on top of any [`BlockApi`](crate::network::BlockApi).

pub mod dag;
pub mod id;
pub mod reader;

pub use dag::{build_dag, DagError, DagNode, Link, DEFAULT_CHUNK_SIZE};
pub use id::{verify_block, ContentId, ContentIdError};
pub use reader::ContentReader;

use std::sync::Arc;
use tracing::debug;

use crate::network::{BlockApi, NodeError};

/// Store content and return the ID of its root block
pub async fn add<B>(blocks: &B, data: &[u8]) -> Result<ContentId, NodeError>
where
    B: BlockApi + ?Sized,
{
    add_with_chunk_size(blocks, data, DEFAULT_CHUNK_SIZE).await
}

pub async fn add_with_chunk_size<B>(
    blocks: &B,
    data: &[u8],
    chunk_size: usize,
) -> Result<ContentId, NodeError>
where
    B: BlockApi + ?Sized,
{
    let encoded = build_dag(data, chunk_size)?;
    let block_count = encoded.len();

    let mut root = None;
    for block in encoded {
        root = Some(blocks.put_block(block.data).await?);
    }
    // build_dag always yields at least the root block
    let root = root.ok_or(NodeError::EmptyDag)?;

    debug!("Added {} bytes as {} blocks, root {}", data.len(), block_count, root);
    Ok(root)
}

/// Open content for reading.
///
/// The root block is fetched before returning, so a missing root surfaces
/// as an error here; the remaining blocks are fetched while reading.
pub async fn get<B>(blocks: Arc<B>, id: &ContentId) -> Result<ContentReader, NodeError>
where
    B: BlockApi + ?Sized + 'static,
{
    let raw = blocks.get_block(id).await?;
    let root = DagNode::decode(&raw)?;
    Ok(ContentReader::new(blocks, root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BlockStore;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_add_and_read_small_content() {
        let store = Arc::new(BlockStore::temporary(1).unwrap());
        let id = add(store.as_ref(), b"hello blocks").await.unwrap();

        let mut reader = get(store, &id).await.unwrap();
        assert_eq!(reader.size(), 12);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello blocks");
    }

    #[tokio::test]
    async fn test_read_multi_block_content_in_order() {
        let store = Arc::new(BlockStore::temporary(1).unwrap());
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
        let id = add_with_chunk_size(store.as_ref(), &data, 1024).await.unwrap();

        assert_eq!(store.count().unwrap(), 11);

        let mut reader = get(store, &id).await.unwrap();
        assert_eq!(reader.size(), 10_000);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_empty_content_reads_nothing() {
        let store = Arc::new(BlockStore::temporary(1).unwrap());
        let id = add(store.as_ref(), &[]).await.unwrap();

        let mut reader = get(store, &id).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_fails_on_get() {
        let store = Arc::new(BlockStore::temporary(1).unwrap());
        let id = ContentId::from_data(b"never stored");

        let result = get(store, &id).await;
        assert!(matches!(result, Err(NodeError::BlockNotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_missing_leaf_fails_while_reading() {
        let store = Arc::new(BlockStore::temporary(1).unwrap());
        let data = vec![42u8; 4096];
        let id = add_with_chunk_size(store.as_ref(), &data, 1024).await.unwrap();

        let DagNode::File { links, .. } = DagNode::decode(&store.get(&id).unwrap()).unwrap() else {
            panic!("expected file root");
        };
        store.delete(&links[2].id).unwrap();

        let mut reader = get(store, &id).await.unwrap();
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).await.is_err());
    }
}
