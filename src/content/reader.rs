//! Streaming reader over a file DAG

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;

use super::dag::DagNode;
use super::id::ContentId;
use crate::network::BlockApi;

enum Pending {
    Data(Vec<u8>),
    Link(ContentId),
}

/// Byte stream over retrieved content.
///
/// Linked blocks are fetched one at a time as the reader advances, so at
/// most one block is held in memory.
pub struct ContentReader {
    size: u64,
    inner: StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>,
}

impl ContentReader {
    pub(crate) fn new<B>(blocks: Arc<B>, root: DagNode) -> Self
    where
        B: BlockApi + ?Sized + 'static,
    {
        let size = root.size();
        let mut pending = VecDeque::new();
        push_node(&mut pending, root);

        let chunks = stream::try_unfold((blocks, pending), |(blocks, mut pending)| async move {
            loop {
                match pending.pop_front() {
                    None => return Ok::<_, io::Error>(None),
                    Some(Pending::Data(data)) => {
                        if data.is_empty() {
                            continue;
                        }
                        return Ok(Some((Bytes::from(data), (blocks, pending))));
                    }
                    Some(Pending::Link(id)) => {
                        let raw = blocks
                            .get_block(&id)
                            .await
                            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                        let node = DagNode::decode(&raw)
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                        let mut children = VecDeque::new();
                        push_node(&mut children, node);
                        // Children come before whatever followed the link
                        children.append(&mut pending);
                        pending = children;
                    }
                }
            }
        });

        Self {
            size,
            inner: StreamReader::new(chunks.boxed()),
        }
    }

    /// Total content size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}

fn push_node(pending: &mut VecDeque<Pending>, node: DagNode) {
    match node {
        DagNode::Raw(data) => pending.push_back(Pending::Data(data)),
        DagNode::File { links, .. } => {
            pending.extend(links.into_iter().map(|link| Pending::Link(link.id)));
        }
    }
}

impl AsyncRead for ContentReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl std::fmt::Debug for ContentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentReader").field("size", &self.size).finish()
    }
}
