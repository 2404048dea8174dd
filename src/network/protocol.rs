//! Block exchange protocol definitions

use futures::prelude::*;
use libp2p::{request_response::Codec, StreamProtocol};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io;

use crate::content::ContentId;

/// Protocol name for block exchange
pub const BLOCK_PROTOCOL: StreamProtocol = StreamProtocol::new("/p2p-fetch/blocks/1.0.0");

/// Upper bound on an encoded message. Blocks are at most one chunk plus
/// framing, so this leaves generous headroom.
pub const MAX_MESSAGE_SIZE: u64 = 4 * 1024 * 1024;

/// Request for a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockRequest {
    Get { id: ContentId },
}

/// Response to block requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockResponse {
    Block { id: ContentId, data: Vec<u8> },
    NotFound { id: ContentId },
}

/// Bincode codec for the block protocol
#[derive(Debug, Clone, Default)]
pub struct BlockCodec;

async fn read_message<T, M>(io: &mut T) -> io::Result<M>
where
    T: AsyncRead + Unpin + Send,
    M: DeserializeOwned,
{
    let mut buf = Vec::new();
    io.take(MAX_MESSAGE_SIZE).read_to_end(&mut buf).await?;
    bincode::deserialize(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

async fn write_message<T, M>(io: &mut T, message: &M) -> io::Result<()>
where
    T: AsyncWrite + Unpin + Send,
    M: Serialize,
{
    let buf =
        bincode::serialize(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    io.write_all(&buf).await?;
    io.close().await?;
    Ok(())
}

#[async_trait::async_trait]
impl Codec for BlockCodec {
    type Protocol = StreamProtocol;
    type Request = BlockRequest;
    type Response = BlockResponse;

    async fn read_request<T>(
        &mut self,
        _: &Self::Protocol,
        io: &mut T,
    ) -> io::Result<Self::Request>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_message(io).await
    }

    async fn read_response<T>(
        &mut self,
        _: &Self::Protocol,
        io: &mut T,
    ) -> io::Result<Self::Response>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_message(io).await
    }

    async fn write_request<T>(
        &mut self,
        _: &Self::Protocol,
        io: &mut T,
        req: Self::Request,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_message(io, &req).await
    }

    async fn write_response<T>(
        &mut self,
        _: &Self::Protocol,
        io: &mut T,
        res: Self::Response,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_message(io, &res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;

    #[tokio::test]
    async fn test_codec_response_over_stream() {
        let mut codec = BlockCodec;
        let data = b"block bytes".to_vec();
        let response = BlockResponse::Block {
            id: ContentId::from_data(&data),
            data,
        };

        let mut wire = Cursor::new(Vec::new());
        codec
            .write_response(&BLOCK_PROTOCOL, &mut wire, response.clone())
            .await
            .unwrap();

        let mut wire = Cursor::new(wire.into_inner());
        let decoded = codec.read_response(&BLOCK_PROTOCOL, &mut wire).await.unwrap();
        assert_eq!(decoded, response);
    }

    #[tokio::test]
    async fn test_codec_rejects_garbage() {
        let mut codec = BlockCodec;
        let mut wire = Cursor::new(vec![0xff; 16]);
        let result = codec.read_request(&BLOCK_PROTOCOL, &mut wire).await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::InvalidData);
    }
}
