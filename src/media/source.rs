/// Sequential byte sources consumed by the spooler
///
/// Uploads and downloads are both read chunk by chunk through [`ChunkSource`],
/// so the byte ceiling is enforced while data arrives and no source ever has
/// to be seekable.
use crate::error::{MediaError, MediaResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read size used when pulling from an `AsyncRead`
pub const CHUNK_SIZE: usize = 8192;

/// A one-shot, sequential source of bytes
#[async_trait]
pub trait ChunkSource: Send {
    /// Next chunk, or `None` once the source is exhausted
    async fn next_chunk(&mut self) -> MediaResult<Option<Bytes>>;
}

/// Adapts any `AsyncRead` (files, in-memory cursors, sockets)
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0u8; CHUNK_SIZE],
        }
    }
}

#[async_trait]
impl<R> ChunkSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> MediaResult<Option<Bytes>> {
        let n = self.reader.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Bytes::copy_from_slice(&self.buf[..n])))
    }
}

/// Adapts a fallible byte stream, such as a `reqwest` response body
///
/// Stream errors are reported as `DownloadFailed`.
pub struct StreamSource<S> {
    stream: S,
}

impl<S> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S, E> ChunkSource for StreamSource<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send,
    E: std::fmt::Display + Send,
{
    async fn next_chunk(&mut self) -> MediaResult<Option<Bytes>> {
        match self.stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(MediaError::DownloadFailed(format!(
                "Failed to read chunk: {}",
                e
            ))),
            None => Ok(None),
        }
    }
}
