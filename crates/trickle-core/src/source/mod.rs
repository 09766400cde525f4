//! Response and body sources
//!
//! The engine only needs three things from a response: whether it
//! succeeded, its status code, and a body it can pull chunks from and
//! cancel.

pub mod channel;
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::error::{BoxError, StreamError};

/// Asynchronous source of body chunks
#[async_trait]
pub trait ChunkSource: Send {
    /// Next chunk, or `None` once the body is complete
    async fn next_chunk(&mut self) -> Option<Result<Bytes, StreamError>>;

    /// Stop delivery and release the underlying resource
    async fn cancel(&mut self);
}

pub type BoxChunkSource = Box<dyn ChunkSource>;

/// A resolved response
pub trait StreamResponse: Send {
    fn is_success(&self) -> bool;

    fn status(&self) -> u16;

    fn into_body(self: Box<Self>) -> BoxChunkSource;
}

pub type BoxResponse = Box<dyn StreamResponse>;

/// Adapts any stream of byte results into a [`ChunkSource`]
pub struct StreamBody {
    inner: Option<BoxStream<'static, Result<Bytes, BoxError>>>,
}

impl StreamBody {
    pub fn new<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
    {
        let stream = stream.map(|item| -> Result<Bytes, BoxError> {
            item.map(Into::into).map_err(Into::into)
        });
        Self {
            inner: Some(stream.boxed()),
        }
    }

    /// A body with no chunks
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Whether the underlying stream has been dropped
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }
}

#[async_trait]
impl ChunkSource for StreamBody {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, StreamError>> {
        let stream = self.inner.as_mut()?;
        stream.next().await.map(|item| item.map_err(StreamError::Transport))
    }

    async fn cancel(&mut self) {
        // Dropping the stream closes the connection behind it
        self.inner = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_body_yields_then_completes() {
        let chunks = vec![
            Ok::<_, std::io::Error>(b"one".to_vec()),
            Ok(b"two".to_vec()),
        ];
        let mut body = StreamBody::new(futures::stream::iter(chunks));

        assert_eq!(body.next_chunk().await.unwrap().unwrap(), Bytes::from("one"));
        assert_eq!(body.next_chunk().await.unwrap().unwrap(), Bytes::from("two"));
        assert!(body.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_body_maps_errors_to_transport() {
        let chunks = vec![Err::<Vec<u8>, _>(std::io::Error::other("boom"))];
        let mut body = StreamBody::new(futures::stream::iter(chunks));

        match body.next_chunk().await {
            Some(Err(StreamError::Transport(e))) => assert_eq!(e.to_string(), "boom"),
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_drops_stream() {
        let mut body = StreamBody::new(futures::stream::pending::<Result<Bytes, std::io::Error>>());
        assert!(!body.is_released());
        body.cancel().await;
        assert!(body.is_released());
        assert!(body.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_body_completes_immediately() {
        let mut body = StreamBody::empty();
        assert!(body.next_chunk().await.is_none());
    }
}
