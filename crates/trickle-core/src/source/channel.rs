//! In-process responses fed through a channel
//!
//! Lets a producer hand the engine a response whose chunks are pushed from
//! elsewhere in the program. The sending side can watch for the body being
//! cancelled or dropped.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BoxChunkSource, ChunkSource, StreamResponse};
use crate::error::StreamError;

/// Create a response with the given status and a body fed by the returned sender
pub fn channel(status: u16, capacity: usize) -> (ChunkSender, ChannelResponse) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancelled = CancellationToken::new();
    let sender = ChunkSender {
        tx,
        cancelled: cancelled.clone(),
    };
    let response = ChannelResponse {
        status,
        body: ChannelBody {
            rx: Some(rx),
            cancelled,
        },
    };
    (sender, response)
}

/// Producing half; dropping it completes the body
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<Result<Bytes, StreamError>>,
    cancelled: CancellationToken,
}

impl ChunkSender {
    /// Push a chunk; `false` once the body is gone
    pub async fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.send(Ok(chunk.into())).await.is_ok()
    }

    /// Make the next read fail with `err`
    pub async fn fail(&self, err: StreamError) -> bool {
        self.tx.send(Err(err)).await.is_ok()
    }

    /// Whether the consumer explicitly cancelled the body
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// Resolves when the consumer cancels the body
    pub async fn cancelled(&self) {
        self.cancelled.cancelled().await
    }

    /// Whether the body has been cancelled or dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the body has been cancelled or dropped
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Response half handed to the engine
#[derive(Debug)]
pub struct ChannelResponse {
    status: u16,
    body: ChannelBody,
}

impl StreamResponse for ChannelResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn into_body(self: Box<Self>) -> BoxChunkSource {
        Box::new(self.body)
    }
}

#[derive(Debug)]
pub struct ChannelBody {
    rx: Option<mpsc::Receiver<Result<Bytes, StreamError>>>,
    cancelled: CancellationToken,
}

#[async_trait]
impl ChunkSource for ChannelBody {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, StreamError>> {
        self.rx.as_mut()?.recv().await
    }

    async fn cancel(&mut self) {
        self.cancelled.cancel();
        self.rx = None;
    }
}
