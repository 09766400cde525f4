//! Stream events
//!
//! Callbacks and the broadcast channel are fed from the same emit calls,
//! so both views see the same sequence.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::StreamError;

pub type MessageCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(Option<&StreamError>) + Send + Sync>;
pub type SuccessCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Caller-supplied notifications; any of them may be absent
#[derive(Clone, Default)]
pub struct StreamCallbacks {
    on_message: Option<MessageCallback>,
    on_error: Option<ErrorCallback>,
    on_success: Option<SuccessCallback>,
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with each newly decoded piece of text
    pub fn on_message(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Called once when a session fails
    ///
    /// A rejected request carries no payload; transport failures pass the error.
    pub fn on_error(mut self, f: impl Fn(Option<&StreamError>) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called once with the final text when the body completes
    pub fn on_success(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}

/// Events during a stream session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Session started
    Started { generation: u64 },
    /// Response accepted, body streaming
    Streaming { generation: u64 },
    /// Newly decoded text
    Message { generation: u64, chunk: String },
    /// Body completed
    Succeeded { generation: u64, text: String },
    /// Session failed; `error` is absent for a rejected request
    Failed {
        generation: u64,
        status: Option<u16>,
        error: Option<String>,
    },
    /// Caller stopped the session
    Interrupted { generation: u64 },
}

/// Fans events out to callbacks and broadcast subscribers
pub struct EventBus {
    callbacks: StreamCallbacks,
    tx: broadcast::Sender<StreamEvent>,
}

impl EventBus {
    pub fn new(callbacks: StreamCallbacks, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { callbacks, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: StreamEvent) {
        debug!("Stream event: {:?}", event);
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn started(&self, generation: u64) {
        self.publish(StreamEvent::Started { generation });
    }

    pub fn streaming(&self, generation: u64) {
        self.publish(StreamEvent::Streaming { generation });
    }

    pub fn message(&self, generation: u64, chunk: &str) {
        if let Some(f) = &self.callbacks.on_message {
            f(chunk);
        }
        self.publish(StreamEvent::Message {
            generation,
            chunk: chunk.to_string(),
        });
    }

    pub fn succeeded(&self, generation: u64, text: &str) {
        if let Some(f) = &self.callbacks.on_success {
            f(text);
        }
        self.publish(StreamEvent::Succeeded {
            generation,
            text: text.to_string(),
        });
    }

    /// `status` identifies a rejected request; `error` a transport failure
    pub fn failed(&self, generation: u64, status: Option<u16>, error: Option<&StreamError>) {
        if let Some(f) = &self.callbacks.on_error {
            f(error);
        }
        self.publish(StreamEvent::Failed {
            generation,
            status,
            error: error.map(|e| e.to_string()),
        });
    }

    pub fn interrupted(&self, generation: u64) {
        self.publish(StreamEvent::Interrupted { generation });
    }
}
