//! Shared test harness for engine tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use trickle_core::source::channel::{self, ChannelResponse, ChunkSender};
use trickle_core::{StreamCallbacks, StreamEngine, StreamProducer, StreamSnapshot};

pub const WAIT: Duration = Duration::from_secs(5);

/// Everything the callbacks saw, in order
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub messages: Vec<String>,
    pub errors: Vec<Option<String>>,
    pub successes: Vec<String>,
    /// "message" / "error" / "success" in call order
    pub order: Vec<&'static str>,
}

#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Recorded>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callbacks(&self) -> StreamCallbacks {
        let on_message = self.inner.clone();
        let on_error = self.inner.clone();
        let on_success = self.inner.clone();
        StreamCallbacks::new()
            .on_message(move |m| {
                let mut r = on_message.lock();
                r.messages.push(m.to_string());
                r.order.push("message");
            })
            .on_error(move |e| {
                let mut r = on_error.lock();
                r.errors.push(e.map(|e| e.to_string()));
                r.order.push("error");
            })
            .on_success(move |text| {
                let mut r = on_success.lock();
                r.successes.push(text.to_string());
                r.order.push("success");
            })
    }

    pub fn get(&self) -> Recorded {
        self.inner.lock().clone()
    }
}

/// Producer that hands out a single channel response
pub fn single(status: u16) -> (StreamProducer, ChunkSender) {
    let (tx, response) = channel::channel(status, 16);
    let slot = Mutex::new(Some(response));
    let producer = StreamProducer::new(move || {
        let response = slot.lock().take();
        async move { response.ok_or_else(|| std::io::Error::other("response already taken")) }
    });
    (producer, tx)
}

/// Producer that hands out the given responses in order
pub fn queued(statuses: &[u16]) -> (StreamProducer, Vec<ChunkSender>) {
    let mut senders = Vec::new();
    let mut responses = VecDeque::new();
    for &status in statuses {
        let (tx, response) = channel::channel(status, 16);
        senders.push(tx);
        responses.push_back(response);
    }
    let queue = Mutex::new(responses);
    let producer = StreamProducer::new(move || {
        let response = queue.lock().pop_front();
        async move { response.ok_or_else(|| std::io::Error::other("no more responses")) }
    });
    (producer, senders)
}

pub type Delivery = oneshot::Sender<Result<ChannelResponse, std::io::Error>>;

/// Producer whose responses arrive only when the test delivers them
pub fn scripted(sessions: usize) -> (StreamProducer, Vec<Delivery>) {
    let mut deliveries = Vec::new();
    let mut pending = VecDeque::new();
    for _ in 0..sessions {
        let (tx, rx) = oneshot::channel();
        deliveries.push(tx);
        pending.push_back(rx);
    }
    let pending = Mutex::new(pending);
    let producer = StreamProducer::new(move || {
        let rx = pending.lock().pop_front();
        async move {
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(std::io::Error::other("delivery dropped"))),
                None => Err(std::io::Error::other("no more sessions")),
            }
        }
    });
    (producer, deliveries)
}

pub fn engine(producer: StreamProducer, recorder: &Recorder) -> StreamEngine {
    StreamEngine::builder(producer)
        .callbacks(recorder.callbacks())
        .build()
}

/// Wait until the engine's snapshot satisfies `pred`
pub async fn wait_until<P>(engine: &StreamEngine<P>, pred: impl FnMut(&StreamSnapshot) -> bool) {
    let mut rx = engine.subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for snapshot")
        .expect("engine dropped");
}
