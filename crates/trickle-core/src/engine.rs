//! Stream engine
//!
//! Issues the request, validates the response, runs the decode loop and
//! arbitrates between that loop and `stop()`.
//!
//! Every mutation a session makes is checked against the generation it was
//! started with, so a loop that has been superseded by a newer `start` can
//! unwind at its own pace without touching the new session's state.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cancellation::{CancellationController, SessionCancellation};
use crate::config::EngineConfig;
use crate::decode::Utf8Decoder;
use crate::error::StreamError;
use crate::events::{EventBus, StreamCallbacks, StreamEvent};
use crate::lifecycle::{LifecycleState, StreamSnapshot};
use crate::producer::StreamProducer;
use crate::source::BoxResponse;

/// How a session's loop exited without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Completed,
    Cancelled,
}

/// Lifecycle bookkeeping, behind one lock
///
/// The accumulated text lives in the snapshot itself and is only written
/// while this lock is held.
#[derive(Debug, Default)]
struct Inner {
    state: LifecycleState,
    sessions: CancellationController,
}

struct Shared {
    inner: Mutex<Inner>,
    snapshot: watch::Sender<StreamSnapshot>,
    events: EventBus,
    config: EngineConfig,
}

impl Shared {
    /// Publish a state change; the text is left as it is
    fn publish(&self, inner: &Inner) {
        let generation = inner.sessions.generation();
        let state = inner.state;
        self.snapshot.send_modify(|snapshot| {
            snapshot.generation = generation;
            snapshot.state = state;
        });
    }

    fn presented_text(&self) -> String {
        self.config.present(&self.snapshot.borrow().text).to_string()
    }

    /// Move `generation` to `next` if it is still live and the edge is legal
    fn advance(&self, inner: &mut Inner, generation: u64, next: LifecycleState) -> bool {
        if !inner.sessions.is_current(generation) || inner.sessions.is_stop_requested(generation)
        {
            return false;
        }
        if !inner.state.can_transition_to(next) {
            warn!(
                generation,
                from = ?inner.state,
                to = ?next,
                "Refusing illegal lifecycle transition"
            );
            return false;
        }
        inner.state = next;
        self.publish(inner);
        true
    }

    fn begin(&self) -> SessionCancellation {
        let session = {
            let mut inner = self.inner.lock();
            let session = inner.sessions.begin();
            inner.state = LifecycleState::Loading;
            let generation = session.generation();
            self.snapshot.send_modify(|snapshot| {
                snapshot.generation = generation;
                snapshot.state = LifecycleState::Loading;
                snapshot.text.clear();
            });
            session
        };
        self.events.started(session.generation());
        session
    }

    fn start_streaming(&self, generation: u64) -> bool {
        let advanced = {
            let mut inner = self.inner.lock();
            self.advance(&mut inner, generation, LifecycleState::Processing)
        };
        if advanced {
            self.events.streaming(generation);
        }
        advanced
    }

    fn append(&self, generation: u64, chunk: &str) -> bool {
        {
            let inner = self.inner.lock();
            if !inner.sessions.is_current(generation)
                || inner.sessions.is_stop_requested(generation)
                || inner.state != LifecycleState::Processing
            {
                return false;
            }
            self.snapshot.send_modify(|snapshot| snapshot.text.push_str(chunk));
        }
        self.events.message(generation, chunk);
        true
    }

    fn succeed(&self, generation: u64) -> bool {
        let text = {
            let mut inner = self.inner.lock();
            if !self.advance(&mut inner, generation, LifecycleState::Succeeded) {
                return false;
            }
            inner.sessions.finish(generation);
            self.presented_text()
        };
        self.events.succeeded(generation, &text);
        true
    }

    fn fail(&self, generation: u64, err: &StreamError) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.sessions.is_stop_requested(generation) {
                debug!(generation, error = %err, "Failure suppressed, session was stopped");
                return false;
            }
            if !self.advance(&mut inner, generation, LifecycleState::Failed) {
                return false;
            }
            inner.sessions.finish(generation);
        }
        // A rejection is reported by status alone
        let status = err.status();
        let payload = if status.is_some() { None } else { Some(err) };
        self.events.failed(generation, status, payload);
        true
    }

    fn stop(&self) {
        let generation = {
            let mut inner = self.inner.lock();
            let Some(generation) = inner.sessions.stop() else {
                return;
            };
            if inner.state.is_active() {
                inner.state = LifecycleState::Interrupted;
            }
            self.publish(&inner);
            generation
        };
        info!(generation, "Stream stop requested");
        self.events.interrupted(generation);
    }

    /// Runs on every exit from a session
    ///
    /// Clears Loading/Processing and retires the session token, which also
    /// drops a consumed stop request. Re-clearing after `stop()` is a no-op.
    fn release(&self, generation: u64) {
        let interrupted = {
            let mut inner = self.inner.lock();
            if !inner.sessions.is_current(generation) {
                return;
            }
            let active = inner.state.is_active();
            if active {
                debug!(generation, "Session ended without reaching a terminal state");
                inner.state = LifecycleState::Interrupted;
                self.publish(&inner);
            }
            inner.sessions.finish(generation);
            active
        };
        if interrupted {
            self.events.interrupted(generation);
        }
    }
}

/// Consumes streamed text responses, one session at a time
pub struct StreamEngine<P = ()> {
    producer: StreamProducer<P>,
    shared: Arc<Shared>,
}

impl<P> Clone for StreamEngine<P> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P> fmt::Debug for StreamEngine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("StreamEngine")
            .field("producer", &self.producer)
            .field("state", &inner.state)
            .field("generation", &inner.sessions.generation())
            .field("text_len", &self.shared.snapshot.borrow().text.len())
            .finish()
    }
}

impl<P> StreamEngine<P> {
    pub fn new(producer: StreamProducer<P>) -> Self {
        Self::builder(producer).build()
    }

    pub fn builder(producer: StreamProducer<P>) -> StreamEngineBuilder<P> {
        StreamEngineBuilder {
            producer,
            callbacks: StreamCallbacks::default(),
            config: EngineConfig::default(),
        }
    }

    /// Request cancellation of the active session
    ///
    /// Flags are cleared immediately; the loop unwinds at its next
    /// suspension point. A no-op when nothing is running.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.inner.lock().state
    }

    /// Accumulated text of the latest session, trimmed if configured
    pub fn text(&self) -> String {
        self.shared.presented_text()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn is_processing(&self) -> bool {
        self.state().is_processing()
    }

    pub fn is_success(&self) -> bool {
        self.state().is_success()
    }

    pub fn is_error(&self) -> bool {
        self.state().is_error()
    }

    /// Watch the snapshot as it changes
    pub fn subscribe(&self) -> watch::Receiver<StreamSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Receive every event from now on
    pub fn events(&self) -> broadcast::Receiver<StreamEvent> {
        self.shared.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }
}

impl<P: Send + 'static> StreamEngine<P> {
    /// Run a session to completion, with or without a parameter
    pub async fn run(&self, param: Option<P>) {
        let session = self.shared.begin();
        self.drive(session, param).await
    }

    /// Run a session with a zero-argument producer
    pub async fn start(&self) {
        self.run(None).await
    }

    /// Run a session passing `param` to the producer
    pub async fn start_with(&self, param: P) {
        self.run(Some(param)).await
    }

    /// Start a session on a background task
    ///
    /// The session is registered before this returns, so an immediate
    /// `stop()` applies to it.
    pub fn spawn(&self, param: Option<P>) -> JoinHandle<()> {
        let session = self.shared.begin();
        let engine = self.clone();
        tokio::spawn(async move { engine.drive(session, param).await })
    }

    async fn drive(&self, session: SessionCancellation, param: Option<P>) {
        let generation = session.generation();
        let span = info_span!("stream_session", generation, id = %Uuid::new_v4());

        async move {
            let shared = Arc::clone(&self.shared);
            let _in_flight = scopeguard::guard(shared, move |shared| shared.release(generation));

            info!("Stream session started");
            match self.consume(&session, param).await {
                Ok(Exit::Completed) => info!("Stream session completed"),
                Ok(Exit::Cancelled) => info!("Stream session cancelled"),
                Err(err) => {
                    match &err {
                        StreamError::RequestRejected { status } => {
                            warn!(status, "Stream request rejected")
                        }
                        _ => error!(error = %err, "Stream session failed"),
                    }
                    self.shared.fail(generation, &err);
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn consume(
        &self,
        session: &SessionCancellation,
        param: Option<P>,
    ) -> Result<Exit, StreamError> {
        let generation = session.generation();

        let request = self.producer.invoke(param);
        let response: BoxResponse = tokio::select! {
            biased;
            _ = session.cancelled() => return Ok(Exit::Cancelled),
            response = request => response?,
        };

        if !response.is_success() {
            return Err(StreamError::RequestRejected {
                status: response.status(),
            });
        }
        if !self.shared.start_streaming(generation) {
            return Ok(Exit::Cancelled);
        }

        let mut body = response.into_body();
        let mut decoder = Utf8Decoder::new(self.shared.config.decode);
        let mut chunks = 0usize;

        loop {
            let read = tokio::select! {
                biased;
                _ = session.cancelled() => None,
                read = body.next_chunk() => Some(read),
            };
            // A stop that lands together with end-of-body still wins
            let read = match read {
                Some(read) if !session.is_stop_requested() => read,
                _ => {
                    body.cancel().await;
                    debug!(chunks, "Body cancelled");
                    return Ok(Exit::Cancelled);
                }
            };

            let Some(chunk) = read else {
                let tail = decoder.finish()?;
                if !tail.is_empty() && !self.shared.append(generation, &tail) {
                    return Ok(Exit::Cancelled);
                }
                debug!(chunks, "Body complete");
                return Ok(if self.shared.succeed(generation) {
                    Exit::Completed
                } else {
                    Exit::Cancelled
                });
            };

            let bytes = chunk?;
            chunks += 1;
            debug!(chunk = chunks, bytes = bytes.len(), "Chunk received");

            let text = decoder.decode(&bytes)?;
            if text.is_empty() {
                continue;
            }
            if !self.shared.append(generation, &text) {
                body.cancel().await;
                return Ok(Exit::Cancelled);
            }
        }
    }
}

/// Builder for [`StreamEngine`]
pub struct StreamEngineBuilder<P = ()> {
    producer: StreamProducer<P>,
    callbacks: StreamCallbacks,
    config: EngineConfig,
}

impl<P> StreamEngineBuilder<P> {
    pub fn callbacks(mut self, callbacks: StreamCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn on_message(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_message(f);
        self
    }

    pub fn on_error(mut self, f: impl Fn(Option<&StreamError>) + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_error(f);
        self
    }

    pub fn on_success(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callbacks = self.callbacks.on_success(f);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> StreamEngine<P> {
        let (snapshot, _) = watch::channel(StreamSnapshot::default());
        let events = EventBus::new(self.callbacks, self.config.event_capacity);
        StreamEngine {
            producer: self.producer,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                snapshot,
                events,
                config: self.config,
            }),
        }
    }
}
