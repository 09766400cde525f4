//! Cancellation support for stream sessions
//!
//! Every session gets its own token and generation number, so a stop aimed
//! at one session can never leak into the next.

use tokio_util::sync::CancellationToken;

/// Cancellation handle for a single session
#[derive(Debug, Clone)]
pub struct SessionCancellation {
    token: CancellationToken,
    generation: u64,
}

impl SessionCancellation {
    pub fn new(generation: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Signal the session to stop
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the session is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Tracks which session is current and hands out fresh tokens
#[derive(Debug, Default)]
pub struct CancellationController {
    current: Option<SessionCancellation>,
    generation: u64,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token for a new session, tearing down the previous one
    pub fn begin(&mut self) -> SessionCancellation {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        self.generation += 1;
        let session = SessionCancellation::new(self.generation);
        self.current = Some(session.clone());
        session
    }

    /// Cancel the live session, returning its generation
    ///
    /// `None` when there is nothing to stop or it was already stopped.
    pub fn stop(&mut self) -> Option<u64> {
        let session = self.current.as_ref()?;
        if session.is_stop_requested() {
            return None;
        }
        session.cancel();
        Some(session.generation)
    }

    /// Latest generation handed out
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Whether `generation` is live and has a pending stop
    pub fn is_stop_requested(&self, generation: u64) -> bool {
        self.current
            .as_ref()
            .is_some_and(|s| s.generation == generation && s.is_stop_requested())
    }

    /// Retire the session's token once its loop has exited
    ///
    /// Clears any consumed stop request along with it.
    pub fn finish(&mut self, generation: u64) {
        if self
            .current
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            self.current = None;
        }
    }
}
