//! Stream lifecycle state
//!
//! One enum is the source of truth; the boolean flags callers poll are
//! derived from it rather than tracked separately.

use serde::Serialize;

/// Lifecycle of the current stream session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No session has been started
    #[default]
    Idle,
    /// Request issued, response not yet received
    Loading,
    /// Response accepted, chunks being consumed
    Processing,
    /// Body completed
    Succeeded,
    /// Request rejected or transport failed
    Failed,
    /// Stopped by the caller before completion
    Interrupted,
}

impl LifecycleState {
    #[inline]
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    /// A consumption attempt is underway (loading counts too)
    #[inline]
    pub fn is_processing(self) -> bool {
        matches!(self, Self::Loading | Self::Processing)
    }

    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Self::Failed)
    }

    #[inline]
    pub fn is_interrupted(self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Session still in flight
    #[inline]
    pub fn is_active(self) -> bool {
        self.is_processing()
    }

    /// Succeeded or Failed
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Transition table
    ///
    /// Starting a session (to Loading) is always allowed; every other edge
    /// leaves an active state.
    pub fn can_transition_to(self, next: Self) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (_, Loading) => true,
            (Loading, Processing) => true,
            (Loading | Processing, Failed) => true,
            (Processing, Succeeded) => true,
            (Loading | Processing, Interrupted) => true,
            _ => false,
        }
    }
}

/// Point-in-time view of an engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSnapshot {
    /// Session the snapshot belongs to (0 before the first start)
    pub generation: u64,
    pub state: LifecycleState,
    /// Accumulated text as received
    ///
    /// Grown in place on every append and never trimmed;
    /// `StreamEngine::text` applies the configured trimming.
    pub text: String,
}

impl StreamSnapshot {
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn is_processing(&self) -> bool {
        self.state.is_processing()
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn is_error(&self) -> bool {
        self.state.is_error()
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.is_interrupted()
    }
}
