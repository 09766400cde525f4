//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::decode::DecodeMode;

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings fixed at engine construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Handling of invalid UTF-8 in the body
    pub decode: DecodeMode,
    /// Trim leading/trailing whitespace from the observable and final text
    pub trim_text: bool,
    /// Buffered events per broadcast subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decode: DecodeMode::default(),
            trim_text: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Apply the configured trimming to accumulated text
    pub fn present<'a>(&self, text: &'a str) -> &'a str {
        if self.trim_text {
            text.trim()
        } else {
            text
        }
    }
}
