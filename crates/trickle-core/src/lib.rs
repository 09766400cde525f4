//! Trickle core
//!
//! Consumes an incrementally delivered text response, publishing progress
//! through callbacks and a reactive snapshot while supporting mid-flight
//! cancellation.
//!
//! ```no_run
//! use trickle_core::source::http;
//! use trickle_core::{StreamCallbacks, StreamEngine, StreamProducer};
//!
//! # async fn demo() {
//! let client = reqwest::Client::new();
//! let producer: StreamProducer =
//!     StreamProducer::new(move || http::send(client.get("http://localhost/stream")));
//! let engine = StreamEngine::builder(producer)
//!     .callbacks(StreamCallbacks::new().on_message(|chunk| print!("{chunk}")))
//!     .build();
//! engine.start().await;
//! println!("\n{}", engine.text());
//! # }
//! ```

pub mod cancellation;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod producer;
pub mod source;

pub use config::EngineConfig;
pub use decode::{DecodeMode, Utf8Decoder};
pub use engine::{StreamEngine, StreamEngineBuilder};
pub use error::{BoxError, StreamError};
pub use events::{StreamCallbacks, StreamEvent};
pub use lifecycle::{LifecycleState, StreamSnapshot};
pub use producer::StreamProducer;
pub use source::{ChunkSource, StreamBody, StreamResponse};
