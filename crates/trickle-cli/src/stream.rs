//! Runs a stream session for the command line
//!
//! Chunks go to stdout as they arrive; everything else goes to stderr.

use std::future::Future;
use std::io::{self, ErrorKind, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};
use trickle_core::source::http;
use trickle_core::{LifecycleState, StreamCallbacks, StreamEngine, StreamProducer};

use crate::cli::Cli;
use crate::config::Config;

/// How the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    Interrupted,
}

impl Outcome {
    pub fn from_state(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Succeeded => Self::Succeeded,
            LifecycleState::Failed => Self::Failed,
            _ => Self::Interrupted,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Succeeded => ExitCode::SUCCESS,
            Self::Failed => ExitCode::FAILURE,
            // Same as a shell reports for SIGINT
            Self::Interrupted => ExitCode::from(130),
        }
    }
}

type StopFn = Box<dyn Fn() + Send + Sync>;

/// Stdout sink for chunks
///
/// Tracks whether a trailing newline is owed, and stops the session once
/// the reader has gone away (e.g. `trickle URL | head`).
#[derive(Default)]
struct Terminal {
    dirty: AtomicBool,
    stop: OnceLock<StopFn>,
}

impl Terminal {
    /// Stop `engine` when stdout is closed
    fn stop_on_broken_pipe<P: 'static>(&self, engine: &StreamEngine<P>) {
        let engine = engine.clone();
        let _ = self.stop.set(Box::new(move || engine.stop()));
    }

    fn write_chunk(&self, chunk: &str) {
        self.write_to(&mut io::stdout().lock(), chunk);
    }

    fn write_to(&self, out: &mut impl Write, chunk: &str) {
        match out.write_all(chunk.as_bytes()).and_then(|_| out.flush()) {
            Ok(()) => self.dirty.store(!chunk.ends_with('\n'), Ordering::Relaxed),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                warn!("Stdout closed, stopping stream");
                self.dirty.store(false, Ordering::Relaxed);
                if let Some(stop) = self.stop.get() {
                    stop();
                }
            }
            Err(e) => debug!("Failed to write to stdout: {}", e),
        }
    }

    fn finish_line(&self) {
        if self.dirty.swap(false, Ordering::Relaxed) {
            println!();
        }
    }
}

fn callbacks(terminal: Arc<Terminal>) -> StreamCallbacks {
    StreamCallbacks::new()
        .on_message(move |chunk| terminal.write_chunk(chunk))
        .on_error(|err| match err {
            Some(err) => eprintln!("trickle: {}", err),
            None => eprintln!("trickle: server rejected the request"),
        })
        .on_success(|text| debug!(chars = text.chars().count(), "Stream complete"))
}

fn build_client(config: &Config) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name '{}'", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header '{}'", name))?;
        headers.insert(header, value);
    }
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .build()
        .context("Failed to build HTTP client")
}

pub async fn run(cli: Cli) -> Result<Outcome> {
    let config = Config::load(cli.config.as_deref())?.apply_cli(&cli)?;
    let client = build_client(&config)?;
    let terminal = Arc::new(Terminal::default());
    let url = cli.url.clone();

    let outcome = match cli.data.as_deref() {
        Some(data) => {
            let body: serde_json::Value =
                serde_json::from_str(data).context("--data is not valid JSON")?;
            info!(%url, "POST stream");
            let producer = StreamProducer::with_param(move |body: serde_json::Value| {
                http::send(client.post(&url).json(&body))
            });
            let engine = StreamEngine::builder(producer)
                .callbacks(callbacks(terminal.clone()))
                .config(config.engine.clone())
                .build();
            terminal.stop_on_broken_pipe(&engine);
            drive(&engine, Some(body), config.timeout()).await?
        }
        None => {
            info!(%url, "GET stream");
            let producer: StreamProducer =
                StreamProducer::new(move || http::send(client.get(&url)));
            let engine = StreamEngine::builder(producer)
                .callbacks(callbacks(terminal.clone()))
                .config(config.engine.clone())
                .build();
            terminal.stop_on_broken_pipe(&engine);
            drive(&engine, None, config.timeout()).await?
        }
    };

    terminal.finish_line();
    Ok(outcome)
}

/// Resolves when `signal` reports an interrupt
///
/// If the handler could not be installed this never resolves, so the
/// stream keeps running without Ctrl-C support.
async fn interrupted(signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run one session, stopping it on Ctrl-C or when `timeout` elapses
pub async fn drive<P: Send + 'static>(
    engine: &StreamEngine<P>,
    param: Option<P>,
    timeout: Option<Duration>,
) -> Result<Outcome> {
    drive_until(engine, param, timeout, interrupted(tokio::signal::ctrl_c())).await
}

async fn drive_until<P: Send + 'static>(
    engine: &StreamEngine<P>,
    param: Option<P>,
    timeout: Option<Duration>,
    interrupt: impl Future<Output = ()>,
) -> Result<Outcome> {
    let mut session = engine.spawn(param);
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    tokio::pin!(interrupt);

    tokio::select! {
        result = &mut session => result.context("Stream task failed")?,
        _ = &mut interrupt => {
            info!("Interrupted, stopping stream");
            engine.stop();
            session.await.context("Stream task failed")?;
        }
        _ = &mut deadline => {
            warn!(?timeout, "Deadline reached, stopping stream");
            engine.stop();
            session.await.context("Stream task failed")?;
        }
    }

    Ok(Outcome::from_state(engine.state()))
}
