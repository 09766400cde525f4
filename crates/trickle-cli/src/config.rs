//! CLI configuration file
//!
//! Read from `--config` or `<config dir>/trickle/config.toml`. Flags given on
//! the command line win over file values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};
use trickle_core::{DecodeMode, EngineConfig};

use crate::cli::{parse_header, Cli};

const DEFAULT_USER_AGENT: &str = concat!("trickle/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stop the stream after this many seconds
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: BTreeMap::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("trickle").join("config.toml"))
    }

    /// Load from an explicit path (must exist) or the default path (optional)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Fold command line overrides into the file config
    pub fn apply_cli(mut self, cli: &Cli) -> Result<Self> {
        if let Some(secs) = cli.timeout {
            self.timeout_secs = Some(secs);
        }
        if cli.strict {
            self.engine.decode = DecodeMode::Strict;
        }
        for raw in &cli.headers {
            let (name, value) = parse_header(raw)?;
            self.headers.insert(name, value);
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
