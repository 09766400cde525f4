//! Command line arguments

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "trickle", version, about = "Stream an HTTP response to the terminal as it arrives")]
pub struct Cli {
    /// Endpoint to stream from
    pub url: String,

    /// POST this JSON body instead of issuing a GET
    #[arg(short, long, value_name = "JSON")]
    pub data: Option<String>,

    /// Extra request header, e.g. "Authorization: Bearer abc" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "K: V")]
    pub headers: Vec<String>,

    /// Stop the stream after this many seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Config file (defaults to <config dir>/trickle/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Fail on invalid UTF-8 instead of substituting U+FFFD
    #[arg(long)]
    pub strict: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Split a "Name: value" header argument
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header must look like 'Name: value', got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("header name is empty in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
