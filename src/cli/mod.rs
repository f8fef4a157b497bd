//! Command-line front end for browsing dLeyna media servers.
//!
//! Mirrors the daemon's object model: with no path the known servers are
//! printed, otherwise the object at the path is inspected, listed or searched.
//! Results are printed as JSON.

pub mod formatting;

use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::warn;

use crate::{
    config::ClientConfig,
    services::{CallError, DleynaClient, Page},
};

/// Errors that can occur while running a CLI invocation
#[derive(Error, Debug)]
pub enum CliError {
    /// The remote call failed or did not finish in time
    #[error("{0}")]
    Call(#[from] CallError),

    /// The result could not be rendered
    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Browse media servers exposed by the dLeyna daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "dleyna", version)]
pub struct Cli {
    /// Object path to inspect; lists known servers when omitted
    pub path: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Comma-separated property filter
    #[arg(short, long, value_delimiter = ',')]
    pub filter: Option<Vec<String>>,

    /// JSON indentation, zero for a single line
    #[arg(short, long, default_value_t = 2)]
    pub indent: usize,

    /// List the children of the container at PATH
    #[arg(short, long)]
    pub list: bool,

    /// Search below the container at PATH
    #[arg(short, long)]
    pub query: Option<String>,

    /// Seconds to wait for a reply; waits indefinitely when neither this nor the config sets it
    #[arg(short, long)]
    pub timeout: Option<f64>,

    /// D-Bus address to use instead of the session bus
    #[arg(short, long)]
    pub address: Option<String>,
}

impl Cli {
    /// Merge command-line overrides into the loaded configuration
    pub fn apply_to(&self, config: &mut ClientConfig) {
        if let Some(address) = &self.address {
            config.address = Some(address.clone());
        }
        if let Some(filter) = &self.filter {
            config.filter = filter.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = Some((timeout.max(0.0) * 1000.0) as u64);
        }
    }

    /// Run the requested query against `client` and render the result
    ///
    /// # Errors
    /// Returns error if the remote call fails, times out, or cannot be rendered
    pub fn execute(&self, client: &DleynaClient, config: &ClientConfig) -> Result<String, CliError> {
        let timeout = config.timeout();
        let filter: Vec<&str> = config.filter.iter().map(String::as_str).collect();

        let Some(path) = &self.path else {
            wait_for_initial_scan(client, timeout);
            let servers = client
                .servers()
                .apply(|servers| {
                    servers
                        .into_iter()
                        .map(|server| server.properties)
                        .collect::<Vec<_>>()
                })
                .get(timeout)?;
            return Ok(formatting::to_json(&servers, self.indent)?);
        };

        let output = if self.list {
            let children = client.browse(path, Page::default(), &filter).get(timeout)?;
            formatting::to_json(&children, self.indent)?
        } else if let Some(query) = &self.query {
            let objects = client
                .search(path, query, Page::default(), &filter)
                .get(timeout)?;
            formatting::to_json(&objects, self.indent)?
        } else {
            let properties = client.properties(path, None).get(timeout)?;
            formatting::to_json(&properties, self.indent)?
        };

        Ok(output)
    }
}

fn wait_for_initial_scan(client: &DleynaClient, timeout: Option<Duration>) {
    let timeout = timeout.unwrap_or(Duration::from_secs(5));
    if let Err(e) = client.initial_scan().get(Some(timeout)) {
        warn!("Server list may be incomplete: {e}");
    }
}
