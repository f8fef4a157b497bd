//! dleyna-client - Blocking client for the dLeyna media server daemon.
//!
//! Talks to `com.intel.dleyna-server` over D-Bus. The main features include:
//!
//! - Remote calls returned as futures that can be read synchronously
//! - A live registry of media servers kept current by bus notifications
//! - Browsing, searching and property lookup on media containers
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use dleyna_client::{config::ClientConfig, services::DleynaClient};
//!
//! let client = DleynaClient::connect(&ClientConfig::default())?;
//! client.initial_scan().get(Some(Duration::from_secs(2)))?;
//!
//! for server in client.servers().get(None)? {
//!     println!("{} at {}", server.friendly_name, server.path);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Client configuration loading.
pub mod config;

/// Command-line front end.
pub mod cli;

/// dLeyna services.
pub mod services;

/// Logging setup for binaries.
pub mod tracing_config;

pub use services::{CallError, DleynaClient, DleynaError, RemoteCallFuture};
