use std::{sync::Arc, time::Duration};

use super::Udn;

/// Errors carried by a [`RemoteCallFuture`](super::RemoteCallFuture)
///
/// Cloneable so that every reader of a failed future observes the same failure.
#[derive(thiserror::Error, Debug, Clone)]
pub enum CallError {
    /// The remote call reached the bus and failed there
    #[error("D-Bus method {method} failed: {source}")]
    Transport {
        /// Method that was called
        method: String,
        /// Error reported by the bus
        #[source]
        source: Arc<zbus::Error>,
    },

    /// The local wait expired before the call resolved; calling `get` again may still succeed
    #[error("No result after waiting {0:?}")]
    Timeout(Duration),

    /// The reply arrived but did not have the expected shape
    #[error("Unexpected reply from {method}: {details}")]
    Decode {
        /// Method whose reply could not be decoded
        method: String,
        /// What was wrong with it
        details: String,
    },

    /// No media server with the given UDN is currently known
    #[error("Media server {0} not found")]
    ServerNotFound(Udn),

    /// The producer went away without ever resolving the future
    #[error("Remote call was abandoned before completing")]
    Abandoned,
}

impl CallError {
    /// Wrap a bus failure for the named method
    pub fn transport(method: impl Into<String>, source: zbus::Error) -> Self {
        Self::Transport {
            method: method.into(),
            source: Arc::new(source),
        }
    }

    /// Reply decoding failure for the named method
    pub fn decode(method: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decode {
            method: method.into(),
            details: details.into(),
        }
    }

    /// Whether this is a local wait timeout rather than a failure of the call itself
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors raised while setting up a client
#[derive(thiserror::Error, Debug)]
pub enum DleynaError {
    /// Could not open the bus connection
    #[error("D-Bus connection failed: {0}")]
    Connection(#[from] zbus::Error),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The dispatch runtime could not be started
    #[error("Failed to start dispatch runtime: {0}")]
    Runtime(String),

    /// A remote call failed
    #[error(transparent)]
    Call(#[from] CallError),
}
