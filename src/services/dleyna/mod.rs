//! Remote media server access through the dLeyna daemon.
//!
//! Remote calls are issued on a dispatch runtime and surface as blocking
//! [`RemoteCallFuture`]s. The set of reachable servers is mirrored in a
//! [`ServerRegistry`] driven by the daemon's notifications.

/// D-Bus transport abstraction and its zbus implementation
pub mod bus;
/// Client facade
pub mod client;
/// Server discovery and registry maintenance
pub mod discovery;
/// Issuing calls and resolving their futures
pub mod dispatch;
/// Error types
pub mod error;
/// Single-assignment call results
pub mod future;
/// D-Bus proxy trait definitions
pub mod proxy;
/// Server registry
pub mod registry;
/// Value and record types
pub mod types;

pub use bus::*;
pub use client::*;
pub use discovery::*;
pub use dispatch::*;
pub use error::*;
pub use future::*;
pub use proxy::*;
pub use registry::*;
pub use types::*;
