use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{Server, Udn};

/// Thread-safe index of known media servers, keyed by UDN
///
/// Reads return copies taken under the lock, so callers never observe a
/// record mid-update. Mutation is reserved to server discovery.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: Mutex<BTreeMap<Udn, Server>>,
}

impl ServerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The server with the given UDN, if present
    pub fn get(&self, udn: &Udn) -> Option<Server> {
        self.servers.lock().get(udn).cloned()
    }

    /// Whether a server with the given UDN is present
    pub fn contains(&self, udn: &Udn) -> bool {
        self.servers.lock().contains_key(udn)
    }

    /// Number of known servers
    pub fn len(&self) -> usize {
        self.servers.lock().len()
    }

    /// Whether no servers are known
    pub fn is_empty(&self) -> bool {
        self.servers.lock().is_empty()
    }

    /// UDNs of the servers known at the time of the call
    ///
    /// Later changes to the registry do not affect the returned iterator.
    pub fn iter(&self) -> std::vec::IntoIter<Udn> {
        let udns: Vec<Udn> = self.servers.lock().keys().cloned().collect();
        udns.into_iter()
    }

    /// Copies of every known server, ordered by UDN
    pub fn values(&self) -> Vec<Server> {
        self.servers.lock().values().cloned().collect()
    }

    /// Add or replace the record for `server.udn`, returning the replaced one
    pub(crate) fn insert(&self, server: Server) -> Option<Server> {
        self.servers.lock().insert(server.udn.clone(), server)
    }

    /// Remove the server currently exposed at `path`
    pub(crate) fn remove_by_path(&self, path: &str) -> Option<Server> {
        let mut servers = self.servers.lock();
        let udn = servers
            .values()
            .find(|server| server.path == path)
            .map(|server| server.udn.clone())?;
        servers.remove(&udn)
    }
}

impl<'a> IntoIterator for &'a ServerRegistry {
    type Item = Udn;
    type IntoIter = std::vec::IntoIter<Udn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
