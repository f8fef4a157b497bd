use std::{collections::HashMap, sync::Arc};

use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::{BoxStream, FuturesUnordered},
};
use tracing::{debug, error, info, instrument, warn};

use super::{CallError, Completer, MediaBus, Server, ServerEvent, ServerRegistry};

/// Keeps a [`ServerRegistry`] in line with the servers the daemon announces
#[derive(Clone)]
pub struct ServerDiscovery {
    bus: Arc<dyn MediaBus>,
    registry: Arc<ServerRegistry>,
}

/// Outcome of one appearance's property fetch
struct Fetched {
    path: String,
    sequence: u64,
    listed: bool,
    server: Result<Server, CallError>,
}

/// Latest appearance per path whose property fetch is still in flight
///
/// A fetch only counts if no later Found or Lost was delivered for its path
/// while it ran.
#[derive(Debug, Default)]
struct Appearances {
    last: u64,
    in_flight: HashMap<String, u64>,
}

impl Appearances {
    fn begin(&mut self, path: &str) -> u64 {
        self.last += 1;
        self.in_flight.insert(path.to_string(), self.last);
        self.last
    }

    fn cancel(&mut self, path: &str) {
        self.in_flight.remove(path);
    }

    fn finish(&mut self, path: &str, sequence: u64) -> bool {
        if self.in_flight.get(path) != Some(&sequence) {
            return false;
        }
        self.in_flight.remove(path);
        true
    }
}

impl ServerDiscovery {
    /// Discovery feeding `registry` from `bus`
    pub fn new(bus: Arc<dyn MediaBus>, registry: Arc<ServerRegistry>) -> Self {
        Self { bus, registry }
    }

    /// Subscribe, populate the registry, then follow notifications until the bus closes
    ///
    /// Property fetches run concurrently, so a slow server never holds back
    /// the others. For any one path, notifications still take effect in
    /// delivery order. `initial_scan` is resolved once every server listed at
    /// startup has been registered or given up on.
    #[instrument(skip_all)]
    pub async fn run(self, initial_scan: Completer<()>) {
        let mut events = match self.bus.server_events().await {
            Ok(events) => Some(events),
            Err(e) => {
                error!("Cannot subscribe to media server notifications: {e}");
                None
            }
        };

        let mut appearances = Appearances::default();
        let mut fetches: FuturesUnordered<BoxFuture<'static, Fetched>> = FuturesUnordered::new();
        let mut initial_scan = Some(initial_scan);
        let mut listed = 0_usize;

        match self.bus.get_servers().await {
            Ok(paths) => {
                for path in paths {
                    let sequence = appearances.begin(&path);
                    fetches.push(self.fetch(path, sequence, true));
                    listed += 1;
                }
            }
            Err(e) => error!("Cannot retrieve digital media servers: {e}"),
        }

        loop {
            if let Some(done) = initial_scan.take_if(|_| listed == 0) {
                done.set(());
            }

            tokio::select! {
                Some(fetched) = fetches.next(), if !fetches.is_empty() => {
                    if fetched.listed {
                        listed -= 1;
                    }
                    self.settle(&mut appearances, fetched);
                }
                event = next_event(&mut events), if events.is_some() => match event {
                    Some(ServerEvent::Found(path)) => {
                        let sequence = appearances.begin(&path);
                        fetches.push(self.fetch(path, sequence, false));
                    }
                    Some(ServerEvent::Lost(path)) => {
                        appearances.cancel(&path);
                        self.handle_server_lost(&path);
                    }
                    None => {
                        info!("Media server notifications ended");
                        events = None;
                    }
                },
                else => break,
            }
        }
    }

    fn fetch(&self, path: String, sequence: u64, listed: bool) -> BoxFuture<'static, Fetched> {
        let bus = Arc::clone(&self.bus);
        async move {
            let server = match bus.get_all(&path, "").await {
                Ok(properties) => Server::from_properties(&path, properties),
                Err(e) => Err(e),
            };
            Fetched {
                path,
                sequence,
                listed,
                server,
            }
        }
        .boxed()
    }

    /// Register a fetched server unless its appearance was superseded
    #[instrument(skip_all, fields(path = %fetched.path))]
    fn settle(&self, appearances: &mut Appearances, fetched: Fetched) {
        let Fetched {
            path,
            sequence,
            server,
            ..
        } = fetched;

        if !appearances.finish(&path, sequence) {
            debug!("Discarding superseded properties of {path}");
            return;
        }

        match server {
            Ok(server) => {
                log_server_action("Found", &server);
                self.registry.insert(server);
            }
            Err(e) => warn!("Cannot access media server {path}: {e}"),
        }
    }

    /// Drop the server exposed at `path`, if any
    #[instrument(skip(self))]
    fn handle_server_lost(&self, path: &str) {
        match self.registry.remove_by_path(path) {
            Some(server) => log_server_action("Lost", &server),
            None => info!("Lost digital media server {path}"),
        }
    }
}

async fn next_event(events: &mut Option<BoxStream<'static, ServerEvent>>) -> Option<ServerEvent> {
    match events {
        Some(events) => events.next().await,
        None => None,
    }
}

fn log_server_action(action: &str, server: &Server) {
    info!(
        "{action} digital media server {}: {} [{}]",
        server.path, server.friendly_name, server.udn
    );
}
