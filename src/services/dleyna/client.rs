use std::sync::Arc;

use tokio::{
    runtime::{Handle, Runtime},
    task::JoinHandle,
};
use tracing::{Dispatch, info};

use super::{
    Arg, CallDispatcher, CallError, DleynaError, MEDIA_CONTAINER_IFACE, MediaBus, MediaObject,
    PROPERTIES_IFACE, RemoteCall, RemoteCallFuture, SERVER_MANAGER_IFACE, SERVER_ROOT_PATH,
    Server, ServerDiscovery, ServerRegistry, Udn, ZbusMediaBus,
};
use crate::config::ClientConfig;

/// Property filter selecting every property
pub const ALL_PROPERTIES: &[&str] = &["*"];

/// Window of results for paged calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Index of the first result
    pub offset: u32,
    /// Maximum number of results, zero meaning no limit
    pub limit: u32,
}

impl Page {
    /// Page starting at `offset` with at most `limit` results
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }
}

/// Client for the dLeyna media server daemon
///
/// Every operation returns at once with a [`RemoteCallFuture`]; blocking is
/// left to whoever reads it. The set of available servers is tracked in the
/// background from the daemon's notifications.
pub struct DleynaClient {
    bus: Arc<dyn MediaBus>,
    registry: Arc<ServerRegistry>,
    dispatcher: CallDispatcher,
    initial_scan: RemoteCallFuture<()>,
    discovery_handle: JoinHandle<()>,
    runtime: Option<Runtime>,
}

impl DleynaClient {
    /// Connect to the daemon on the bus selected by `config`
    ///
    /// Starts a private runtime whose threads deliver replies and
    /// notifications. Must not be called from within an async context.
    ///
    /// # Errors
    /// Returns error if the runtime cannot start or the bus cannot be reached
    pub fn connect(config: &ClientConfig) -> Result<Self, DleynaError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("dleyna-dispatch")
            .enable_all()
            .build()
            .map_err(|e| DleynaError::Runtime(e.to_string()))?;

        let bus = runtime.block_on(async {
            match &config.address {
                Some(address) => ZbusMediaBus::with_address(address).await,
                None => ZbusMediaBus::session().await,
            }
        })?;

        let mut client = Self::builder(Arc::new(bus))
            .handle(runtime.handle().clone())
            .build()?;
        client.runtime = Some(runtime);

        Ok(client)
    }

    /// Build a client around an existing bus and runtime
    pub fn builder(bus: Arc<dyn MediaBus>) -> ClientBuilder {
        ClientBuilder {
            bus,
            handle: None,
            dispatch: None,
        }
    }

    /// Children of the container at `path`
    pub fn browse(
        &self,
        path: &str,
        page: Page,
        filter: &[&str],
    ) -> RemoteCallFuture<Vec<MediaObject>> {
        let filter = owned_filter(filter);
        let call = RemoteCall::new(path, MEDIA_CONTAINER_IFACE, "ListChildren")
            .arg(Arg::U32(page.offset))
            .arg(Arg::U32(page.limit))
            .arg(Arg::StrList(filter.clone()));

        let bus = Arc::clone(&self.bus);
        let path = path.to_string();
        self.dispatcher.call(call, async move {
            bus.list_children(&path, page.offset, page.limit, &filter)
                .await
        })
    }

    /// Properties of the object at `path`, of every interface unless one is named
    pub fn properties(&self, path: &str, interface: Option<&str>) -> RemoteCallFuture<MediaObject> {
        let interface = interface.unwrap_or_default().to_string();
        let call = RemoteCall::new(path, PROPERTIES_IFACE, "GetAll")
            .arg(Arg::Str(interface.clone()));

        let bus = Arc::clone(&self.bus);
        let path = path.to_string();
        self.dispatcher
            .call(call, async move { bus.get_all(&path, &interface).await })
    }

    /// Objects below the container at `path` matching the UPnP search `query`
    pub fn search(
        &self,
        path: &str,
        query: &str,
        page: Page,
        filter: &[&str],
    ) -> RemoteCallFuture<Vec<MediaObject>> {
        let filter = owned_filter(filter);
        let query = query.to_string();
        let call = RemoteCall::new(path, MEDIA_CONTAINER_IFACE, "SearchObjects")
            .arg(Arg::Str(query.clone()))
            .arg(Arg::U32(page.offset))
            .arg(Arg::U32(page.limit))
            .arg(Arg::StrList(filter.clone()));

        let bus = Arc::clone(&self.bus);
        let path = path.to_string();
        self.dispatcher.call(call, async move {
            bus.search_objects(&path, &query, page.offset, page.limit, &filter)
                .await
        })
    }

    /// Ask the daemon to look for media servers again
    pub fn rescan(&self) -> RemoteCallFuture<()> {
        let call = RemoteCall::new(SERVER_ROOT_PATH, SERVER_MANAGER_IFACE, "Rescan");
        let bus = Arc::clone(&self.bus);
        self.dispatcher.call(call, async move { bus.rescan().await })
    }

    /// The known server with the given UDN
    ///
    /// Already resolved; fails with [`CallError::ServerNotFound`] for unknown UDNs.
    pub fn server(&self, udn: &Udn) -> RemoteCallFuture<Server> {
        match self.registry.get(udn) {
            Some(server) => RemoteCallFuture::from_value(server),
            None => RemoteCallFuture::from_error(CallError::ServerNotFound(udn.clone())),
        }
    }

    /// Every known server, already resolved
    pub fn servers(&self) -> RemoteCallFuture<Vec<Server>> {
        RemoteCallFuture::from_value(self.registry.values())
    }

    /// Live index of known servers
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Resolves once every server present at startup has been registered or given up on
    pub fn initial_scan(&self) -> RemoteCallFuture<()> {
        self.initial_scan.clone()
    }
}

impl Drop for DleynaClient {
    fn drop(&mut self) {
        self.discovery_handle.abort();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for DleynaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DleynaClient")
            .field("servers", &self.registry.len())
            .field("initial_scan", &self.initial_scan)
            .finish_non_exhaustive()
    }
}

fn owned_filter(filter: &[&str]) -> Vec<String> {
    filter.iter().map(|property| property.to_string()).collect()
}

/// Builder for [`DleynaClient`]
pub struct ClientBuilder {
    bus: Arc<dyn MediaBus>,
    handle: Option<Handle>,
    dispatch: Option<Dispatch>,
}

impl ClientBuilder {
    /// Runtime that delivers replies and notifications; defaults to the current one
    pub fn handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Logging dispatch for the client's tasks; defaults to the current one
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Start server discovery and return the client
    ///
    /// # Errors
    /// Returns error if no runtime handle was given and none is current
    pub fn build(self) -> Result<DleynaClient, DleynaError> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| DleynaError::Runtime(e.to_string()))?,
        };
        let dispatch = self
            .dispatch
            .unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone));

        let dispatcher = CallDispatcher::new(handle, dispatch);
        let registry = Arc::new(ServerRegistry::new());
        let discovery = ServerDiscovery::new(Arc::clone(&self.bus), Arc::clone(&registry));

        let (scan_done, initial_scan) = RemoteCallFuture::pending();
        let discovery_handle = dispatcher.spawn(discovery.run(scan_done));

        tracing::dispatcher::with_default(dispatcher.dispatch(), || {
            info!("dLeyna client started");
        });

        Ok(DleynaClient {
            bus: self.bus,
            registry,
            dispatcher,
            initial_scan,
            discovery_handle,
            runtime: None,
        })
    }
}
