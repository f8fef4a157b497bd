use async_trait::async_trait;
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use tracing::instrument;
use zbus::{Connection, proxy::CacheProperties};

use super::{
    CallError, DleynaError, ManagerProxy, MediaContainer2Proxy, MediaObject, MediaPropertiesProxy,
    ServerEvent, types::media_object,
};

/// Transport to the dLeyna server daemon
///
/// Each method performs one remote call. Implementations must not retry.
#[async_trait]
pub trait MediaBus: Send + Sync + 'static {
    /// Object paths of every server the daemon currently knows
    async fn get_servers(&self) -> Result<Vec<String>, CallError>;

    /// Properties of the object at `path`, limited to `interface` unless it is empty
    async fn get_all(&self, path: &str, interface: &str) -> Result<MediaObject, CallError>;

    /// Children of the container at `path`
    async fn list_children(
        &self,
        path: &str,
        offset: u32,
        limit: u32,
        filter: &[String],
    ) -> Result<Vec<MediaObject>, CallError>;

    /// Objects below the container at `path` matching `query`
    async fn search_objects(
        &self,
        path: &str,
        query: &str,
        offset: u32,
        limit: u32,
        filter: &[String],
    ) -> Result<Vec<MediaObject>, CallError>;

    /// Ask the daemon to look for servers again
    async fn rescan(&self) -> Result<(), CallError>;

    /// Subscribe to server appearance and disappearance notifications
    async fn server_events(&self) -> Result<BoxStream<'static, ServerEvent>, CallError>;
}

/// [`MediaBus`] backed by a zbus connection
#[derive(Clone, Debug)]
pub struct ZbusMediaBus {
    connection: Connection,
}

impl ZbusMediaBus {
    /// Use an existing connection
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Connect to the session bus
    ///
    /// # Errors
    /// Returns error if the session bus cannot be reached
    pub async fn session() -> Result<Self, DleynaError> {
        let connection = Connection::session().await?;
        Ok(Self::new(connection))
    }

    /// Connect to the bus at `address`
    ///
    /// # Errors
    /// Returns error if the address is malformed or the bus cannot be reached
    pub async fn with_address(address: &str) -> Result<Self, DleynaError> {
        let connection = zbus::connection::Builder::address(address)?
            .build()
            .await?;
        Ok(Self::new(connection))
    }

    /// Underlying connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    async fn manager(&self, method: &str) -> Result<ManagerProxy<'static>, CallError> {
        ManagerProxy::new(&self.connection)
            .await
            .map_err(|e| CallError::transport(method, e))
    }

    async fn container(
        &self,
        path: &str,
        method: &str,
    ) -> Result<MediaContainer2Proxy<'static>, CallError> {
        MediaContainer2Proxy::builder(&self.connection)
            .path(path.to_string())
            .map_err(|e| CallError::transport(method, e))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(|e| CallError::transport(method, e))
    }
}

fn filter_refs(filter: &[String]) -> Vec<&str> {
    filter.iter().map(String::as_str).collect()
}

#[async_trait]
impl MediaBus for ZbusMediaBus {
    #[instrument(skip(self))]
    async fn get_servers(&self) -> Result<Vec<String>, CallError> {
        let paths = self
            .manager("GetServers")
            .await?
            .get_servers()
            .await
            .map_err(|e| CallError::transport("GetServers", e))?;

        Ok(paths.iter().map(|path| path.as_str().to_string()).collect())
    }

    #[instrument(skip(self))]
    async fn get_all(&self, path: &str, interface: &str) -> Result<MediaObject, CallError> {
        let proxy = MediaPropertiesProxy::builder(&self.connection)
            .path(path.to_string())
            .map_err(|e| CallError::transport("GetAll", e))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(|e| CallError::transport("GetAll", e))?;

        let properties = proxy
            .get_all(interface)
            .await
            .map_err(|e| CallError::transport("GetAll", e))?;

        Ok(media_object(&properties))
    }

    #[instrument(skip(self))]
    async fn list_children(
        &self,
        path: &str,
        offset: u32,
        limit: u32,
        filter: &[String],
    ) -> Result<Vec<MediaObject>, CallError> {
        let children = self
            .container(path, "ListChildren")
            .await?
            .list_children(offset, limit, &filter_refs(filter))
            .await
            .map_err(|e| CallError::transport("ListChildren", e))?;

        Ok(children.iter().map(media_object).collect())
    }

    #[instrument(skip(self))]
    async fn search_objects(
        &self,
        path: &str,
        query: &str,
        offset: u32,
        limit: u32,
        filter: &[String],
    ) -> Result<Vec<MediaObject>, CallError> {
        let objects = self
            .container(path, "SearchObjects")
            .await?
            .search_objects(query, offset, limit, &filter_refs(filter))
            .await
            .map_err(|e| CallError::transport("SearchObjects", e))?;

        Ok(objects.iter().map(media_object).collect())
    }

    #[instrument(skip(self))]
    async fn rescan(&self) -> Result<(), CallError> {
        self.manager("Rescan")
            .await?
            .rescan()
            .await
            .map_err(|e| CallError::transport("Rescan", e))
    }

    async fn server_events(&self) -> Result<BoxStream<'static, ServerEvent>, CallError> {
        let manager = self.manager("AddMatch").await?;

        let found = manager
            .receive_found_server()
            .await
            .map_err(|e| CallError::transport("AddMatch", e))?
            .filter_map(|signal| async move {
                let args = signal.args().ok()?;
                Some(ServerEvent::Found(args.path().to_string()))
            });

        let lost = manager
            .receive_lost_server()
            .await
            .map_err(|e| CallError::transport("AddMatch", e))?
            .filter_map(|signal| async move {
                let args = signal.args().ok()?;
                Some(ServerEvent::Lost(args.path().to_string()))
            });

        Ok(stream::select(found, lost).boxed())
    }
}
