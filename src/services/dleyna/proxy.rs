#![allow(missing_docs)]

use std::collections::HashMap;
use zbus::{
    Result, proxy,
    zvariant::{ObjectPath, OwnedObjectPath, OwnedValue},
};

/// Well-known bus name of the dLeyna server daemon
pub const SERVER_BUS_NAME: &str = "com.intel.dleyna-server";

/// Object path of the dLeyna server manager
pub const SERVER_ROOT_PATH: &str = "/com/intel/dLeynaServer";

/// Manager interface exposed at [`SERVER_ROOT_PATH`]
pub const SERVER_MANAGER_IFACE: &str = "com.intel.dLeynaServer.Manager";

/// Standard D-Bus properties interface
pub const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";

/// Container browsing interface
pub const MEDIA_CONTAINER_IFACE: &str = "org.gnome.UPnP.MediaContainer2";

/// Interface implemented by media server root objects
pub const MEDIA_DEVICE_IFACE: &str = "com.intel.dLeynaServer.MediaDevice";

/// Interface implemented by media items
pub const MEDIA_ITEM_IFACE: &str = "org.gnome.UPnP.MediaItem2";

/// dLeyna server manager proxy
///
/// Enumerates media servers and announces their arrival and departure
#[proxy(
    interface = "com.intel.dLeynaServer.Manager",
    default_service = "com.intel.dleyna-server",
    default_path = "/com/intel/dLeynaServer"
)]
pub trait Manager {
    /// Object paths of all currently known servers
    fn get_servers(&self) -> Result<Vec<OwnedObjectPath>>;

    /// Ask the daemon to search the network for servers again
    fn rescan(&self) -> Result<()>;

    /// Emitted when a server becomes available
    #[zbus(signal)]
    fn found_server(&self, path: ObjectPath<'_>) -> Result<()>;

    /// Emitted when a server goes away
    #[zbus(signal)]
    fn lost_server(&self, path: ObjectPath<'_>) -> Result<()>;
}

/// UPnP media container proxy
#[proxy(
    interface = "org.gnome.UPnP.MediaContainer2",
    default_service = "com.intel.dleyna-server"
)]
pub trait MediaContainer2 {
    /// Children of the container, `max` of zero meaning all of them
    fn list_children(
        &self,
        offset: u32,
        max: u32,
        filter: &[&str],
    ) -> Result<Vec<HashMap<String, OwnedValue>>>;

    /// Objects below the container matching a UPnP search query
    fn search_objects(
        &self,
        query: &str,
        offset: u32,
        max: u32,
        filter: &[&str],
    ) -> Result<Vec<HashMap<String, OwnedValue>>>;
}

/// Properties of any dLeyna object
///
/// An empty interface name returns the properties of every interface.
#[proxy(
    interface = "org.freedesktop.DBus.Properties",
    default_service = "com.intel.dleyna-server"
)]
pub trait MediaProperties {
    fn get_all(&self, interface_name: &str) -> Result<HashMap<String, OwnedValue>>;
}
