/// dLeyna media server client
pub mod dleyna;

pub use dleyna::{
    CallError, DleynaClient, DleynaError, MediaBus, MediaObject, Page, RemoteCallFuture, Server,
    ServerEvent, ServerRegistry, Udn, Variant,
};
