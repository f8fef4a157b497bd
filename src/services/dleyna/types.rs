use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::Serialize;
use zbus::zvariant::{OwnedValue, Value};

use super::CallError;

/// Property map of a media object, server or item, keyed by property name
pub type MediaObject = BTreeMap<String, Variant>;

/// Unique Device Name of a media server
///
/// Stable across re-announcements, unlike the object path a server is exposed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Udn(String);

impl Udn {
    /// Create a UDN from its string form
    pub fn new(udn: impl Into<String>) -> Self {
        Self(udn.into())
    }

    /// The UDN string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Udn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Udn {
    fn from(udn: &str) -> Self {
        Self::new(udn)
    }
}

/// Owned, cloneable copy of a D-Bus value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Variant {
    /// Boolean
    Bool(bool),
    /// Single byte
    Byte(u8),
    /// Any signed integer type
    Int(i64),
    /// Any unsigned integer type wider than a byte
    UInt(u64),
    /// Double precision float
    Double(f64),
    /// String or signature
    Str(String),
    /// Object path
    ObjectPath(String),
    /// Array of values
    Array(Vec<Variant>),
    /// Dictionary; keys are rendered as strings
    Dict(BTreeMap<String, Variant>),
    /// Structure fields in order
    Struct(Vec<Variant>),
    /// Value kinds that have no useful owned form, such as file descriptors
    Unsupported,
}

impl Variant {
    /// String content of `Str` and `ObjectPath` values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::ObjectPath(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content of integer values
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Byte(v) => Some(u64::from(*v)),
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl From<&Value<'_>> for Variant {
    fn from(value: &Value<'_>) -> Self {
        match value {
            Value::U8(v) => Self::Byte(*v),
            Value::Bool(v) => Self::Bool(*v),
            Value::I16(v) => Self::Int(i64::from(*v)),
            Value::U16(v) => Self::UInt(u64::from(*v)),
            Value::I32(v) => Self::Int(i64::from(*v)),
            Value::U32(v) => Self::UInt(u64::from(*v)),
            Value::I64(v) => Self::Int(*v),
            Value::U64(v) => Self::UInt(*v),
            Value::F64(v) => Self::Double(*v),
            Value::Str(s) => Self::Str(s.to_string()),
            Value::Signature(s) => Self::Str(s.to_string()),
            Value::ObjectPath(p) => Self::ObjectPath(p.to_string()),
            Value::Value(inner) => Self::from(&**inner),
            Value::Array(array) => Self::Array(array.iter().map(Self::from).collect()),
            Value::Dict(dict) => Self::Dict(
                dict.iter()
                    .map(|(key, value)| (dict_key(key), Self::from(value)))
                    .collect(),
            ),
            Value::Structure(structure) => {
                Self::Struct(structure.fields().iter().map(Self::from).collect())
            }
            #[allow(unreachable_patterns)]
            _ => Self::Unsupported,
        }
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

fn dict_key(key: &Value<'_>) -> String {
    match Variant::from(key) {
        Variant::Str(s) | Variant::ObjectPath(s) => s,
        Variant::Int(v) => v.to_string(),
        Variant::UInt(v) => v.to_string(),
        Variant::Byte(v) => v.to_string(),
        Variant::Bool(v) => v.to_string(),
        other => format!("{other:?}"),
    }
}

/// Convert a property map as returned by zbus proxies
pub fn media_object(properties: &HashMap<String, OwnedValue>) -> MediaObject {
    properties
        .iter()
        .map(|(name, value)| (name.clone(), Variant::from(&**value)))
        .collect()
}

/// A media server known to the registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Server {
    /// Unique Device Name, the registry key
    pub udn: Udn,

    /// Object path the server is currently exposed at
    pub path: String,

    /// Human-readable server name
    pub friendly_name: String,

    /// Every property the server reported when it was discovered
    pub properties: MediaObject,
}

impl Server {
    /// Build a server record from its `GetAll` reply
    ///
    /// `UDN` is required. `Path` falls back to the path the server was announced at.
    ///
    /// # Errors
    /// Returns [`CallError::Decode`] when the reply carries no `UDN`.
    pub fn from_properties(announced_path: &str, properties: MediaObject) -> Result<Self, CallError> {
        let udn = properties
            .get("UDN")
            .and_then(Variant::as_str)
            .map(Udn::new)
            .ok_or_else(|| CallError::decode("GetAll", format!("{announced_path} has no UDN")))?;

        let path = properties
            .get("Path")
            .and_then(Variant::as_str)
            .unwrap_or(announced_path)
            .to_string();

        let friendly_name = properties
            .get("FriendlyName")
            .and_then(Variant::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            udn,
            path,
            friendly_name,
            properties,
        })
    }
}

/// Server presence notification delivered by the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A server appeared at the given object path
    Found(String),
    /// The server at the given object path went away
    Lost(String),
}

/// Argument of a remote method call, recorded for tracing
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Unsigned 32-bit integer
    U32(u32),
    /// String
    Str(String),
    /// Array of strings
    StrList(Vec<String>),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U32(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::StrList(list) => write!(f, "{list:?}"),
        }
    }
}

/// Description of a single remote method call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    /// Object path the call targets
    pub path: String,
    /// Interface the method belongs to
    pub interface: &'static str,
    /// Method name
    pub method: &'static str,
    /// Positional arguments
    pub args: Vec<Arg>,
}

impl RemoteCall {
    /// Describe a call with no arguments
    pub fn new(path: impl Into<String>, interface: &'static str, method: &'static str) -> Self {
        Self {
            path: path.into(),
            interface,
            method,
            args: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }
}

impl fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.interface, self.method)?;
        for (index, arg) in self.args.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}
