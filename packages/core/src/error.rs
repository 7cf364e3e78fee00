//! Error types for the core layer.

use crate::capability::Capabilities;

/// Errors raised by the value model, URL parsing and connector dispatch.
///
/// Every error is a fail-fast condition: nothing in this workspace retries.
/// Async operations resolve to the same variants the sync ones return.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No connector is registered for the URL's scheme.
    #[error("no connector registered for scheme '{scheme}'")]
    NoConnectorForScheme { scheme: String },

    /// The connector exists but lacks the capability the operation needs.
    #[error("connector for scheme '{scheme}' does not support {capability}")]
    ConnectorMissingCapability {
        scheme: String,
        capability: Capabilities,
    },

    /// The URL carries a query the connector can neither browse nor query.
    #[error("connector for scheme '{scheme}' cannot answer query '{query}'")]
    UnsupportedQuery { scheme: String, query: String },

    /// A fragment was applied to a value that is not an object or array.
    #[error("fragment '{fragment}' applied to a non-container value")]
    FragmentOnNonContainer { fragment: String },

    /// Fragment puts are only supported on the in-memory scheme.
    #[error("cannot put to a fragment on scheme '{scheme}'")]
    FragmentPutUnsupported { scheme: String },

    /// Fragment removes are only supported on the in-memory scheme.
    #[error("cannot remove a fragment on scheme '{scheme}'")]
    FragmentRemoveUnsupported { scheme: String },

    /// Removes never accept a query.
    #[error("cannot remove with a query: {url}")]
    QueryOnRemoveUnsupported { url: String },

    /// The scheme is reserved and cannot be re-registered or unregistered.
    #[error("scheme '{scheme}' is reserved")]
    ReservedScheme { scheme: String },

    /// A configuration value could not be understood.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The URL string could not be parsed.
    #[error("malformed url '{url}': {message}")]
    MalformedUrl { url: String, message: String },

    /// Inserting the value would make a container contain itself.
    #[error("inserting the value would create a container cycle")]
    CyclicContainerReference,

    /// The value already has a parent or is the root of an item.
    #[error("value is already owned by another container or item")]
    ValueAlreadyOwned,

    /// A required accessor found a value of a different type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An array index was past the end of the array.
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The value handle refers to a released slot.
    #[error("stale value handle")]
    StaleValue,

    /// The item handle refers to a released item.
    #[error("unknown item")]
    UnknownItem,

    /// A value could not be converted to or from a Rust type.
    #[error("serialization failed: {message}")]
    Serialization { message: String },

    /// A connector failed while serving a request.
    #[error("connector '{scheme}' failed: {message}")]
    Connector { scheme: String, message: String },
}

impl Error {
    /// Shorthand for a malformed URL.
    pub fn malformed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MalformedUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a connector failure.
    pub fn connector(scheme: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Connector {
            scheme: scheme.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
