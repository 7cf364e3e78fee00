//! urlstore: a JSON value store addressed by URLs.
//!
//! A [`System`] owns the value heap and dispatches `get`, `put` and `remove`
//! to connectors registered by URL scheme. Fragments (`#a.b.0`) navigate
//! inside fetched values. Templates render text or values from whatever the
//! store can reach.
//!
//! - `mem:` is always present and backed by a [`MemoryConnector`]
//! - `mem:/system/connectors` lists, mounts and unmounts connectors
//! - Queries (`?keys`, `?countItems`, `?pagedItems`, `?load`, `?dump`, ...)
//!   select connector capabilities
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use urlstore::System;
//!
//! let mut system = System::new();
//! system.put_json("mem:/people/ann", json!({"name": "Ann", "langs": ["rust", "c"]})).unwrap();
//! system.put_json("mem:/people/bob", json!({"name": "Bob", "langs": []})).unwrap();
//!
//! assert_eq!(system.get_json("mem:/people?keys").unwrap(), Some(json!(["ann", "bob"])));
//!
//! let text = system
//!     .render_url("{:name}: {.foreach :langs}{:.}{.join}, {.end}", "mem:/people/ann")
//!     .unwrap();
//! assert_eq!(text, "Ann: rust, c");
//! ```

mod config;
mod registry;
mod system;

pub use config::SystemConfig;
pub use registry::{
    ConnectorConfig, ConnectorFactory, DefaultConnectorFactory, Registry, REGISTRY_SEGMENTS,
};
pub use system::System;

// Re-export the layers for convenience
pub use urlstore_core::{
    BrowseKind, Capabilities, Connector, Error, Event, EventKind, Fragment, Heap, ItemId, Key,
    Native, Query, Result, SyncBrowse, SyncDump, SyncGet, SyncLoad, SyncPost, SyncPut, SyncQuery,
    Url, Value, ValueId, ValueKind, MEMORY_SCHEME,
};
pub use urlstore_json::{
    export_json, from_value, import_json, json_to_value, to_value, value_to_json,
    MemoryConnector, SnapshotConnector,
};
pub use urlstore_template::{
    Datum, Environment, Function, Functions, Template, TemplateCache, TemplateError,
};

// Async support
#[cfg(feature = "async")]
pub use system::Callback;

#[cfg(feature = "async")]
pub use urlstore_core::{async_trait, AsyncGet, AsyncPut};
