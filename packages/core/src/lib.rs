//! Core urlstore types.
//!
//! This layer holds everything the rest of the workspace agrees on:
//! - `Url`, `Query`, `Fragment`: addressing
//! - `Value`: owned, detached trees of JSON-like data
//! - `Heap`: the arena where values with identity live, addressed by `ValueId`
//! - `Item`: a root value bound to its source URL, with change handlers
//! - `Connector` and the capability traits it exposes
//!
//! # Example
//!
//! ```rust
//! use urlstore_core::{fragment, Heap, Value};
//!
//! let mut heap = Heap::new();
//! let doc: Value = [("user", [("name", "Ann")].into_iter().collect::<Value>())]
//!     .into_iter()
//!     .collect();
//! let root = heap.import(&doc);
//! let name = heap.navigate(root, &fragment!("user.name")).unwrap().unwrap();
//! assert_eq!(heap.as_str(name), Some("Ann"));
//! ```

mod capability;
mod connector;
mod error;
mod fragment;
mod heap;
mod item;
mod url;
mod value;

pub use capability::Capabilities;
pub use connector::{
    Connector, SyncBrowse, SyncDump, SyncGet, SyncLoad, SyncPost, SyncPut, SyncQuery,
};
pub use error::{Error, Result};
pub use fragment::{decode_component, Fragment};
pub use heap::{Heap, Key, ValueId};
pub use item::{Event, EventKind, Handler, HandlerId, Item, ItemId};
pub use url::{BrowseKind, Query, Url, MEMORY_SCHEME};
pub use value::{Native, Value, ValueKind};

// Async support
#[cfg(feature = "async")]
mod async_connector;

#[cfg(feature = "async")]
pub use async_connector::{AsyncGet, AsyncPut};

#[cfg(feature = "async")]
pub use async_trait::async_trait;
