//! Connector capability traits.
//!
//! A connector serves one URL scheme. It implements any subset of the
//! capability traits below and advertises them through the `as_*` accessors
//! on [`Connector`]. Dispatch never downcasts: it asks for a capability and
//! gets either a typed reference or `None`.

use crate::{Capabilities, Heap, Result, Url, ValueId};

#[cfg(feature = "async")]
use crate::{AsyncGet, AsyncPut};

/// Fetch the value at a URL.
pub trait SyncGet: Send + Sync {
    /// Fetch the value at `url` (fragment already stripped).
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Nothing is stored at the URL.
    /// * `Ok(Some(id))` - The value. It may be an item root or detached.
    fn get(&mut self, heap: &mut Heap, url: &Url) -> Result<Option<ValueId>>;
}

/// Store and remove values.
pub trait SyncPut: Send + Sync {
    /// Store `value` at `url`, returning the value as stored.
    fn put(&mut self, heap: &mut Heap, url: &Url, value: ValueId) -> Result<ValueId>;

    /// Remove whatever is stored at `url`. Removing nothing is not an error.
    fn remove(&mut self, heap: &mut Heap, url: &Url) -> Result<()>;
}

/// Create a new entry beneath a URL.
pub trait SyncPost: Send + Sync {
    /// Returns a value describing what was created, usually its URL.
    fn post(&mut self, heap: &mut Heap, url: &Url, value: ValueId) -> Result<ValueId>;
}

/// Directory-style listing.
pub trait SyncBrowse: Send + Sync {
    /// The number of entries under `url`, as a number value.
    fn count_items(&mut self, heap: &mut Heap, url: &Url) -> Result<ValueId>;

    /// All keys under `url`, as an array of strings.
    fn keys(&mut self, heap: &mut Heap, url: &Url) -> Result<ValueId>;

    /// A page of entries under `url`, as an array of values.
    fn paged_items(
        &mut self,
        heap: &mut Heap,
        url: &Url,
        start_row: usize,
        num_rows: Option<usize>,
    ) -> Result<ValueId>;

    /// A page of keys under `url`, as an array of strings.
    fn paged_keys(
        &mut self,
        heap: &mut Heap,
        url: &Url,
        start_row: usize,
        num_rows: Option<usize>,
    ) -> Result<ValueId>;
}

/// Connector-defined queries.
pub trait SyncQuery: Send + Sync {
    fn query(&mut self, heap: &mut Heap, url: &Url) -> Result<Option<ValueId>>;
}

/// Bulk import.
pub trait SyncLoad: Send + Sync {
    /// Load an array of `{"key", "value"}` entries beneath `url`.
    fn load(&mut self, heap: &mut Heap, url: &Url, entries: ValueId) -> Result<()>;
}

/// Bulk export, the inverse of [`SyncLoad`].
pub trait SyncDump: Send + Sync {
    fn dump(&mut self, heap: &mut Heap, url: &Url) -> Result<ValueId>;
}

/// A scheme handler.
///
/// Every accessor defaults to `None`; implementors override the ones they
/// support.
///
/// # Object Safety
///
/// This trait is object-safe: the registry stores `Box<dyn Connector>`.
pub trait Connector: Send + Sync {
    fn as_get(&mut self) -> Option<&mut dyn SyncGet> {
        None
    }

    fn as_put(&mut self) -> Option<&mut dyn SyncPut> {
        None
    }

    fn as_post(&mut self) -> Option<&mut dyn SyncPost> {
        None
    }

    fn as_browse(&mut self) -> Option<&mut dyn SyncBrowse> {
        None
    }

    fn as_query(&mut self) -> Option<&mut dyn SyncQuery> {
        None
    }

    fn as_load(&mut self) -> Option<&mut dyn SyncLoad> {
        None
    }

    fn as_dump(&mut self) -> Option<&mut dyn SyncDump> {
        None
    }

    #[cfg(feature = "async")]
    fn as_async_get(&self) -> Option<&dyn AsyncGet> {
        None
    }

    #[cfg(feature = "async")]
    fn as_async_put(&self) -> Option<&dyn AsyncPut> {
        None
    }

    /// The capability descriptor, derived from the accessors.
    fn capabilities(&mut self) -> Capabilities {
        let caps = Capabilities::NONE
            .with_if(Capabilities::GET, self.as_get().is_some())
            .with_if(Capabilities::PUT, self.as_put().is_some())
            .with_if(Capabilities::POST, self.as_post().is_some())
            .with_if(Capabilities::BROWSE, self.as_browse().is_some())
            .with_if(Capabilities::QUERY, self.as_query().is_some())
            .with_if(Capabilities::LOAD, self.as_load().is_some())
            .with_if(Capabilities::DUMP, self.as_dump().is_some());
        #[cfg(feature = "async")]
        let caps = caps
            .with_if(Capabilities::ASYNC_GET, self.as_async_get().is_some())
            .with_if(Capabilities::ASYNC_PUT, self.as_async_put().is_some());
        caps
    }
}

impl<T: Connector + ?Sized> Connector for Box<T> {
    fn as_get(&mut self) -> Option<&mut dyn SyncGet> {
        self.as_mut().as_get()
    }

    fn as_put(&mut self) -> Option<&mut dyn SyncPut> {
        self.as_mut().as_put()
    }

    fn as_post(&mut self) -> Option<&mut dyn SyncPost> {
        self.as_mut().as_post()
    }

    fn as_browse(&mut self) -> Option<&mut dyn SyncBrowse> {
        self.as_mut().as_browse()
    }

    fn as_query(&mut self) -> Option<&mut dyn SyncQuery> {
        self.as_mut().as_query()
    }

    fn as_load(&mut self) -> Option<&mut dyn SyncLoad> {
        self.as_mut().as_load()
    }

    fn as_dump(&mut self) -> Option<&mut dyn SyncDump> {
        self.as_mut().as_dump()
    }

    #[cfg(feature = "async")]
    fn as_async_get(&self) -> Option<&dyn AsyncGet> {
        self.as_ref().as_async_get()
    }

    #[cfg(feature = "async")]
    fn as_async_put(&self) -> Option<&dyn AsyncPut> {
        self.as_ref().as_async_put()
    }

    fn capabilities(&mut self) -> Capabilities {
        self.as_mut().capabilities()
    }
}
