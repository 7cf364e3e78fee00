//! Items and change notification.
//!
//! An item binds a root value to the URL it was loaded from. Handlers
//! registered on an item see every put and remove performed beneath its
//! root.

use std::fmt;

use crate::{Fragment, Heap, Url, Value, ValueId};

/// Handle to an item inside a [`Heap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Handle returned by [`Heap::add_handler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) u64);

/// What happened beneath an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Put,
    Remove,
}

/// A change notification.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub item: ItemId,
    /// Path of the changed key relative to the item root; empty when the
    /// whole root was replaced.
    pub fragment: Fragment,
    /// The new value for puts, the detached old value for removes.
    pub value: ValueId,
}

/// A change handler. Handlers observe the heap but cannot mutate it.
pub type Handler = Box<dyn FnMut(&Heap, &Event) + Send>;

/// A root value with its source URL, metadata and handlers.
pub struct Item {
    pub(crate) root: ValueId,
    pub(crate) source: Url,
    pub(crate) metadata: Option<Value>,
    pub(crate) handlers: Vec<(HandlerId, Handler)>,
}

impl Item {
    pub fn root(&self) -> ValueId {
        self.root
    }

    /// The URL the root was loaded from, without fragment.
    pub fn source(&self) -> &Url {
        &self.source
    }

    /// Optional metadata object.
    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("root", &self.root)
            .field("source", &self.source.to_string())
            .field("metadata", &self.metadata)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
