//! The value arena.
//!
//! Every value with identity lives in a [`Heap`] and is addressed by a
//! [`ValueId`]. Parent links and keys are stored as plain indices, so a
//! container and its children never hold references to each other. Handles
//! are generational: once a slot is released, old handles to it fail with
//! [`Error::StaleValue`] instead of aliasing whatever reuses the slot.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Number;

use crate::error::{Error, Result};
use crate::item::{Event, EventKind, HandlerId, Item, ItemId};
use crate::value::{Native, Value, ValueKind};
use crate::{Fragment, Url};

/// Handle to a value inside a [`Heap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId {
    index: u32,
    generation: u32,
}

/// The position of a value inside its parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{}", index),
        }
    }
}

enum Data {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Array(Vec<ValueId>),
    Object(IndexMap<String, ValueId>),
    Native(Native),
}

impl Data {
    fn kind(&self) -> ValueKind {
        match self {
            Data::Null => ValueKind::Null,
            Data::Boolean(_) => ValueKind::Boolean,
            Data::Number(_) => ValueKind::Number,
            Data::String(_) => ValueKind::String,
            Data::Array(_) => ValueKind::Array,
            Data::Object(_) => ValueKind::Object,
            Data::Native(_) => ValueKind::Native,
        }
    }
}

struct Node {
    data: Data,
    key: Option<Key>,
    parent: Option<ValueId>,
    item: Option<ItemId>,
}

struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    fn insert(&mut self, entry: T) -> (u32, u32) {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return (index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        (index, 0)
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        Some(entry)
    }
}

/// Arena of values and items.
///
/// The heap is the factory for every value in a store. It is not internally
/// synchronized; callers serialize access through `&mut`.
pub struct Heap {
    nodes: Arena<Node>,
    items: Arena<Item>,
    next_handler: u64,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("values", &self.nodes.live)
            .field("items", &self.items.live)
            .finish()
    }
}

fn type_mismatch(expected: &'static str, found: ValueKind) -> Error {
    Error::TypeMismatch {
        expected,
        found: found.name(),
    }
}

fn parse_index(key: &str) -> Result<usize> {
    key.parse().map_err(|_| Error::TypeMismatch {
        expected: "array index",
        found: "key",
    })
}

impl Heap {
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            items: Arena::new(),
            next_handler: 0,
        }
    }

    /// Number of live values.
    pub fn value_count(&self) -> usize {
        self.nodes.live
    }

    /// Number of live items.
    pub fn item_count(&self) -> usize {
        self.items.live
    }

    // ------------------------------------------------------------------
    // Factory
    // ------------------------------------------------------------------

    fn alloc(&mut self, data: Data) -> ValueId {
        let (index, generation) = self.nodes.insert(Node {
            data,
            key: None,
            parent: None,
            item: None,
        });
        ValueId { index, generation }
    }

    pub fn null(&mut self) -> ValueId {
        self.alloc(Data::Null)
    }

    pub fn boolean(&mut self, value: bool) -> ValueId {
        self.alloc(Data::Boolean(value))
    }

    pub fn number(&mut self, value: impl Into<Number>) -> ValueId {
        self.alloc(Data::Number(value.into()))
    }

    pub fn string(&mut self, value: impl Into<String>) -> ValueId {
        self.alloc(Data::String(value.into()))
    }

    pub fn array(&mut self) -> ValueId {
        self.alloc(Data::Array(Vec::new()))
    }

    pub fn object(&mut self) -> ValueId {
        self.alloc(Data::Object(IndexMap::new()))
    }

    pub fn native(&mut self, value: Native) -> ValueId {
        self.alloc(Data::Native(value))
    }

    /// Copy an owned tree into the heap as a detached value.
    pub fn import(&mut self, value: &Value) -> ValueId {
        match value {
            Value::Null => self.null(),
            Value::Boolean(b) => self.boolean(*b),
            Value::Number(n) => self.number(n.clone()),
            Value::String(s) => self.string(s.clone()),
            Value::Native(n) => self.native(n.clone()),
            Value::Array(items) => {
                let id = self.array();
                for (index, item) in items.iter().enumerate() {
                    let child = self.import(item);
                    self.adopt(id, Key::Index(index), child);
                }
                id
            }
            Value::Object(map) => {
                let id = self.object();
                for (name, item) in map {
                    let child = self.import(item);
                    self.adopt(id, Key::Name(name.clone()), child);
                }
                id
            }
        }
    }

    /// Link a freshly created child without ownership checks or events.
    fn adopt(&mut self, container: ValueId, key: Key, child: ValueId) {
        if let Some(node) = self.nodes.get_mut(container.index, container.generation) {
            match (&mut node.data, &key) {
                (Data::Array(items), Key::Index(_)) => items.push(child),
                (Data::Object(map), Key::Name(name)) => {
                    map.insert(name.clone(), child);
                }
                _ => return,
            }
        }
        if let Some(node) = self.nodes.get_mut(child.index, child.generation) {
            node.parent = Some(container);
            node.key = Some(key);
        }
    }

    /// Copy a heap subtree out as an owned tree.
    pub fn export(&self, id: ValueId) -> Result<Value> {
        Ok(match &self.node(id)?.data {
            Data::Null => Value::Null,
            Data::Boolean(b) => Value::Boolean(*b),
            Data::Number(n) => Value::Number(n.clone()),
            Data::String(s) => Value::String(s.clone()),
            Data::Native(n) => Value::Native(n.clone()),
            Data::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|child| self.export(*child))
                    .collect::<Result<_>>()?,
            ),
            Data::Object(map) => Value::Object(
                map.iter()
                    .map(|(name, child)| Ok((name.clone(), self.export(*child)?)))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// Create a detached deep copy of a value.
    pub fn deep_copy(&mut self, id: ValueId) -> Result<ValueId> {
        let value = self.export(id)?;
        Ok(self.import(&value))
    }

    /// Free a detached value and everything beneath it.
    pub fn release(&mut self, id: ValueId) -> Result<()> {
        let node = self.node(id)?;
        if node.parent.is_some() || node.item.is_some() {
            return Err(Error::ValueAlreadyOwned);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(next.index, next.generation) {
                match node.data {
                    Data::Array(items) => stack.extend(items),
                    Data::Object(map) => stack.extend(map.into_values()),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    fn node(&self, id: ValueId) -> Result<&Node> {
        self.nodes
            .get(id.index, id.generation)
            .ok_or(Error::StaleValue)
    }

    fn node_mut(&mut self, id: ValueId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index, id.generation)
            .ok_or(Error::StaleValue)
    }

    /// Check whether a handle is still live.
    pub fn contains(&self, id: ValueId) -> bool {
        self.nodes.get(id.index, id.generation).is_some()
    }

    pub fn kind(&self, id: ValueId) -> Result<ValueKind> {
        Ok(self.node(id)?.data.kind())
    }

    pub fn is_container(&self, id: ValueId) -> bool {
        self.kind(id).is_ok_and(ValueKind::is_container)
    }

    pub fn is_null(&self, id: ValueId) -> bool {
        matches!(self.kind(id), Ok(ValueKind::Null))
    }

    pub fn as_str(&self, id: ValueId) -> Option<&str> {
        match &self.node(id).ok()?.data {
            Data::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self, id: ValueId) -> Option<bool> {
        match &self.node(id).ok()?.data {
            Data::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self, id: ValueId) -> Option<&Number> {
        match &self.node(id).ok()?.data {
            Data::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_native(&self, id: ValueId) -> Option<&Native> {
        match &self.node(id).ok()?.data {
            Data::Native(n) => Some(n),
            _ => None,
        }
    }

    pub fn require_str(&self, id: ValueId) -> Result<&str> {
        match &self.node(id)?.data {
            Data::String(s) => Ok(s),
            other => Err(type_mismatch("string", other.kind())),
        }
    }

    pub fn require_bool(&self, id: ValueId) -> Result<bool> {
        match &self.node(id)?.data {
            Data::Boolean(b) => Ok(*b),
            other => Err(type_mismatch("boolean", other.kind())),
        }
    }

    pub fn require_number(&self, id: ValueId) -> Result<&Number> {
        match &self.node(id)?.data {
            Data::Number(n) => Ok(n),
            other => Err(type_mismatch("number", other.kind())),
        }
    }

    pub fn require_array(&self, id: ValueId) -> Result<&[ValueId]> {
        match &self.node(id)?.data {
            Data::Array(items) => Ok(items),
            other => Err(type_mismatch("array", other.kind())),
        }
    }

    pub fn require_object(&self, id: ValueId) -> Result<&IndexMap<String, ValueId>> {
        match &self.node(id)?.data {
            Data::Object(map) => Ok(map),
            other => Err(type_mismatch("object", other.kind())),
        }
    }

    /// The key of a value inside its parent.
    pub fn key(&self, id: ValueId) -> Result<Option<&Key>> {
        Ok(self.node(id)?.key.as_ref())
    }

    pub fn parent(&self, id: ValueId) -> Result<Option<ValueId>> {
        Ok(self.node(id)?.parent)
    }

    /// Number of children of a container.
    pub fn size(&self, container: ValueId) -> Result<usize> {
        match &self.node(container)?.data {
            Data::Array(items) => Ok(items.len()),
            Data::Object(map) => Ok(map.len()),
            other => Err(type_mismatch("container", other.kind())),
        }
    }

    /// Keys of a container: member names in insertion order, or indices.
    pub fn keys(&self, container: ValueId) -> Result<Vec<String>> {
        match &self.node(container)?.data {
            Data::Array(items) => Ok((0..items.len()).map(|i| i.to_string()).collect()),
            Data::Object(map) => Ok(map.keys().cloned().collect()),
            other => Err(type_mismatch("container", other.kind())),
        }
    }

    /// Children of a container in key order.
    pub fn children(&self, container: ValueId) -> Result<Vec<ValueId>> {
        match &self.node(container)?.data {
            Data::Array(items) => Ok(items.clone()),
            Data::Object(map) => Ok(map.values().copied().collect()),
            other => Err(type_mismatch("container", other.kind())),
        }
    }

    /// Look up a child. Missing keys and non-numeric array keys yield `None`.
    pub fn get(&self, container: ValueId, key: &str) -> Result<Option<ValueId>> {
        match &self.node(container)?.data {
            Data::Object(map) => Ok(map.get(key).copied()),
            Data::Array(items) => Ok(key
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).copied())),
            other => Err(type_mismatch("container", other.kind())),
        }
    }

    /// Follow a fragment from `start`.
    ///
    /// Every step must pass through a container; a missing key yields
    /// `Ok(None)`. The empty fragment returns `start` itself.
    pub fn navigate(&self, start: ValueId, fragment: &Fragment) -> Result<Option<ValueId>> {
        let mut current = start;
        for key in fragment.iter() {
            if !self.kind(current)?.is_container() {
                return Err(Error::FragmentOnNonContainer {
                    fragment: fragment.to_string(),
                });
            }
            match self.get(current, key)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Follow a fragment from `start`, creating missing objects on the way.
    pub fn ensure_path(&mut self, start: ValueId, fragment: &Fragment) -> Result<ValueId> {
        let mut current = start;
        for key in fragment.iter() {
            if !self.kind(current)?.is_container() {
                return Err(Error::FragmentOnNonContainer {
                    fragment: fragment.to_string(),
                });
            }
            current = match self.get(current, key)? {
                Some(next) => next,
                None => {
                    let created = self.object();
                    self.put(current, key, created)?;
                    created
                }
            };
        }
        Ok(current)
    }

    /// Check that [`ensure_path`](Self::ensure_path) to the parent of
    /// `fragment` followed by a [`put`](Self::put) of `value` would succeed.
    ///
    /// Nothing is modified, so callers can reject a write before creating
    /// any intermediate containers.
    pub fn check_put_path(&self, start: ValueId, fragment: &Fragment, value: ValueId) -> Result<()> {
        let last = fragment.len().saturating_sub(1);
        let mut current = start;
        for (depth, key) in fragment.iter().enumerate() {
            let node = self.node(current)?;
            if !node.data.kind().is_container() {
                return Err(Error::FragmentOnNonContainer {
                    fragment: fragment.to_string(),
                });
            }
            let child = self.get(current, key)?;
            if let Data::Array(items) = &node.data {
                let index = parse_index(key)?;
                if child.is_none() && index > items.len() {
                    return Err(Error::IndexOutOfBounds {
                        index,
                        len: items.len(),
                    });
                }
            }
            if depth == last {
                return self.check_attachable(current, value);
            }
            match child {
                Some(next) => current = next,
                // the rest of the path is created as fresh objects
                None => break,
            }
        }
        self.check_detached(value)
    }

    /// Fails unless `id` is live, has no parent and roots no item.
    pub fn check_detached(&self, id: ValueId) -> Result<()> {
        let node = self.node(id)?;
        if node.parent.is_some() || node.item.is_some() {
            return Err(Error::ValueAlreadyOwned);
        }
        Ok(())
    }

    pub fn is_detached(&self, id: ValueId) -> bool {
        self.check_detached(id).is_ok()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    fn check_attachable(&self, container: ValueId, child: ValueId) -> Result<()> {
        let mut cursor = Some(container);
        while let Some(id) = cursor {
            if id == child {
                return Err(Error::CyclicContainerReference);
            }
            cursor = self.node(id)?.parent;
        }
        self.check_detached(child)
    }

    fn detach(&mut self, id: ValueId) -> Result<()> {
        let node = self.node_mut(id)?;
        node.parent = None;
        node.key = None;
        Ok(())
    }

    fn reindex(&mut self, array: ValueId, from: usize) -> Result<()> {
        let tail = self.require_array(array)?[from..].to_vec();
        for (offset, child) in tail.into_iter().enumerate() {
            self.node_mut(child)?.key = Some(Key::Index(from + offset));
        }
        Ok(())
    }

    /// Put `value` under `key`, returning the replaced value (now detached).
    ///
    /// On arrays the key is an index; an index equal to the length appends.
    pub fn put(&mut self, container: ValueId, key: &str, value: ValueId) -> Result<Option<ValueId>> {
        self.check_attachable(container, value)?;
        let (replaced, position) = match &mut self.node_mut(container)?.data {
            Data::Object(map) => (map.insert(key.to_string(), value), Key::Name(key.to_string())),
            Data::Array(items) => {
                let index = parse_index(key)?;
                let len = items.len();
                if index < len {
                    (Some(std::mem::replace(&mut items[index], value)), Key::Index(index))
                } else if index == len {
                    items.push(value);
                    (None, Key::Index(index))
                } else {
                    return Err(Error::IndexOutOfBounds { index, len });
                }
            }
            other => return Err(type_mismatch("container", other.kind())),
        };

        let node = self.node_mut(value)?;
        node.parent = Some(container);
        node.key = Some(position);
        if let Some(old) = replaced {
            self.detach(old)?;
        }
        self.notify(container, key, EventKind::Put, value);
        Ok(replaced)
    }

    /// Append to an array.
    pub fn push(&mut self, array: ValueId, value: ValueId) -> Result<()> {
        let len = self.require_array(array)?.len();
        self.put(array, &len.to_string(), value)?;
        Ok(())
    }

    /// Insert into an array, shifting later elements right.
    pub fn insert(&mut self, array: ValueId, index: usize, value: ValueId) -> Result<()> {
        self.check_attachable(array, value)?;
        match &mut self.node_mut(array)?.data {
            Data::Array(items) => {
                if index > items.len() {
                    return Err(Error::IndexOutOfBounds {
                        index,
                        len: items.len(),
                    });
                }
                items.insert(index, value);
            }
            other => return Err(type_mismatch("array", other.kind())),
        }
        self.node_mut(value)?.parent = Some(array);
        self.reindex(array, index)?;
        self.notify(array, &index.to_string(), EventKind::Put, value);
        Ok(())
    }

    /// Remove a child, returning it detached. Missing keys yield `None`.
    ///
    /// Removing from an array renumbers every later element.
    pub fn remove(&mut self, container: ValueId, key: &str) -> Result<Option<ValueId>> {
        let (removed, reindex_from) = match &mut self.node_mut(container)?.data {
            Data::Object(map) => (map.shift_remove(key), None),
            Data::Array(items) => match key.parse::<usize>().ok().filter(|i| *i < items.len()) {
                Some(index) => (Some(items.remove(index)), Some(index)),
                None => (None, None),
            },
            other => return Err(type_mismatch("container", other.kind())),
        };

        if let Some(from) = reindex_from {
            self.reindex(container, from)?;
        }
        let Some(removed) = removed else {
            return Ok(None);
        };
        self.detach(removed)?;
        self.notify(container, key, EventKind::Remove, removed);
        Ok(Some(removed))
    }

    // ------------------------------------------------------------------
    // Ancestry
    // ------------------------------------------------------------------

    /// The topmost ancestor of a value.
    pub fn root_of(&self, id: ValueId) -> Result<ValueId> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// The fragment leading from the topmost ancestor to `id`.
    pub fn fragment_of(&self, id: ValueId) -> Result<Fragment> {
        let mut keys = Vec::new();
        let mut current = self.node(id)?;
        while let (Some(parent), Some(key)) = (current.parent, current.key.as_ref()) {
            keys.push(key.to_string());
            current = self.node(parent)?;
        }
        keys.reverse();
        Ok(Fragment { keys })
    }

    /// The item whose root is an ancestor of (or is) `id`.
    pub fn item_of(&self, id: ValueId) -> Result<Option<ItemId>> {
        let root = self.root_of(id)?;
        Ok(self.node(root)?.item)
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    /// Bind a detached root value to a source URL.
    ///
    /// The fragment of `source` is dropped. Metadata, when given, must be an
    /// object.
    pub fn create_item(
        &mut self,
        root: ValueId,
        source: Url,
        metadata: Option<Value>,
    ) -> Result<ItemId> {
        let node = self.node(root)?;
        if node.parent.is_some() || node.item.is_some() {
            return Err(Error::ValueAlreadyOwned);
        }
        check_metadata(metadata.as_ref())?;

        let (index, generation) = self.items.insert(Item {
            root,
            source: source.without_fragment(),
            metadata,
            handlers: Vec::new(),
        });
        let id = ItemId { index, generation };
        self.node_mut(root)?.item = Some(id);
        log::trace!("created item for {}", self.item(id)?.source);
        Ok(id)
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.items
            .get(id.index, id.generation)
            .ok_or(Error::UnknownItem)
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut Item> {
        self.items
            .get_mut(id.index, id.generation)
            .ok_or(Error::UnknownItem)
    }

    /// Replace an item's root, returning the old root (detached).
    ///
    /// Handlers stay attached and see a `Put` with an empty fragment.
    pub fn set_item_root(&mut self, item: ItemId, root: ValueId) -> Result<ValueId> {
        let old = self.item(item)?.root;
        if old == root {
            return Ok(old);
        }
        let node = self.node(root)?;
        if node.parent.is_some() || node.item.is_some() {
            return Err(Error::ValueAlreadyOwned);
        }

        self.item_mut(item)?.root = root;
        self.node_mut(old)?.item = None;
        self.node_mut(root)?.item = Some(item);
        self.dispatch(
            item,
            Event {
                kind: EventKind::Put,
                item,
                fragment: Fragment::root(),
                value: root,
            },
        );
        Ok(old)
    }

    pub fn set_metadata(&mut self, item: ItemId, metadata: Option<Value>) -> Result<()> {
        check_metadata(metadata.as_ref())?;
        self.item_mut(item)?.metadata = metadata;
        Ok(())
    }

    /// Dissolve an item, returning its root as a detached value.
    pub fn release_item(&mut self, item: ItemId) -> Result<ValueId> {
        let removed = self
            .items
            .remove(item.index, item.generation)
            .ok_or(Error::UnknownItem)?;
        self.node_mut(removed.root)?.item = None;
        Ok(removed.root)
    }

    /// Register a change handler on an item.
    pub fn add_handler<F>(&mut self, item: ItemId, handler: F) -> Result<HandlerId>
    where
        F: FnMut(&Heap, &Event) + Send + 'static,
    {
        self.next_handler += 1;
        let id = HandlerId(self.next_handler);
        self.item_mut(item)?.handlers.push((id, Box::new(handler)));
        Ok(id)
    }

    /// Unregister a handler; returns whether it was registered.
    pub fn remove_handler(&mut self, item: ItemId, handler: HandlerId) -> Result<bool> {
        let handlers = &mut self.item_mut(item)?.handlers;
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != handler);
        Ok(handlers.len() != before)
    }

    fn notify(&mut self, container: ValueId, key: &str, kind: EventKind, value: ValueId) {
        let Ok(Some(item)) = self.item_of(container) else {
            return;
        };
        if self.item(item).map_or(true, |i| i.handlers.is_empty()) {
            return;
        }
        let mut fragment = self.fragment_of(container).unwrap_or_default();
        fragment.push(key);
        self.dispatch(
            item,
            Event {
                kind,
                item,
                fragment,
                value,
            },
        );
    }

    fn dispatch(&mut self, item: ItemId, event: Event) {
        let Ok(entry) = self.item_mut(item) else {
            return;
        };
        let mut handlers = std::mem::take(&mut entry.handlers);
        for (_, handler) in handlers.iter_mut() {
            handler(&*self, &event);
        }
        if let Ok(entry) = self.item_mut(item) {
            entry.handlers = handlers;
        }
    }
}

fn check_metadata(metadata: Option<&Value>) -> Result<()> {
    match metadata {
        None | Some(Value::Object(_)) => Ok(()),
        Some(other) => Err(type_mismatch("object", other.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment;
    use std::sync::{Arc, Mutex};

    fn object_with(heap: &mut Heap, pairs: &[(&str, &str)]) -> ValueId {
        let obj = heap.object();
        for (k, v) in pairs {
            let s = heap.string(*v);
            heap.put(obj, k, s).unwrap();
        }
        obj
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut heap = Heap::new();
        let obj = heap.object();
        let v = heap.string("hello");
        heap.put(obj, "greeting", v).unwrap();
        assert_eq!(heap.get(obj, "greeting").unwrap(), Some(v));
        assert_eq!(heap.parent(v).unwrap(), Some(obj));
        assert_eq!(heap.key(v).unwrap(), Some(&Key::Name("greeting".to_string())));
    }

    #[test]
    fn put_replaces_and_detaches_old() {
        let mut heap = Heap::new();
        let obj = object_with(&mut heap, &[("a", "1")]);
        let old = heap.get(obj, "a").unwrap().unwrap();
        let new = heap.string("2");
        assert_eq!(heap.put(obj, "a", new).unwrap(), Some(old));
        assert_eq!(heap.parent(old).unwrap(), None);
        assert_eq!(heap.key(old).unwrap(), None);
    }

    #[test]
    fn owned_value_cannot_be_reinserted() {
        let mut heap = Heap::new();
        let a = heap.object();
        let b = heap.object();
        let v = heap.string("x");
        heap.put(a, "v", v).unwrap();
        assert_eq!(heap.put(b, "v", v), Err(Error::ValueAlreadyOwned));
    }

    #[test]
    fn cycles_rejected() {
        let mut heap = Heap::new();
        let outer = heap.object();
        let inner = heap.object();
        heap.put(outer, "inner", inner).unwrap();
        assert_eq!(heap.put(outer, "self", outer), Err(Error::CyclicContainerReference));
        assert_eq!(heap.put(inner, "up", outer), Err(Error::CyclicContainerReference));
    }

    #[test]
    fn array_remove_renumbers() {
        let mut heap = Heap::new();
        let arr = heap.array();
        let ids: Vec<ValueId> = (0..4).map(|i| heap.number(i)).collect();
        for id in &ids {
            heap.push(arr, *id).unwrap();
        }
        heap.remove(arr, "1").unwrap();
        for (position, child) in heap.children(arr).unwrap().into_iter().enumerate() {
            assert_eq!(heap.key(child).unwrap(), Some(&Key::Index(position)));
            assert_eq!(heap.fragment_of(child).unwrap().to_string(), position.to_string());
        }
        assert_eq!(heap.size(arr).unwrap(), 3);
        assert_eq!(heap.get(arr, "1").unwrap(), Some(ids[2]));
    }

    #[test]
    fn array_insert_shifts() {
        let mut heap = Heap::new();
        let arr = heap.array();
        let a = heap.string("a");
        let c = heap.string("c");
        heap.push(arr, a).unwrap();
        heap.push(arr, c).unwrap();
        let b = heap.string("b");
        heap.insert(arr, 1, b).unwrap();
        assert_eq!(heap.key(c).unwrap(), Some(&Key::Index(2)));
        let out = heap.export(arr).unwrap();
        assert_eq!(out, Value::from(vec!["a", "b", "c"]));
        let d = heap.string("d");
        assert_eq!(
            heap.insert(arr, 9, d),
            Err(Error::IndexOutOfBounds { index: 9, len: 3 })
        );
    }

    #[test]
    fn array_put_past_end_fails() {
        let mut heap = Heap::new();
        let arr = heap.array();
        let v = heap.null();
        assert!(matches!(
            heap.put(arr, "2", v),
            Err(Error::IndexOutOfBounds { .. })
        ));
        assert!(matches!(heap.put(arr, "x", v), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn navigate_and_fragment_of() {
        let mut heap = Heap::new();
        let value: Value = [(
            "users",
            Value::from(vec![[("name", "Ann")].into_iter().collect::<Value>()]),
        )]
        .into_iter()
        .collect();
        let root = heap.import(&value);
        let name = heap.navigate(root, &fragment!("users.0.name")).unwrap().unwrap();
        assert_eq!(heap.as_str(name), Some("Ann"));
        assert_eq!(heap.fragment_of(name).unwrap(), fragment!("users.0.name"));
        assert_eq!(heap.navigate(root, &fragment!("users.5")).unwrap(), None);
        assert!(matches!(
            heap.navigate(root, &fragment!("users.0.name.x")),
            Err(Error::FragmentOnNonContainer { .. })
        ));
    }

    #[test]
    fn ensure_path_creates_objects() {
        let mut heap = Heap::new();
        let root = heap.object();
        let leaf = heap.ensure_path(root, &fragment!("a.b")).unwrap();
        assert_eq!(heap.kind(leaf).unwrap(), ValueKind::Object);
        assert_eq!(heap.fragment_of(leaf).unwrap(), fragment!("a.b"));
    }

    #[test]
    fn accessors_optional_and_required() {
        let mut heap = Heap::new();
        let n = heap.number(3);
        assert_eq!(heap.as_str(n), None);
        assert_eq!(
            heap.require_str(n),
            Err(Error::TypeMismatch {
                expected: "string",
                found: "number"
            })
        );
        assert_eq!(heap.require_number(n).unwrap().as_i64(), Some(3));
    }

    #[test]
    fn release_invalidates_handles() {
        let mut heap = Heap::new();
        let obj = object_with(&mut heap, &[("a", "1")]);
        let child = heap.get(obj, "a").unwrap().unwrap();
        assert_eq!(heap.release(child), Err(Error::ValueAlreadyOwned));
        heap.release(obj).unwrap();
        assert!(!heap.contains(obj));
        assert_eq!(heap.kind(child), Err(Error::StaleValue));
        assert_eq!(heap.value_count(), 0);

        // Reused slots do not revive old handles.
        let fresh = heap.null();
        assert!(heap.contains(fresh));
        assert!(!heap.contains(obj));
    }

    #[test]
    fn items_fire_events() {
        let mut heap = Heap::new();
        let root = heap.object();
        let item = heap
            .create_item(root, Url::parse("mem:/doc").unwrap(), None)
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        heap.add_handler(item, move |heap, event| {
            let value = heap.export(event.value).unwrap();
            sink.lock()
                .unwrap()
                .push((event.kind, event.fragment.to_string(), value));
        })
        .unwrap();

        let inner = heap.object();
        heap.put(root, "inner", inner).unwrap();
        let v = heap.string("x");
        heap.put(inner, "leaf", v).unwrap();
        heap.remove(inner, "leaf").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, EventKind::Put);
        assert_eq!(seen[0].1, "inner");
        assert_eq!(seen[1].1, "inner.leaf");
        assert_eq!(seen[2], (EventKind::Remove, "inner.leaf".to_string(), Value::from("x")));
    }

    #[test]
    fn item_root_replacement_keeps_handlers() {
        let mut heap = Heap::new();
        let first = heap.object();
        let item = heap
            .create_item(first, Url::parse("mem:/doc#ignored").unwrap(), None)
            .unwrap();
        assert_eq!(heap.item(item).unwrap().source().to_string(), "mem:/doc");

        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let handler = heap
            .add_handler(item, move |_, event| {
                assert!(event.fragment.is_empty());
                *c.lock().unwrap() += 1;
            })
            .unwrap();

        let second = heap.string("replacement");
        assert_eq!(heap.set_item_root(item, second).unwrap(), first);
        assert_eq!(heap.item_of(second).unwrap(), Some(item));
        assert_eq!(heap.item_of(first).unwrap(), None);
        assert_eq!(*count.lock().unwrap(), 1);

        assert!(heap.remove_handler(item, handler).unwrap());
        assert!(!heap.remove_handler(item, handler).unwrap());
    }

    #[test]
    fn item_roots_are_owned() {
        let mut heap = Heap::new();
        let root = heap.object();
        heap.create_item(root, Url::memory_root(), None).unwrap();
        let other = heap.object();
        assert_eq!(heap.put(other, "x", root), Err(Error::ValueAlreadyOwned));
        assert_eq!(
            heap.create_item(root, Url::memory_root(), None),
            Err(Error::ValueAlreadyOwned)
        );
    }

    #[test]
    fn metadata_must_be_object() {
        let mut heap = Heap::new();
        let root = heap.null();
        assert!(heap
            .create_item(root, Url::memory_root(), Some(Value::from(1)))
            .is_err());
        let item = heap
            .create_item(root, Url::memory_root(), Some(Value::object()))
            .unwrap();
        assert!(heap.item(item).unwrap().metadata().is_some());
        let released = heap.release_item(item).unwrap();
        assert_eq!(released, root);
        assert_eq!(heap.item(item).unwrap_err(), Error::UnknownItem);
    }

    #[test]
    fn import_export_preserves_structure() {
        let mut heap = Heap::new();
        let value: Value = [
            ("b", Value::from(1)),
            ("a", Value::from(vec![Value::Null, Value::from(true)])),
        ]
        .into_iter()
        .collect();
        let id = heap.import(&value);
        assert_eq!(heap.export(id).unwrap(), value);
        assert_eq!(heap.keys(id).unwrap(), vec!["b", "a"]);
        let copy = heap.deep_copy(id).unwrap();
        assert_ne!(copy, id);
        assert_eq!(heap.export(copy).unwrap(), value);
    }

    #[test]
    fn put_path_check_leaves_heap_untouched() {
        let mut heap = Heap::new();
        let root = heap.object();
        let list = heap.array();
        heap.put(root, "list", list).unwrap();
        let owned = heap.string("x");
        heap.put(root, "owned", owned).unwrap();
        let before = heap.value_count();

        assert_eq!(
            heap.check_put_path(root, &fragment!("a.b.c"), owned),
            Err(Error::ValueAlreadyOwned)
        );
        let fresh = heap.string("y");
        assert_eq!(heap.check_put_path(root, &fragment!("a.b.c"), fresh), Ok(()));
        assert_eq!(heap.check_put_path(root, &fragment!("list.0.x"), fresh), Ok(()));
        assert_eq!(
            heap.check_put_path(root, &fragment!("list.3.x"), fresh),
            Err(Error::IndexOutOfBounds { index: 3, len: 0 })
        );
        assert!(matches!(
            heap.check_put_path(root, &fragment!("owned.x"), fresh),
            Err(Error::FragmentOnNonContainer { .. })
        ));
        assert_eq!(
            heap.check_put_path(root, &fragment!("a"), root),
            Err(Error::CyclicContainerReference)
        );
        assert_eq!(heap.value_count(), before + 1);
        assert_eq!(heap.keys(root).unwrap(), vec!["list", "owned"]);
    }
}
