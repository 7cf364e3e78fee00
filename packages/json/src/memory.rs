//! The in-memory connector behind the `mem:` scheme.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use urlstore_core::{
    Connector, Error, Heap, ItemId, Result, SyncBrowse, SyncDump, SyncGet, SyncLoad, SyncPost,
    SyncPut, Url, ValueId, MEMORY_SCHEME,
};

/// Characters escaped when turning a stored path back into a URL.
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Stores one item per path.
///
/// Paths are normalized from the decoded URL path segments, so `mem:/a/b/`
/// and `mem:/a//b` address the same item. Every path also acts as a
/// directory for browse, load and dump: the entries under `mem:/users` are
/// the items whose path starts with `/users/`.
///
/// The connector owns what it stores. Replaced and removed roots are released
/// from the heap.
///
/// # Example
///
/// ```rust
/// use urlstore_core::{Heap, SyncGet, SyncPut, Url};
/// use urlstore_json::MemoryConnector;
///
/// let mut heap = Heap::new();
/// let mut mem = MemoryConnector::new();
/// let url = Url::parse("mem:/greeting").unwrap();
///
/// let hello = heap.string("hello");
/// mem.put(&mut heap, &url, hello).unwrap();
///
/// let root = mem.get(&mut heap, &url).unwrap().unwrap();
/// assert_eq!(heap.as_str(root), Some("hello"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryConnector {
    items: BTreeMap<String, ItemId>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stored paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    fn live_item(&self, heap: &Heap, path: &str) -> Option<ItemId> {
        self.items
            .get(path)
            .copied()
            .filter(|item| heap.item(*item).is_ok())
    }

    /// Entries strictly beneath `prefix`, with their relative paths.
    fn entries(&self, heap: &Heap, prefix: &str) -> Vec<(String, ItemId)> {
        let base = directory(prefix);
        self.items
            .range(base.clone()..)
            .take_while(|(path, _)| path.starts_with(&base))
            .filter(|(path, item)| path.len() > base.len() && heap.item(**item).is_ok())
            .map(|(path, item)| (path[base.len()..].to_string(), *item))
            .collect()
    }

    fn store(&mut self, heap: &mut Heap, path: String, value: ValueId) -> Result<ValueId> {
        if let Some(item) = self.live_item(heap, &path) {
            let old = heap.set_item_root(item, value)?;
            if old != value {
                heap.release(old)?;
            }
            return Ok(value);
        }
        let item = heap.create_item(value, source_url(&path)?, None)?;
        log::trace!("mem: created item at {}", path);
        self.items.insert(path, item);
        Ok(value)
    }

    fn string_array(heap: &mut Heap, strings: Vec<String>) -> Result<ValueId> {
        let array = heap.array();
        for s in strings {
            let id = heap.string(s);
            heap.push(array, id)?;
        }
        Ok(array)
    }
}

fn path_key(url: &Url) -> Result<String> {
    Ok(format!("/{}", url.path_segments()?.join("/")))
}

/// The prefix shared by every path beneath `path`.
fn directory(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

fn child_path(prefix: &str, relative: &str) -> String {
    let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
    format!("{}{}", directory(prefix), segments.join("/"))
}

fn source_url(path: &str) -> Result<Url> {
    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string())
        .collect();
    Url::parse(&format!("{}:{}", MEMORY_SCHEME, encoded.join("/")))
}

fn page<T>(entries: Vec<T>, start_row: usize, num_rows: Option<usize>) -> Vec<T> {
    entries
        .into_iter()
        .skip(start_row)
        .take(num_rows.unwrap_or(usize::MAX))
        .collect()
}

impl SyncGet for MemoryConnector {
    fn get(&mut self, heap: &mut Heap, url: &Url) -> Result<Option<ValueId>> {
        let path = path_key(url)?;
        Ok(self
            .live_item(heap, &path)
            .and_then(|item| heap.item(item).ok())
            .map(|item| item.root()))
    }
}

impl SyncPut for MemoryConnector {
    fn put(&mut self, heap: &mut Heap, url: &Url, value: ValueId) -> Result<ValueId> {
        let path = path_key(url)?;
        self.store(heap, path, value)
    }

    fn remove(&mut self, heap: &mut Heap, url: &Url) -> Result<()> {
        let path = path_key(url)?;
        if let Some(item) = self.items.remove(&path) {
            if let Ok(root) = heap.release_item(item) {
                heap.release(root)?;
            }
            log::debug!("mem: removed {}", path);
        }
        Ok(())
    }
}

impl SyncPost for MemoryConnector {
    fn post(&mut self, heap: &mut Heap, url: &Url, value: ValueId) -> Result<ValueId> {
        let prefix = path_key(url)?;
        let path = child_path(&prefix, &uuid::Uuid::new_v4().to_string());
        let created = source_url(&path)?;
        self.store(heap, path, value)?;
        log::debug!("mem: posted {}", created);
        Ok(heap.string(created.to_string()))
    }
}

impl SyncBrowse for MemoryConnector {
    fn count_items(&mut self, heap: &mut Heap, url: &Url) -> Result<ValueId> {
        let count = self.entries(heap, &path_key(url)?).len();
        Ok(heap.number(count))
    }

    fn keys(&mut self, heap: &mut Heap, url: &Url) -> Result<ValueId> {
        self.paged_keys(heap, url, 0, None)
    }

    fn paged_items(
        &mut self,
        heap: &mut Heap,
        url: &Url,
        start_row: usize,
        num_rows: Option<usize>,
    ) -> Result<ValueId> {
        let entries = page(self.entries(heap, &path_key(url)?), start_row, num_rows);
        let array = heap.array();
        for (_, item) in entries {
            let root = heap.item(item)?.root();
            let copy = heap.deep_copy(root)?;
            heap.push(array, copy)?;
        }
        Ok(array)
    }

    fn paged_keys(
        &mut self,
        heap: &mut Heap,
        url: &Url,
        start_row: usize,
        num_rows: Option<usize>,
    ) -> Result<ValueId> {
        let keys = page(self.entries(heap, &path_key(url)?), start_row, num_rows)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        Self::string_array(heap, keys)
    }
}

impl SyncLoad for MemoryConnector {
    fn load(&mut self, heap: &mut Heap, url: &Url, entries: ValueId) -> Result<()> {
        let prefix = path_key(url)?;
        // check every entry before storing any of them
        let mut batch = Vec::new();
        for entry in heap.require_array(entries)?.to_vec() {
            let key = match heap.get(entry, "key")? {
                Some(key) => heap.require_str(key)?.to_string(),
                None => {
                    return Err(Error::TypeMismatch {
                        expected: "string",
                        found: "null",
                    })
                }
            };
            let path = child_path(&prefix, &key);
            source_url(&path)?;
            batch.push((path, heap.get(entry, "value")?));
        }
        let count = batch.len();
        for (path, value) in batch {
            let value = match value {
                Some(value) => heap.deep_copy(value)?,
                None => heap.null(),
            };
            self.store(heap, path, value)?;
        }
        log::debug!("mem: loaded {} items under {}", count, prefix);
        Ok(())
    }
}

impl SyncDump for MemoryConnector {
    fn dump(&mut self, heap: &mut Heap, url: &Url) -> Result<ValueId> {
        let entries = self.entries(heap, &path_key(url)?);
        let array = heap.array();
        for (key, item) in entries {
            let root = heap.item(item)?.root();
            let value = heap.deep_copy(root)?;
            let key = heap.string(key);
            let entry = heap.object();
            heap.put(entry, "key", key)?;
            heap.put(entry, "value", value)?;
            heap.push(array, entry)?;
        }
        Ok(array)
    }
}

impl Connector for MemoryConnector {
    fn as_get(&mut self) -> Option<&mut dyn SyncGet> {
        Some(self)
    }

    fn as_put(&mut self) -> Option<&mut dyn SyncPut> {
        Some(self)
    }

    fn as_post(&mut self) -> Option<&mut dyn SyncPost> {
        Some(self)
    }

    fn as_browse(&mut self) -> Option<&mut dyn SyncBrowse> {
        Some(self)
    }

    fn as_load(&mut self) -> Option<&mut dyn SyncLoad> {
        Some(self)
    }

    fn as_dump(&mut self) -> Option<&mut dyn SyncDump> {
        Some(self)
    }
}
