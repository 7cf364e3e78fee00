//! A read-only connector over a fixed JSON document.

use urlstore_core::{Connector, Error, Heap, Result, SyncBrowse, SyncGet, Url, Value, ValueId};

use crate::convert::json_to_value;

/// Serves a JSON document by URL path.
///
/// `snap:/users/0/name` navigates the document key by key: objects by
/// member name, arrays by index. Every get returns a fresh detached copy.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use urlstore_core::{Heap, SyncGet, Url};
/// use urlstore_json::SnapshotConnector;
///
/// let mut snap = SnapshotConnector::from_json(json!({"users": [{"name": "Ann"}]}));
/// let mut heap = Heap::new();
/// let url = Url::parse("snap:/users/0/name").unwrap();
/// let id = snap.get(&mut heap, &url).unwrap().unwrap();
/// assert_eq!(heap.as_str(id), Some("Ann"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct SnapshotConnector {
    document: Value,
}

impl SnapshotConnector {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        Self::new(json_to_value(json))
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    fn lookup(&self, url: &Url) -> Result<Option<&Value>> {
        let mut cursor = &self.document;
        for segment in url.path_segments()? {
            match cursor.get(&segment) {
                Some(next) => cursor = next,
                None => return Ok(None),
            }
        }
        Ok(Some(cursor))
    }

    /// Keys of the container at `url`; nothing there means no keys.
    fn keys_at(&self, url: &Url) -> Result<Vec<String>> {
        match self.lookup(url)? {
            None => Ok(Vec::new()),
            Some(Value::Object(map)) => Ok(map.keys().cloned().collect()),
            Some(Value::Array(items)) => Ok((0..items.len()).map(|i| i.to_string()).collect()),
            Some(other) => Err(Error::TypeMismatch {
                expected: "container",
                found: other.kind().name(),
            }),
        }
    }

    fn children_at(&self, url: &Url) -> Result<Vec<&Value>> {
        match self.lookup(url)? {
            None => Ok(Vec::new()),
            Some(Value::Object(map)) => Ok(map.values().collect()),
            Some(Value::Array(items)) => Ok(items.iter().collect()),
            Some(other) => Err(Error::TypeMismatch {
                expected: "container",
                found: other.kind().name(),
            }),
        }
    }
}

impl SyncGet for SnapshotConnector {
    fn get(&mut self, heap: &mut Heap, url: &Url) -> Result<Option<ValueId>> {
        Ok(self.lookup(url)?.map(|value| heap.import(value)))
    }
}

impl SyncBrowse for SnapshotConnector {
    fn count_items(&mut self, heap: &mut Heap, url: &Url) -> Result<ValueId> {
        let count = self.keys_at(url)?.len();
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
        let page: Vec<Value> = self
            .children_at(url)?
            .into_iter()
            .skip(start_row)
            .take(num_rows.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(heap.import(&Value::Array(page)))
    }

    fn paged_keys(
        &mut self,
        heap: &mut Heap,
        url: &Url,
        start_row: usize,
        num_rows: Option<usize>,
    ) -> Result<ValueId> {
        let page: Vec<String> = self
            .keys_at(url)?
            .into_iter()
            .skip(start_row)
            .take(num_rows.unwrap_or(usize::MAX))
            .collect();
        Ok(heap.import(&Value::from(page)))
    }
}

impl Connector for SnapshotConnector {
    fn as_get(&mut self) -> Option<&mut dyn SyncGet> {
        Some(self)
    }

    fn as_browse(&mut self) -> Option<&mut dyn SyncBrowse> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export_json;
    use serde_json::json;
    use urlstore_core::Capabilities;

    fn snapshot() -> SnapshotConnector {
        SnapshotConnector::from_json(json!({
            "users": [{"name": "Ann"}, {"name": "Bob"}],
            "title": "Team",
        }))
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn read_only_capabilities() {
        assert_eq!(
            snapshot().capabilities(),
            Capabilities::GET | Capabilities::BROWSE
        );
    }

    #[test]
    fn get_navigates_path() {
        let mut snap = snapshot();
        let mut heap = Heap::new();
        let id = snap.get(&mut heap, &url("snap:/users/1")).unwrap().unwrap();
        assert_eq!(export_json(&heap, id).unwrap(), json!({"name": "Bob"}));
        assert!(snap.get(&mut heap, &url("snap:/users/9")).unwrap().is_none());
        assert!(snap.get(&mut heap, &url("snap:/title/x")).unwrap().is_none());
        let whole = snap.get(&mut heap, &url("snap:/")).unwrap().unwrap();
        assert_eq!(heap.keys(whole).unwrap(), vec!["users", "title"]);
    }

    #[test]
    fn browse_containers() {
        let mut snap = snapshot();
        let mut heap = Heap::new();
        let count = snap.count_items(&mut heap, &url("snap:/users")).unwrap();
        assert_eq!(export_json(&heap, count).unwrap(), json!(2));
        let keys = snap.keys(&mut heap, &url("snap:/")).unwrap();
        assert_eq!(export_json(&heap, keys).unwrap(), json!(["users", "title"]));
        let items = snap
            .paged_items(&mut heap, &url("snap:/users"), 1, Some(5))
            .unwrap();
        assert_eq!(export_json(&heap, items).unwrap(), json!([{"name": "Bob"}]));
        assert!(matches!(
            snap.keys(&mut heap, &url("snap:/title")),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
