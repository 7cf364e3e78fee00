#![cfg(feature = "async")]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use urlstore::{
    async_trait, AsyncGet, AsyncPut, Capabilities, Connector, Error, Result, SnapshotConnector,
    System, Url, Value, ValueId,
};

/// A connector that only speaks async, keyed by path.
#[derive(Default, Clone)]
struct RemoteConnector {
    documents: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl RemoteConnector {
    fn with(path: &str, value: Value) -> Self {
        let remote = Self::default();
        remote
            .documents
            .lock()
            .unwrap()
            .insert(path.to_string(), value);
        remote
    }
}

#[async_trait]
impl AsyncGet for RemoteConnector {
    async fn get_async(&self, url: &Url) -> Result<Option<Value>> {
        tokio::task::yield_now().await;
        Ok(self.documents.lock().unwrap().get(url.path()).cloned())
    }
}

#[async_trait]
impl AsyncPut for RemoteConnector {
    async fn put_async(&self, url: &Url, value: Value) -> Result<Value> {
        tokio::task::yield_now().await;
        if value.is_null() {
            return Err(Error::connector("remote", "refusing to store null"));
        }
        self.documents
            .lock()
            .unwrap()
            .insert(url.path().to_string(), value.clone());
        Ok(value)
    }

    async fn remove_async(&self, url: &Url) -> Result<()> {
        self.documents.lock().unwrap().remove(url.path());
        Ok(())
    }
}

impl Connector for RemoteConnector {
    fn as_async_get(&self) -> Option<&dyn AsyncGet> {
        Some(self)
    }

    fn as_async_put(&self) -> Option<&dyn AsyncPut> {
        Some(self)
    }
}

fn user() -> Value {
    urlstore::json_to_value(json!({"name": "Ann", "tags": ["a", "b"]}))
}

#[tokio::test]
async fn test_async_get_through_sync_connector_matches_sync() {
    let mut system = System::new();
    system
        .put_json("mem:/doc", json!({"a": {"b": [1, 2]}}))
        .unwrap();

    for url in ["mem:/doc", "mem:/doc#a.b.1", "mem:/doc#a.zzz", "mem:/doc?keys", "mem:/none"] {
        let sync = system.get(url).unwrap();
        let asynchronous = system.get_async(url).await.unwrap();
        let export = |system: &System, id: Option<ValueId>| {
            id.map(|id| urlstore::export_json(system.heap(), id).unwrap())
        };
        assert_eq!(export(&system, sync), export(&system, asynchronous), "{}", url);
    }

    // same errors too
    assert_eq!(
        system.get_async("mem:/doc#a.b.1.x").await.unwrap_err(),
        system.get("mem:/doc#a.b.1.x").unwrap_err()
    );
}

#[tokio::test]
async fn test_async_only_connector() {
    let mut system = System::new();
    let remote = RemoteConnector::with("/users/ann", user());
    system.register("remote", remote.clone()).unwrap();
    assert_eq!(
        system.registry().capabilities("remote"),
        Some(Capabilities::ASYNC_GET | Capabilities::ASYNC_PUT)
    );

    let id = system.get_async("remote:/users/ann").await.unwrap().unwrap();
    let item = system.heap().item_of(id).unwrap().unwrap();
    assert_eq!(
        system.heap().item(item).unwrap().source().to_string(),
        "remote:/users/ann"
    );

    let tag = system
        .get_async("remote:/users/ann#tags.1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(system.heap().as_str(tag), Some("b"));
    assert_eq!(system.get_async("remote:/users/bob").await.unwrap(), None);

    // the sync path has nothing to call
    assert_eq!(
        system.get("remote:/users/ann").unwrap_err(),
        Error::ConnectorMissingCapability {
            scheme: "remote".to_string(),
            capability: Capabilities::GET
        }
    );
}

#[tokio::test]
async fn test_async_put_and_remove() {
    let mut system = System::new();
    let remote = RemoteConnector::default();
    system.register("remote", remote.clone()).unwrap();

    let value = system.heap_mut().import(&user());
    let stored = system.put_async("remote:/users/ann", value).await.unwrap();
    assert_eq!(
        urlstore::export_json(system.heap(), stored).unwrap(),
        json!({"name": "Ann", "tags": ["a", "b"]})
    );
    assert!(remote.documents.lock().unwrap().contains_key("/users/ann"));

    system.remove_async("remote:/users/ann").await.unwrap();
    assert!(remote.documents.lock().unwrap().is_empty());

    let null = system.heap_mut().null();
    assert_eq!(
        system.put_async("remote:/x", null).await.unwrap_err(),
        Error::connector("remote", "refusing to store null")
    );
    assert_eq!(
        system.put_async("remote:/x#a", null).await.unwrap_err(),
        Error::FragmentPutUnsupported {
            scheme: "remote".to_string()
        }
    );
    assert!(matches!(
        system.remove_async("remote:/x?keys").await,
        Err(Error::QueryOnRemoveUnsupported { .. })
    ));
}

#[tokio::test]
async fn test_async_memory_fragments() {
    let mut system = System::new();
    let value = system.heap_mut().string("v");
    system.put_async("mem:/doc#a.b", value).await.unwrap();
    assert_eq!(system.get_json("mem:/doc").unwrap(), Some(json!({"a": {"b": "v"}})));
    system.remove_async("mem:/doc#a.b").await.unwrap();
    assert_eq!(system.get_json("mem:/doc").unwrap(), Some(json!({"a": {}})));
}

#[tokio::test]
async fn test_callbacks_receive_results_once() {
    let mut system = System::new();
    system
        .register("data", SnapshotConnector::from_json(json!({"x": 1})))
        .unwrap();

    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&outcomes);
    system
        .get_then("data:/x", move |result: Result<Option<ValueId>>| {
            sink.lock().unwrap().push(result.map(|id| id.is_some()));
        })
        .await;

    let sink = Arc::clone(&outcomes);
    system
        .get_then("nope:/x", move |result: Result<Option<ValueId>>| {
            sink.lock().unwrap().push(result.map(|id| id.is_some()));
        })
        .await;

    assert_eq!(
        *outcomes.lock().unwrap(),
        vec![
            Ok(true),
            Err(Error::NoConnectorForScheme {
                scheme: "nope".to_string()
            })
        ]
    );
}

struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl urlstore::Callback<ValueId> for Recorder {
    fn on_success(self, _value: ValueId) {
        self.log.lock().unwrap().push("success".to_string());
    }

    fn on_error(self, error: Error) {
        self.log.lock().unwrap().push(format!("error: {}", error));
    }
}

#[tokio::test]
async fn test_callback_objects() {
    let mut system = System::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let value = system.heap_mut().boolean(true);
    system
        .put_then("mem:/flag", value, Recorder { log: Arc::clone(&log) })
        .await;
    system
        .remove_then("mem:/flag?keys", |result: Result<()>| {
            assert!(result.is_err());
        })
        .await;

    let taken = system.heap_mut().boolean(false);
    system.put("mem:/other", taken).unwrap();
    system
        .put_then("mem:/again", taken, Recorder { log: Arc::clone(&log) })
        .await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "success".to_string(),
            format!("error: {}", Error::ValueAlreadyOwned)
        ]
    );
}
