//! The addressable store root.

use std::sync::Arc;

use urlstore_core::{
    BrowseKind, Capabilities, Connector, Error, Heap, ItemId, Result, Url, Value, ValueId,
};
use urlstore_json::{export_json, import_json};
use urlstore_template::{
    Datum, Environment, Function, Functions, Interpreter, Result as TemplateResult, TemplateCache,
};

use crate::config::SystemConfig;
use crate::registry::{config_from_value, Registry, RegistryPath};

/// Value factory, connector dispatcher and template renderer.
///
/// Every operation takes `&mut self`; a `System` is driven by one caller at
/// a time and may move between threads.
///
/// ```rust
/// use serde_json::json;
/// use urlstore::System;
///
/// let mut system = System::new();
/// system.put_json("mem:/a", json!({"b": {"c": "v"}})).unwrap();
/// assert_eq!(system.get_json("mem:/a#b.c").unwrap(), Some(json!("v")));
/// assert_eq!(system.get_json("a#b").unwrap(), Some(json!({"c": "v"})));
/// ```
pub struct System {
    heap: Heap,
    registry: Registry,
    functions: Arc<Functions>,
    templates: TemplateCache,
    root: Url,
    base: Option<Url>,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("root", &self.root.to_string())
            .field("base", &self.base.as_ref().map(Url::to_string))
            .field("registry", &self.registry)
            .field("values", &self.heap.value_count())
            .field("items", &self.heap.item_count())
            .finish()
    }
}

fn scheme_of(url: &Url) -> Result<&str> {
    url.scheme()
        .ok_or_else(|| Error::malformed(url.to_string(), "url has no scheme"))
}

fn missing(scheme: &str, capability: Capabilities) -> Error {
    log::debug!("connector '{}' lacks {}", scheme, capability);
    Error::ConnectorMissingCapability {
        scheme: scheme.to_string(),
        capability,
    }
}

impl System {
    /// A system rooted at `mem:/` with the built-in functions.
    pub fn new() -> Self {
        Self {
            heap: Heap::new(),
            registry: Registry::new(),
            functions: Arc::new(Functions::with_builtins()),
            templates: TemplateCache::default(),
            root: Url::memory_root(),
            base: None,
        }
    }

    pub fn with_config(config: SystemConfig) -> Result<Self> {
        Self::with_registry(config, Registry::new())
    }

    /// Apply `config` on top of an existing registry. Configured connectors
    /// are mounted through the registry's factory.
    pub fn with_registry(config: SystemConfig, mut registry: Registry) -> Result<Self> {
        for (scheme, connector) in &config.connectors {
            registry.mount(scheme, connector.clone())?;
        }
        let system = Self {
            heap: Heap::new(),
            registry,
            functions: Arc::new(Functions::with_builtins()),
            templates: TemplateCache::new(config.template_cache_capacity),
            root: config.root()?,
            base: config.base()?,
        };
        log::debug!("configured {:?}", system);
        Ok(system)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn root_url(&self) -> &Url {
        &self.root
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    pub fn template_cache(&self) -> &TemplateCache {
        &self.templates
    }

    /// Register a connector under `scheme`.
    pub fn register(&mut self, scheme: &str, connector: impl Connector + 'static) -> Result<()> {
        self.registry.register(scheme, connector)
    }

    /// Register a template function.
    pub fn register_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&mut dyn Environment, &Datum, Datum, &[String]) -> TemplateResult<Datum>
            + Send
            + Sync
            + 'static,
    {
        Arc::make_mut(&mut self.functions).register(name, function);
    }

    /// Register a shared function object.
    pub fn register_function_object(&mut self, name: impl Into<String>, function: Arc<dyn Function>) {
        Arc::make_mut(&mut self.functions).register_function(name, function);
    }

    /// Parse `url` and resolve it against the base URL, or the root when no
    /// base is configured.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        let reference = Url::parse(url)?;
        Ok(self.base.as_ref().unwrap_or(&self.root).resolve(&reference))
    }

    /// Bind a detached value to `url` as a new item.
    pub fn create_item(&mut self, url: &str, root: ValueId) -> Result<ItemId> {
        let source = self.resolve(url)?;
        self.heap.create_item(root, source, None)
    }

    // ------------------------------------------------------------------
    // Get
    // ------------------------------------------------------------------

    /// Fetch the value at `url`.
    ///
    /// Values fetched without an owner are wrapped in an item whose source is
    /// the URL without its fragment; the fragment then navigates inside it.
    pub fn get(&mut self, url: &str) -> Result<Option<ValueId>> {
        let url = self.resolve(url)?;
        self.get_url(&url)
    }

    /// [`get`](Self::get) for an already resolved URL.
    pub fn get_url(&mut self, url: &Url) -> Result<Option<ValueId>> {
        let fetched = match RegistryPath::of(url)? {
            Some(path) => self.registry_get(path),
            None => self.fetch(&url.without_fragment())?,
        };
        match fetched {
            Some(value) => self.finish_get(value, url),
            None => Ok(None),
        }
    }

    pub fn get_value(&mut self, url: &str) -> Result<Option<Value>> {
        match self.get(url)? {
            Some(id) => self.heap.export(id).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_json(&mut self, url: &str) -> Result<Option<serde_json::Value>> {
        match self.get(url)? {
            Some(id) => export_json(&self.heap, id).map(Some),
            None => Ok(None),
        }
    }

    fn registry_get(&mut self, path: RegistryPath) -> Option<ValueId> {
        let listing = self.registry.listing();
        let value = match path {
            RegistryPath::Listing => listing,
            RegistryPath::Scheme(scheme) => listing.get(&scheme)?.clone(),
        };
        Some(self.heap.import(&value))
    }

    /// Dispatch a fragment-less URL to its connector.
    fn fetch(&mut self, url: &Url) -> Result<Option<ValueId>> {
        let scheme = scheme_of(url)?;
        let (connector, capabilities) = self.registry.lookup(scheme)?;
        let heap = &mut self.heap;

        let Some(query) = url.query_params()? else {
            log::trace!("get {}", url);
            let get = connector
                .as_get()
                .ok_or_else(|| missing(scheme, Capabilities::GET))?;
            return get.get(heap, url);
        };

        if capabilities.contains(Capabilities::BROWSE) {
            if let Some(kind) = query.browse_kind() {
                log::debug!("browse {:?} {}", kind, url);
                let browse = connector
                    .as_browse()
                    .ok_or_else(|| missing(scheme, Capabilities::BROWSE))?;
                let result = match kind {
                    BrowseKind::CountItems => browse.count_items(heap, url),
                    BrowseKind::PagedItems => {
                        browse.paged_items(heap, url, query.start_row()?, query.num_rows()?)
                    }
                    BrowseKind::PagedKeys => {
                        browse.paged_keys(heap, url, query.start_row()?, query.num_rows()?)
                    }
                    BrowseKind::Keys => browse.keys(heap, url),
                };
                return result.map(Some);
            }
        }
        if query.is_dump_query() && capabilities.contains(Capabilities::DUMP) {
            log::debug!("dump {}", url);
            let dump = connector
                .as_dump()
                .ok_or_else(|| missing(scheme, Capabilities::DUMP))?;
            return dump.dump(heap, url).map(Some);
        }
        if capabilities.contains(Capabilities::QUERY) {
            log::debug!("query {}", url);
            let query = connector
                .as_query()
                .ok_or_else(|| missing(scheme, Capabilities::QUERY))?;
            return query.query(heap, url);
        }
        log::debug!("connector '{}' cannot answer {}", scheme, url);
        Err(Error::UnsupportedQuery {
            scheme: scheme.to_string(),
            query: url.query().unwrap_or_default().to_string(),
        })
    }

    fn finish_get(&mut self, value: ValueId, url: &Url) -> Result<Option<ValueId>> {
        if self.heap.parent(value)?.is_none() && self.heap.item_of(value)?.is_none() {
            self.heap.create_item(value, url.without_fragment(), None)?;
        }
        let Some(fragment) = url.fragment_path()? else {
            return Ok(Some(value));
        };
        // even `#` alone needs a container to address
        if !self.heap.is_container(value) {
            return Err(Error::FragmentOnNonContainer {
                fragment: fragment.to_string(),
            });
        }
        self.heap.navigate(value, &fragment)
    }

    // ------------------------------------------------------------------
    // Put
    // ------------------------------------------------------------------

    /// Store `value` at `url`.
    ///
    /// A `load` query bulk-loads and returns null, releasing `value` when it
    /// was detached; any other query posts.
    /// Fragments are only accepted on `mem:` and write beneath the item
    /// root, creating it and any intermediate objects as needed.
    pub fn put(&mut self, url: &str, value: ValueId) -> Result<ValueId> {
        let url = self.resolve(url)?;
        self.put_url(&url, value)
    }

    /// [`put`](Self::put) for an already resolved URL.
    pub fn put_url(&mut self, url: &Url, value: ValueId) -> Result<ValueId> {
        if let Some(path) = RegistryPath::of(url)? {
            return self.registry_put(path, value);
        }
        let scheme = scheme_of(url)?;
        if url.fragment().is_some() {
            if !url.is_memory() {
                log::debug!("rejecting fragment put to {}", url);
                return Err(Error::FragmentPutUnsupported {
                    scheme: scheme.to_string(),
                });
            }
            return self.put_fragment(url, value);
        }

        let (connector, capabilities) = self.registry.lookup(scheme)?;
        let heap = &mut self.heap;
        if let Some(query) = url.query_params()? {
            if query.is_load_query() && capabilities.contains(Capabilities::LOAD) {
                log::debug!("load {}", url);
                let load = connector
                    .as_load()
                    .ok_or_else(|| missing(scheme, Capabilities::LOAD))?;
                load.load(heap, url, value)?;
                if heap.is_detached(value) {
                    heap.release(value)?;
                }
                return Ok(heap.null());
            }
            log::trace!("post {}", url);
            let post = connector
                .as_post()
                .ok_or_else(|| missing(scheme, Capabilities::POST))?;
            return post.post(heap, url, value);
        }
        log::trace!("put {}", url);
        let put = connector
            .as_put()
            .ok_or_else(|| missing(scheme, Capabilities::PUT))?;
        put.put(heap, url, value)
    }

    pub fn put_value(&mut self, url: &str, value: Value) -> Result<ValueId> {
        let id = self.heap.import(&value);
        self.put(url, id)
    }

    pub fn put_json(&mut self, url: &str, json: serde_json::Value) -> Result<ValueId> {
        let id = import_json(&mut self.heap, json);
        self.put(url, id)
    }

    fn put_fragment(&mut self, url: &Url, value: ValueId) -> Result<ValueId> {
        let fragment = url.fragment_path()?.unwrap_or_default();
        let document = url.without_fragment().without_query();
        let Some((parent_path, key)) = fragment.split_last() else {
            return self.put_url(&document, value);
        };

        // validate first so a rejected write creates nothing
        let root = match self.fetch(&document)? {
            Some(root) => {
                self.heap.check_put_path(root, &fragment, value)?;
                root
            }
            None => {
                self.heap.check_detached(value)?;
                let root = self.heap.object();
                match self.put_url(&document, root) {
                    Ok(stored) => stored,
                    Err(error) => {
                        if self.heap.is_detached(root) {
                            self.heap.release(root)?;
                        }
                        return Err(error);
                    }
                }
            }
        };
        let parent = self.heap.ensure_path(root, &parent_path)?;
        if !self.heap.is_container(parent) {
            return Err(Error::FragmentOnNonContainer {
                fragment: fragment.to_string(),
            });
        }
        if let Some(replaced) = self.heap.put(parent, key, value)? {
            self.heap.release(replaced)?;
        }
        Ok(value)
    }

    fn registry_put(&mut self, path: RegistryPath, value: ValueId) -> Result<ValueId> {
        let RegistryPath::Scheme(scheme) = path else {
            return Err(Error::InvalidConfig {
                message: "connectors are mounted at mem:/system/connectors/<scheme>".to_string(),
            });
        };
        if self.heap.is_null(value) {
            self.registry.unregister(&scheme)?;
        } else {
            let config = config_from_value(self.heap.export(value)?)?;
            self.registry.mount(&scheme, config)?;
        }
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Remove
    // ------------------------------------------------------------------

    /// Remove the value at `url`. Removing a missing key is not an error.
    pub fn remove(&mut self, url: &str) -> Result<()> {
        let url = self.resolve(url)?;
        self.remove_url(&url)
    }

    /// [`remove`](Self::remove) for an already resolved URL.
    pub fn remove_url(&mut self, url: &Url) -> Result<()> {
        if let Some(path) = RegistryPath::of(url)? {
            let RegistryPath::Scheme(scheme) = path else {
                return Err(Error::InvalidConfig {
                    message: "the connector listing cannot be removed".to_string(),
                });
            };
            self.registry.unregister(&scheme)?;
            return Ok(());
        }
        if url.query().is_some() {
            return Err(Error::QueryOnRemoveUnsupported {
                url: url.to_string(),
            });
        }
        let scheme = scheme_of(url)?;
        if url.fragment().is_some() {
            if !url.is_memory() {
                return Err(Error::FragmentRemoveUnsupported {
                    scheme: scheme.to_string(),
                });
            }
            return self.remove_fragment(url);
        }

        let (connector, _) = self.registry.lookup(scheme)?;
        log::trace!("remove {}", url);
        let put = connector
            .as_put()
            .ok_or_else(|| missing(scheme, Capabilities::PUT))?;
        put.remove(&mut self.heap, url)
    }

    fn remove_fragment(&mut self, url: &Url) -> Result<()> {
        let fragment = url.fragment_path()?.unwrap_or_default();
        let document = url.without_fragment();
        let Some((parent_path, key)) = fragment.split_last() else {
            return self.remove_url(&document);
        };
        let Some(root) = self.fetch(&document)? else {
            return Ok(());
        };
        let Some(parent) = self.heap.navigate(root, &parent_path)? else {
            return Ok(());
        };
        if !self.heap.is_container(parent) {
            return Err(Error::FragmentOnNonContainer {
                fragment: fragment.to_string(),
            });
        }
        if let Some(removed) = self.heap.remove(parent, key)? {
            self.heap.release(removed)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    /// Render template source against a context.
    pub fn render(&mut self, source: &str, context: impl Into<Datum>) -> TemplateResult<String> {
        let template = self.templates.get_or_compile(source)?;
        let functions = Arc::clone(&self.functions);
        let context = context.into();
        Interpreter::new(self, &functions).render(&template, &context)
    }

    /// Render to a value: a single-tag template yields its value unchanged,
    /// anything else yields the rendered text.
    pub fn render_value(
        &mut self,
        source: &str,
        context: impl Into<Datum>,
    ) -> TemplateResult<ValueId> {
        let template = self.templates.get_or_compile(source)?;
        let functions = Arc::clone(&self.functions);
        let context = context.into();
        let value = Interpreter::new(self, &functions).render_value(&template, &context)?;
        Ok(value.into_heap(&mut self.heap))
    }

    /// Render with the value at `url` as context (null when absent).
    pub fn render_url(&mut self, source: &str, url: &str) -> TemplateResult<String> {
        let context = match self.get(url)? {
            Some(id) => Datum::Ref(id),
            None => Datum::null(),
        };
        self.render(source, context)
    }
}

impl Environment for System {
    fn heap(&self) -> &Heap {
        &self.heap
    }

    fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    fn load(&mut self, url: &Url) -> Result<Option<ValueId>> {
        self.get_url(url)
    }

    fn base_url(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    fn root_url(&self) -> Url {
        self.root.clone()
    }
}

/// Receives the outcome of a `*_then` operation.
#[cfg(feature = "async")]
pub trait Callback<T> {
    fn on_success(self, value: T);

    fn on_error(self, error: Error);
}

#[cfg(feature = "async")]
impl<T, F> Callback<T> for F
where
    F: FnOnce(Result<T>),
{
    fn on_success(self, value: T) {
        self(Ok(value))
    }

    fn on_error(self, error: Error) {
        self(Err(error))
    }
}

#[cfg(feature = "async")]
fn deliver<T>(result: Result<T>, callback: impl Callback<T>) {
    match result {
        Ok(value) => callback.on_success(value),
        Err(error) => callback.on_error(error),
    }
}

#[cfg(feature = "async")]
impl System {
    /// Whether `url` goes through the connector's async capability instead
    /// of running the sync one inline.
    fn runs_async(&self, url: &Url, sync: Capabilities, asynchronous: Capabilities) -> Result<bool> {
        if url.query().is_some() || RegistryPath::of(url)?.is_some() {
            return Ok(false);
        }
        let capabilities = url
            .scheme()
            .and_then(|scheme| self.registry.capabilities(scheme));
        Ok(capabilities.is_some_and(|caps| !caps.contains(sync) && caps.contains(asynchronous)))
    }

    /// Async [`get`](Self::get). Connectors with a sync get are called inline.
    pub async fn get_async(&mut self, url: &str) -> Result<Option<ValueId>> {
        let url = self.resolve(url)?;
        if !self.runs_async(&url, Capabilities::GET, Capabilities::ASYNC_GET)? {
            return self.get_url(&url);
        }
        let scheme = scheme_of(&url)?;
        let getter = self
            .registry
            .connector(scheme)?
            .as_async_get()
            .ok_or_else(|| missing(scheme, Capabilities::ASYNC_GET))?;
        log::trace!("async get {}", url);
        let fetched = getter.get_async(&url.without_fragment()).await?;
        match fetched {
            Some(value) => {
                let id = self.heap.import(&value);
                self.finish_get(id, &url)
            }
            None => Ok(None),
        }
    }

    /// Async [`put`](Self::put). The stored value comes back as a new heap
    /// value when the connector is async-only.
    pub async fn put_async(&mut self, url: &str, value: ValueId) -> Result<ValueId> {
        let url = self.resolve(url)?;
        if url.fragment().is_some()
            || !self.runs_async(&url, Capabilities::PUT, Capabilities::ASYNC_PUT)?
        {
            return self.put_url(&url, value);
        }
        let owned = self.heap.export(value)?;
        let scheme = scheme_of(&url)?;
        let putter = self
            .registry
            .connector(scheme)?
            .as_async_put()
            .ok_or_else(|| missing(scheme, Capabilities::ASYNC_PUT))?;
        log::trace!("async put {}", url);
        let stored = putter.put_async(&url, owned).await?;
        Ok(self.heap.import(&stored))
    }

    /// Async [`remove`](Self::remove).
    pub async fn remove_async(&mut self, url: &str) -> Result<()> {
        let url = self.resolve(url)?;
        if url.fragment().is_some()
            || !self.runs_async(&url, Capabilities::PUT, Capabilities::ASYNC_PUT)?
        {
            return self.remove_url(&url);
        }
        let scheme = scheme_of(&url)?;
        let putter = self
            .registry
            .connector(scheme)?
            .as_async_put()
            .ok_or_else(|| missing(scheme, Capabilities::ASYNC_PUT))?;
        log::trace!("async remove {}", url);
        putter.remove_async(&url).await
    }

    pub async fn get_then(&mut self, url: &str, callback: impl Callback<Option<ValueId>>) {
        deliver(self.get_async(url).await, callback);
    }

    pub async fn put_then(&mut self, url: &str, value: ValueId, callback: impl Callback<ValueId>) {
        deliver(self.put_async(url, value).await, callback);
    }

    pub async fn remove_then(&mut self, url: &str, callback: impl Callback<()>) {
        deliver(self.remove_async(url).await, callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use urlstore_json::SnapshotConnector;

    #[test]
    fn relative_urls_resolve_against_root() {
        let system = System::new();
        assert_eq!(system.resolve("a/b").unwrap().to_string(), "mem:/a/b");
        assert_eq!(system.resolve("data:/x").unwrap().to_string(), "data:/x");
    }

    #[test]
    fn relative_urls_resolve_against_base() {
        let config = SystemConfig {
            base_url: Some("mem:/site/".to_string()),
            ..SystemConfig::default()
        };
        let mut system = System::with_config(config).unwrap();
        system.put_json("page", json!("hi")).unwrap();
        assert_eq!(system.get_json("mem:/site/page").unwrap(), Some(json!("hi")));
    }

    #[test]
    fn unknown_scheme() {
        let mut system = System::new();
        assert_eq!(
            system.get("ftp:/x").unwrap_err(),
            Error::NoConnectorForScheme {
                scheme: "ftp".to_string()
            }
        );
    }

    #[test]
    fn fetched_values_are_wrapped_in_items() {
        let mut system = System::new();
        system
            .register("data", SnapshotConnector::from_json(json!({"a": {"b": 1}})))
            .unwrap();
        let id = system.get("data:/a").unwrap().unwrap();
        let item = system.heap().item_of(id).unwrap().unwrap();
        assert_eq!(
            system.heap().item(item).unwrap().source().to_string(),
            "data:/a"
        );

        let nested = system.get("data:/a#b").unwrap().unwrap();
        assert_eq!(system.heap().fragment_of(nested).unwrap().to_string(), "b");
    }

    #[test]
    fn missing_capabilities() {
        let mut system = System::new();
        system
            .register("data", SnapshotConnector::from_json(json!({})))
            .unwrap();
        assert_eq!(
            system.put_json("data:/a", json!(1)).unwrap_err(),
            Error::ConnectorMissingCapability {
                scheme: "data".to_string(),
                capability: Capabilities::PUT
            }
        );
        assert_eq!(
            system.get("data:/?dump").unwrap_err(),
            Error::UnsupportedQuery {
                scheme: "data".to_string(),
                query: "dump".to_string()
            }
        );
        assert_eq!(
            system.put_json("data:/a#b", json!(1)).unwrap_err(),
            Error::FragmentPutUnsupported {
                scheme: "data".to_string()
            }
        );
        assert_eq!(
            system.remove("data:/a#b").unwrap_err(),
            Error::FragmentRemoveUnsupported {
                scheme: "data".to_string()
            }
        );
    }

    #[test]
    fn fragment_put_creates_the_document() {
        let mut system = System::new();
        system.put_json("mem:/doc#a.b", json!(1)).unwrap();
        assert_eq!(
            system.get_json("mem:/doc").unwrap(),
            Some(json!({"a": {"b": 1}}))
        );
        system.put_json("mem:/doc#a.b", json!(2)).unwrap();
        assert_eq!(system.get_json("mem:/doc#a.b").unwrap(), Some(json!(2)));
    }

    #[test]
    fn fragment_put_below_a_scalar() {
        let mut system = System::new();
        system.put_json("mem:/doc", json!({"a": 1})).unwrap();
        assert!(matches!(
            system.put_json("mem:/doc#a.b", json!(2)),
            Err(Error::FragmentOnNonContainer { .. })
        ));
    }

    #[test]
    fn render_through_the_store() {
        let mut system = System::new();
        system
            .put_json("mem:/people/ann", json!({"name": "Ann"}))
            .unwrap();
        assert_eq!(
            system
                .render_url("Hello {:name}", "mem:/people/ann")
                .unwrap(),
            "Hello Ann"
        );
        assert_eq!(
            system
                .render("{.section @mem:/people/ann}{:name html}{.end}", Datum::null())
                .unwrap(),
            "Ann"
        );
        assert_eq!(system.template_cache().misses(), 2);
    }

    #[test]
    fn render_value_keeps_structure() {
        let mut system = System::new();
        system.put_json("mem:/doc", json!({"list": [1, 2]})).unwrap();
        let context = system.get("mem:/doc").unwrap().unwrap();
        let id = system.render_value("{:list}", context).unwrap();
        assert_eq!(export_json(system.heap(), id).unwrap(), json!([1, 2]));
        let text = system.render_value("n={:list.0}", context).unwrap();
        assert_eq!(system.heap().as_str(text), Some("n=1"));
    }

    #[test]
    fn custom_functions() {
        let mut system = System::new();
        system.register_function(
            "shout",
            |env: &mut dyn Environment, _: &Datum, input: Datum, _: &[String]| {
                Ok(Datum::from(input.to_text(env.heap())?.to_uppercase()))
            },
        );
        assert_eq!(system.render("{&hey shout}", Datum::null()).unwrap(), "HEY");
    }
}
