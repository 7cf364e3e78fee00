//! Scheme to connector registry.
//!
//! The registry is also reachable through the store itself:
//! - Read `mem:/system/connectors` to list connectors and their capabilities
//! - Write a config to `mem:/system/connectors/<scheme>` to mount a connector
//! - Write `null` to (or remove) `mem:/system/connectors/<scheme>` to unmount
//!
//! Connector configurations are JSON objects like:
//! ```json
//! {"type": "memory"}
//! {"type": "snapshot", "data": {"users": []}}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use urlstore_core::{Capabilities, Connector, Error, Result, Url, Value, MEMORY_SCHEME};
use urlstore_json::{MemoryConnector, SnapshotConnector};

/// Path segments of the registry inside the `mem:` scheme.
pub const REGISTRY_SEGMENTS: [&str; 2] = ["system", "connectors"];

/// Configuration for a connector built by a [`ConnectorFactory`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectorConfig {
    /// An empty in-memory store.
    Memory,
    /// A read-only JSON document.
    Snapshot { data: serde_json::Value },
}

/// Builds connectors from configurations.
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>>;
}

/// Builds the connectors this workspace ships.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnectorFactory;

impl ConnectorFactory for DefaultConnectorFactory {
    fn create(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>> {
        let connector: Box<dyn Connector> = match config {
            ConnectorConfig::Memory => Box::new(MemoryConnector::new()),
            ConnectorConfig::Snapshot { data } => {
                Box::new(SnapshotConnector::from_json(data.clone()))
            }
        };
        Ok(connector)
    }
}

struct Entry {
    connector: Box<dyn Connector>,
    capabilities: Capabilities,
    config: Option<ConnectorConfig>,
}

/// Maps URL schemes to connectors.
///
/// Capabilities are computed once, at registration. The `mem` scheme is
/// registered on construction and cannot be replaced or removed.
pub struct Registry {
    entries: BTreeMap<String, Entry>,
    factory: Box<dyn ConnectorFactory>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (scheme, entry) in &self.entries {
            map.entry(scheme, &entry.capabilities.to_string());
        }
        map.finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_factory(DefaultConnectorFactory)
    }

    /// A registry that builds mounted connectors with `factory`.
    pub fn with_factory(factory: impl ConnectorFactory + 'static) -> Self {
        let mut registry = Self {
            entries: BTreeMap::new(),
            factory: Box::new(factory),
        };
        registry.insert(
            MEMORY_SCHEME,
            Box::new(MemoryConnector::new()),
            Some(ConnectorConfig::Memory),
        );
        registry
    }

    fn insert(
        &mut self,
        scheme: &str,
        mut connector: Box<dyn Connector>,
        config: Option<ConnectorConfig>,
    ) {
        let capabilities = connector.capabilities();
        log::debug!("registering connector '{}' ({})", scheme, capabilities);
        self.entries.insert(
            scheme.to_string(),
            Entry {
                connector,
                capabilities,
                config,
            },
        );
    }

    fn check_reserved(scheme: &str) -> Result<()> {
        if scheme == MEMORY_SCHEME {
            return Err(Error::ReservedScheme {
                scheme: scheme.to_string(),
            });
        }
        if scheme.is_empty() {
            return Err(Error::InvalidConfig {
                message: "connector scheme must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Register a pre-built connector, replacing any previous one.
    pub fn register(&mut self, scheme: &str, connector: impl Connector + 'static) -> Result<()> {
        Self::check_reserved(scheme)?;
        self.insert(scheme, Box::new(connector), None);
        Ok(())
    }

    /// Build a connector from `config` and register it.
    pub fn mount(&mut self, scheme: &str, config: ConnectorConfig) -> Result<()> {
        Self::check_reserved(scheme)?;
        let connector = self.factory.create(&config)?;
        self.insert(scheme, connector, Some(config));
        Ok(())
    }

    /// Remove a connector. Returns whether one was registered.
    pub fn unregister(&mut self, scheme: &str) -> Result<bool> {
        Self::check_reserved(scheme)?;
        let removed = self.entries.remove(scheme).is_some();
        if removed {
            log::debug!("unregistered connector '{}'", scheme);
        }
        Ok(removed)
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.entries.contains_key(scheme)
    }

    pub fn capabilities(&self, scheme: &str) -> Option<Capabilities> {
        self.entries.get(scheme).map(|entry| entry.capabilities)
    }

    /// The configuration a connector was mounted with, if it was mounted
    /// from one.
    pub fn config(&self, scheme: &str) -> Option<&ConnectorConfig> {
        self.entries.get(scheme).and_then(|entry| entry.config.as_ref())
    }

    /// Registered schemes in sorted order.
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The connector for a scheme and its capabilities.
    pub fn lookup(&mut self, scheme: &str) -> Result<(&mut dyn Connector, Capabilities)> {
        let Some(entry) = self.entries.get_mut(scheme) else {
            return Err(Error::NoConnectorForScheme {
                scheme: scheme.to_string(),
            });
        };
        let connector: &mut dyn Connector = entry.connector.as_mut();
        Ok((connector, entry.capabilities))
    }

    /// Shared access, for the async capabilities.
    pub fn connector(&self, scheme: &str) -> Result<&dyn Connector> {
        self.entries
            .get(scheme)
            .map(|entry| entry.connector.as_ref())
            .ok_or_else(|| Error::NoConnectorForScheme {
                scheme: scheme.to_string(),
            })
    }

    /// `{scheme: [capability names]}` for every registered connector.
    pub fn listing(&self) -> Value {
        self.entries
            .iter()
            .map(|(scheme, entry)| (scheme.clone(), Value::from(entry.capabilities.names())))
            .collect()
    }
}

/// Where a URL points inside the registry, if it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegistryPath {
    /// `mem:/system/connectors`
    Listing,
    /// `mem:/system/connectors/<scheme>`
    Scheme(String),
}

impl RegistryPath {
    pub(crate) fn of(url: &Url) -> Result<Option<Self>> {
        if !url.is_memory() {
            return Ok(None);
        }
        let segments = url.path_segments()?;
        if segments.len() < REGISTRY_SEGMENTS.len()
            || segments[..REGISTRY_SEGMENTS.len()] != REGISTRY_SEGMENTS
        {
            return Ok(None);
        }
        Ok(Some(match &segments[REGISTRY_SEGMENTS.len()..] {
            [] => RegistryPath::Listing,
            rest => RegistryPath::Scheme(rest.join("/")),
        }))
    }
}

/// Parse a connector configuration from a store value.
pub(crate) fn config_from_value(value: Value) -> Result<ConnectorConfig> {
    urlstore_json::from_value(value).map_err(|e| Error::InvalidConfig {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use urlstore_json::{json_to_value, value_to_json};

    #[test]
    fn memory_is_registered_and_reserved() {
        let mut registry = Registry::new();
        assert!(registry.contains("mem"));
        assert_eq!(
            registry.unregister("mem").unwrap_err(),
            Error::ReservedScheme {
                scheme: "mem".to_string()
            }
        );
        assert_eq!(
            registry.mount("mem", ConnectorConfig::Memory).unwrap_err(),
            Error::ReservedScheme {
                scheme: "mem".to_string()
            }
        );
    }

    #[test]
    fn mount_and_list() {
        let mut registry = Registry::new();
        registry
            .mount("data", ConnectorConfig::Snapshot { data: json!({"a": 1}) })
            .unwrap();
        assert_eq!(
            registry.capabilities("data"),
            Some(Capabilities::GET | Capabilities::BROWSE)
        );
        assert_eq!(
            value_to_json(registry.listing()),
            json!({
                "data": ["get", "browse"],
                "mem": ["get", "put", "post", "browse", "load", "dump"],
            })
        );
        assert_eq!(registry.schemes().collect::<Vec<_>>(), vec!["data", "mem"]);
    }

    #[test]
    fn unregister_reports_presence() {
        let mut registry = Registry::new();
        registry.mount("tmp", ConnectorConfig::Memory).unwrap();
        assert!(registry.unregister("tmp").unwrap());
        assert!(!registry.unregister("tmp").unwrap());
        assert!(matches!(
            registry.lookup("tmp"),
            Err(Error::NoConnectorForScheme { .. })
        ));
    }

    #[test]
    fn config_serde() {
        let config: ConnectorConfig =
            serde_json::from_value(json!({"type": "snapshot", "data": [1]})).unwrap();
        assert_eq!(config, ConnectorConfig::Snapshot { data: json!([1]) });
        assert_eq!(
            serde_json::to_value(ConnectorConfig::Memory).unwrap(),
            json!({"type": "memory"})
        );
        assert!(matches!(
            config_from_value(json_to_value(json!({"type": "ftp"}))),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn registry_paths() {
        let of = |s: &str| RegistryPath::of(&Url::parse(s).unwrap()).unwrap();
        assert_eq!(of("mem:/system/connectors"), Some(RegistryPath::Listing));
        assert_eq!(of("mem:/system/connectors/"), Some(RegistryPath::Listing));
        assert_eq!(
            of("mem:/system/connectors/data"),
            Some(RegistryPath::Scheme("data".to_string()))
        );
        assert_eq!(of("mem:/system"), None);
        assert_eq!(of("data:/system/connectors"), None);
    }
}
