//! System configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use urlstore_core::{Error, Result, Url};

use crate::registry::ConnectorConfig;

/// How a [`System`](crate::System) is set up.
///
/// ```rust
/// use urlstore::SystemConfig;
///
/// let config = SystemConfig::from_json_str(r#"{
///     "base_url": "mem:/site/",
///     "connectors": {"data": {"type": "snapshot", "data": {"a": 1}}}
/// }"#).unwrap();
/// assert_eq!(config.root_url, "mem:/");
/// assert_eq!(config.template_cache_capacity, 128);
/// assert!(config.connectors.contains_key("data"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    /// Resolution base of last resort.
    pub root_url: String,
    /// Resolution base for relative URLs and template loads.
    pub base_url: Option<String>,
    pub template_cache_capacity: usize,
    /// Connectors to mount, by scheme.
    pub connectors: BTreeMap<String, ConnectorConfig>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            root_url: Url::memory_root().to_string(),
            base_url: None,
            template_cache_capacity: 128,
            connectors: BTreeMap::new(),
        }
    }
}

impl SystemConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// The root URL, which must be absolute.
    pub(crate) fn root(&self) -> Result<Url> {
        absolute(&self.root_url, "root_url")
    }

    pub(crate) fn base(&self) -> Result<Option<Url>> {
        self.base_url
            .as_deref()
            .map(|base| absolute(base, "base_url"))
            .transpose()
    }
}

fn absolute(raw: &str, field: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    if url.is_relative() {
        return Err(Error::InvalidConfig {
            message: format!("{} must be an absolute url, got '{}'", field, raw),
        });
    }
    Ok(url)
}
