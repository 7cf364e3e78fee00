//! JSON conversion and the built-in connectors.
//!
//! - [`convert`]: serde_json values to and from owned and heap values
//! - [`MemoryConnector`]: the `mem:` scheme, items keyed by path
//! - [`SnapshotConnector`]: a read-only JSON document served by path

pub mod convert;
pub mod memory;
pub mod snapshot;

pub use convert::{export_json, from_value, import_json, json_to_value, to_value, value_to_json};
pub use memory::MemoryConnector;
pub use snapshot::SnapshotConnector;
