//! Capability descriptors for connectors.

use std::fmt;

/// The set of operations a connector supports.
///
/// The registry computes this once when a connector is registered and uses it
/// to pick a dispatch path without probing the connector again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u16);

impl Capabilities {
    /// No capabilities.
    pub const NONE: Capabilities = Capabilities(0);
    /// Synchronous get.
    pub const GET: Capabilities = Capabilities(1 << 0);
    /// Asynchronous get.
    pub const ASYNC_GET: Capabilities = Capabilities(1 << 1);
    /// Synchronous put and remove.
    pub const PUT: Capabilities = Capabilities(1 << 2);
    /// Asynchronous put and remove.
    pub const ASYNC_PUT: Capabilities = Capabilities(1 << 3);
    /// Synchronous post.
    pub const POST: Capabilities = Capabilities(1 << 4);
    /// Browse queries (`countItems`, `keys`, `pagedItems`, `pagedKeys`).
    pub const BROWSE: Capabilities = Capabilities(1 << 5);
    /// Generic query.
    pub const QUERY: Capabilities = Capabilities(1 << 6);
    /// Bulk load.
    pub const LOAD: Capabilities = Capabilities(1 << 7);
    /// Bulk dump.
    pub const DUMP: Capabilities = Capabilities(1 << 8);

    const NAMES: [(Capabilities, &'static str); 9] = [
        (Capabilities::GET, "get"),
        (Capabilities::ASYNC_GET, "asyncGet"),
        (Capabilities::PUT, "put"),
        (Capabilities::ASYNC_PUT, "asyncPut"),
        (Capabilities::POST, "post"),
        (Capabilities::BROWSE, "browse"),
        (Capabilities::QUERY, "query"),
        (Capabilities::LOAD, "load"),
        (Capabilities::DUMP, "dump"),
    ];

    /// Check whether every capability in `other` is present.
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Add a capability when `condition` holds.
    #[must_use]
    pub const fn with_if(self, other: Capabilities, condition: bool) -> Capabilities {
        if condition {
            Capabilities(self.0 | other.0)
        } else {
            self
        }
    }

    /// Names of the individual capabilities in this set.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(cap, _)| self.contains(*cap))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Capabilities) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "nothing");
        }
        write!(f, "{}", self.names().join("|"))
    }
}
