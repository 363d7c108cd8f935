//! Name → address table and its shared store.
//!
//! # Design Decisions
//! - A [`NameTable`] is immutable once built; a sync publishes a new one
//! - [`SharedTable`] swaps whole tables, so readers never see a mix
//! - Invalid entries are dropped one by one, the rest is still usable

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

/// A name/address pair rejected while building a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidEntry {
    pub name: String,
    pub address: String,
}

/// Immutable mapping from logical name to backend address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameTable {
    entries: HashMap<String, IpAddr>,
}

impl NameTable {
    /// Build a table from raw strings, dropping entries whose address is
    /// not an IP literal.
    pub fn from_raw(raw: HashMap<String, String>) -> (Self, Vec<InvalidEntry>) {
        let mut entries = HashMap::with_capacity(raw.len());
        let mut invalid = Vec::new();

        for (name, address) in raw {
            match address.parse::<IpAddr>() {
                Ok(ip) => {
                    entries.insert(name, ip);
                }
                Err(_) => invalid.push(InvalidEntry { name, address }),
            }
        }

        (Self { entries }, invalid)
    }

    pub fn get(&self, name: &str) -> Option<IpAddr> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, IpAddr)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, IpAddr)> for NameTable {
    fn from_iter<I: IntoIterator<Item = (String, IpAddr)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Atomically replaceable table shared by all listeners.
#[derive(Debug, Default)]
pub struct SharedTable {
    current: ArcSwap<NameTable>,
}

impl SharedTable {
    pub fn new(table: NameTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    /// Replace the whole table.
    pub fn publish(&self, table: NameTable) {
        self.current.store(Arc::new(table));
    }

    pub fn lookup(&self, name: &str) -> Option<IpAddr> {
        self.current.load().get(name)
    }

    pub fn snapshot(&self) -> Arc<NameTable> {
        self.current.load_full()
    }
}
