//! Plugins compiled into the node

use std::path::Path;
use std::sync::Arc;

use super::{Plugin, PluginError, PluginRegistry};
use crate::storage::BlockStore;

/// Persistent sled datastore
pub struct SledDatastorePlugin;

impl Plugin for SledDatastorePlugin {
    fn name(&self) -> &str {
        "ds-sled"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn inject(&self, registry: &mut PluginRegistry) -> Result<(), PluginError> {
        registry.register_datastore(
            "sled",
            Arc::new(|path: &Path, max_size_gb: u64| BlockStore::open(path, max_size_gb)),
        )
    }
}

/// In-memory datastore, nothing is written under the repository
pub struct MemoryDatastorePlugin;

impl Plugin for MemoryDatastorePlugin {
    fn name(&self) -> &str {
        "ds-memory"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn inject(&self, registry: &mut PluginRegistry) -> Result<(), PluginError> {
        registry.register_datastore(
            "memory",
            Arc::new(|_path: &Path, max_size_gb: u64| BlockStore::temporary(max_size_gb)),
        )
    }
}

/// Plugins every loader starts with
pub fn builtin_plugins() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(SledDatastorePlugin), Box::new(MemoryDatastorePlugin)]
}
