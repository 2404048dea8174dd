//! Registry that plugins inject their extensions into

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::PluginError;
use crate::storage::{BlockStore, StorageError};

/// Opens a block store of one datastore kind.
///
/// Arguments are the datastore directory and the configured size cap in GiB.
pub type DatastoreOpener =
    Arc<dyn Fn(&Path, u64) -> Result<BlockStore, StorageError> + Send + Sync>;

/// Extensions contributed by injected plugins.
///
/// Owned by one client; nothing is registered process-wide.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    datastores: HashMap<String, DatastoreOpener>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a datastore kind. Kinds are unique.
    pub fn register_datastore(
        &mut self,
        kind: impl Into<String>,
        opener: DatastoreOpener,
    ) -> Result<(), PluginError> {
        let kind = kind.into();
        if self.datastores.contains_key(&kind) {
            return Err(PluginError::DuplicateDatastore(kind));
        }
        self.datastores.insert(kind, opener);
        Ok(())
    }

    pub fn datastore(&self, kind: &str) -> Option<DatastoreOpener> {
        self.datastores.get(kind).cloned()
    }

    pub fn has_datastore(&self, kind: &str) -> bool {
        self.datastores.contains_key(kind)
    }

    /// Registered datastore kinds, sorted
    pub fn datastore_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.datastores.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("datastores", &self.datastore_kinds())
            .finish()
    }
}
