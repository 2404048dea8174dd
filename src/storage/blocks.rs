//! Local block storage using sled embedded database

use sled::{Db, Tree};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::info;

use crate::content::ContentId;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Block not found: {0}")]
    NotFound(ContentId),
    #[error("Storage full")]
    StorageFull,
    #[error("Block ID mismatch")]
    BlockIdMismatch,
}

/// Local storage for content blocks
pub struct BlockStore {
    #[allow(dead_code)]
    db: Db,
    blocks: Tree,
    metadata: Tree,
    max_size_bytes: u64,
    used_bytes: AtomicU64,
}

impl BlockStore {
    /// Open or create a block store at the given path
    pub fn open(path: impl AsRef<Path>, max_size_gb: u64) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?, max_size_gb)
    }

    /// In-memory block store, discarded when dropped
    pub fn temporary(max_size_gb: u64) -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?, max_size_gb)
    }

    fn from_db(db: Db, max_size_gb: u64) -> Result<Self, StorageError> {
        let blocks = db.open_tree("blocks")?;
        let metadata = db.open_tree("metadata")?;

        let mut used = 0u64;
        for item in blocks.iter() {
            let (_, value) = item?;
            used += value.len() as u64;
        }

        Ok(Self {
            db,
            blocks,
            metadata,
            max_size_bytes: max_size_gb.saturating_mul(1024 * 1024 * 1024),
            used_bytes: AtomicU64::new(used),
        })
    }

    /// Store a block. Storing a block that is already present is a no-op.
    pub fn put(&self, id: &ContentId, data: &[u8]) -> Result<(), StorageError> {
        let computed_id = ContentId::from_data(data);
        if computed_id != *id {
            info!("Block ID mismatch - rejecting");
            return Err(StorageError::BlockIdMismatch);
        }

        if self.has(id)? {
            return Ok(());
        }

        if self.total_size() + data.len() as u64 > self.max_size_bytes {
            return Err(StorageError::StorageFull);
        }

        // A concurrent put of the same block may have landed since `has`;
        // only the insert that created the key is counted
        if self.blocks.insert(id.as_bytes(), data)?.is_some() {
            return Ok(());
        }
        self.used_bytes.fetch_add(data.len() as u64, Ordering::Relaxed);

        let key = format!("stored_at:{}", id);
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.metadata.insert(key.as_bytes(), &timestamp.to_le_bytes())?;

        Ok(())
    }

    /// Retrieve a block
    pub fn get(&self, id: &ContentId) -> Result<Vec<u8>, StorageError> {
        self.blocks
            .get(id.as_bytes())?
            .map(|v| v.to_vec())
            .ok_or(StorageError::NotFound(*id))
    }

    pub fn has(&self, id: &ContentId) -> Result<bool, StorageError> {
        Ok(self.blocks.contains_key(id.as_bytes())?)
    }

    pub fn delete(&self, id: &ContentId) -> Result<(), StorageError> {
        if let Some(old) = self.blocks.remove(id.as_bytes())? {
            self.used_bytes.fetch_sub(old.len() as u64, Ordering::Relaxed);
        }
        let key = format!("stored_at:{}", id);
        self.metadata.remove(key.as_bytes())?;
        Ok(())
    }

    /// List all stored block IDs
    pub fn list(&self) -> Result<Vec<ContentId>, StorageError> {
        let mut ids = Vec::new();
        for item in self.blocks.iter() {
            let (key, _) = item?;
            if let Ok(bytes) = <[u8; 32]>::try_from(key.as_ref()) {
                ids.push(ContentId::from_bytes(bytes));
            }
        }
        Ok(ids)
    }

    /// Bytes used by stored blocks
    pub fn total_size(&self) -> u64 {
        self.used_bytes.load(Ordering::Relaxed)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        Ok(self.blocks.len())
    }

    /// Flush changes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.blocks.flush()?;
        self.metadata.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("used_bytes", &self.total_size())
            .field("max_size_bytes", &self.max_size_bytes)
            .finish()
    }
}
