//! Storage contract for serialized blocks.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::{Mutex, PoisonError};

use super::block::{MapBlock, encode_block};
use super::position::BlockPosition;

/// Error raised by a storage backend (connection loss, failed query, ...).
#[derive(Debug)]
pub struct BackendError(Box<dyn std::error::Error + Send + Sync>);

impl BackendError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage backend error: {}", self.0)
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Source of raw block bytes. `Ok(None)` means the block does not exist.
pub trait Backend: Send + Sync {
    fn get_block_data(&self, pos: BlockPosition) -> Result<Option<Vec<u8>>, BackendError>;
}

/// Backend holding serialized blocks in memory.
pub struct MemoryBackend {
    blocks: Mutex<HashMap<BlockPosition, Vec<u8>>>,
    queries: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
            queries: AtomicU64::new(0),
        }
    }

    pub fn insert(&self, pos: BlockPosition, data: Vec<u8>) {
        self.blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pos, data);
    }

    /// Serialize and store a decoded block.
    pub fn insert_block(&self, pos: BlockPosition, block: &MapBlock) -> std::io::Result<()> {
        self.insert(pos, encode_block(block)?);
        Ok(())
    }

    /// Number of `get_block_data` calls served so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Relaxed)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn get_block_data(&self, pos: BlockPosition) -> Result<Option<Vec<u8>>, BackendError> {
        self.queries.fetch_add(1, Relaxed);
        Ok(self
            .blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pos)
            .cloned())
    }
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn get_block_data(&self, pos: BlockPosition) -> Result<Option<Vec<u8>>, BackendError> {
        (**self).get_block_data(pos)
    }
}
