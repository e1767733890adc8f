pub mod backend;
pub mod block;
pub mod neighborhood;
pub mod position;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use backend::{Backend, BackendError};
use block::{DecodeError, MapBlock, decode_block};
use position::BlockPosition;

/// Default number of decoded blocks kept in memory.
pub const BLOCK_CACHE_SIZE: usize = 16384;

#[derive(Debug)]
pub enum WorldError {
    Backend(BackendError),
    Decode { pos: BlockPosition, source: DecodeError },
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::Backend(e) => write!(f, "{}", e),
            WorldError::Decode { pos, source } => {
                write!(f, "block ({}, {}, {}) is undecodable: {}", pos.x, pos.y, pos.z, source)
            }
        }
    }
}

impl std::error::Error for WorldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorldError::Backend(e) => Some(e),
            WorldError::Decode { source, .. } => Some(source),
        }
    }
}

impl From<BackendError> for WorldError {
    fn from(e: BackendError) -> Self {
        WorldError::Backend(e)
    }
}

/// Cache entry. `Absent` is a tombstone for blocks known not to exist.
#[derive(Clone)]
enum CachedBlock {
    Present(Arc<MapBlock>),
    Absent,
}

impl CachedBlock {
    fn block(&self) -> Option<Arc<MapBlock>> {
        match self {
            CachedBlock::Present(block) => Some(Arc::clone(block)),
            CachedBlock::Absent => None,
        }
    }
}

/// Read-only view of a stored world, with an LRU of decoded blocks in front
/// of the storage backend. Shared by all render workers.
///
/// The cache lock is held only for lookup and insertion. Two workers missing
/// on the same block may both fetch and decode it; the later insert wins and
/// both receive complete blocks.
pub struct World {
    backend: Box<dyn Backend>,
    cache: Mutex<LruCache<BlockPosition, CachedBlock>>,
}

impl World {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::with_capacity(backend, BLOCK_CACHE_SIZE)
    }

    pub fn with_capacity(backend: impl Backend + 'static, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend: Box::new(backend),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Fetch a decoded block. `Ok(None)` means the block does not exist.
    ///
    /// Undecodable blocks are cached as absent and reported once; storage
    /// errors are not cached so the next call retries the query.
    pub fn get_block(&self, pos: BlockPosition) -> Result<Option<Arc<MapBlock>>, WorldError> {
        let cached = self.lock_cache().get(&pos).cloned();
        if let Some(entry) = cached {
            return Ok(entry.block());
        }

        let data = self.backend.get_block_data(pos)?;
        let (entry, result) = match data {
            None => (CachedBlock::Absent, Ok(None)),
            Some(bytes) => match decode_block(&bytes) {
                Ok(block) => {
                    let block = Arc::new(block);
                    (CachedBlock::Present(Arc::clone(&block)), Ok(Some(block)))
                }
                Err(source) => (CachedBlock::Absent, Err(WorldError::Decode { pos, source })),
            },
        };

        self.lock_cache().put(pos, entry);
        result
    }

    /// Number of positions currently cached, tombstones included.
    pub fn cached_blocks(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> MutexGuard<'_, LruCache<BlockPosition, CachedBlock>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
