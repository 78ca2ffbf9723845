use crate::error::{StoreError, StoreResult};

/// Default chunk size, 255 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

pub const DEFAULT_MANIFEST_CACHE_CAPACITY: usize = 10_000;

/// Store-wide settings. Chunk size is fixed for the lifetime of a store;
/// manifests record the size their object was cut with.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub chunk_size: usize,
    /// Uploads longer than this are rejected. `None` means unbounded.
    pub max_object_size: Option<u64>,
    /// Number of manifests kept in the in-process read cache.
    pub manifest_cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_object_size: None,
            manifest_cache_capacity: DEFAULT_MANIFEST_CACHE_CAPACITY,
        }
    }
}

impl StoreConfig {
    pub fn validate(self) -> StoreResult<Self> {
        if self.chunk_size == 0 {
            return Err(StoreError::Invalid("chunk size must be greater than zero".to_string()));
        }
        if self.manifest_cache_capacity == 0 {
            return Err(StoreError::Invalid(
                "manifest cache capacity must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}
