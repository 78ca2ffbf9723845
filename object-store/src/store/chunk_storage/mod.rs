use std::path::PathBuf;
use std::sync::Arc;

use chunk_storage::{ChunkStore, LocalChunkStore, MemoryChunkStore};
use rocksdb::DB;

use crate::error::StoreResult;
use crate::store::chunk_storage::rocks::RocksChunkStore;

pub mod rocks;

/// Which backend chunks are written to.
#[derive(Debug, Clone)]
pub enum ChunkBackend {
    /// One file per chunk under the given directory.
    Local(PathBuf),
    /// The `chunks` column family of the manifest database.
    Rocks,
    /// Process memory; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone)]
pub enum ChunkStores {
    Local(LocalChunkStore),
    Rocks(RocksChunkStore),
    Memory(MemoryChunkStore),
}

impl ChunkStores {
    pub fn open(backend: &ChunkBackend, db: Arc<DB>) -> StoreResult<Self> {
        Ok(match backend {
            ChunkBackend::Local(dir) => ChunkStores::Local(LocalChunkStore::open(dir)?),
            ChunkBackend::Rocks => ChunkStores::Rocks(RocksChunkStore::new(db)),
            ChunkBackend::Memory => ChunkStores::Memory(MemoryChunkStore::new()),
        })
    }

    /// Returns a reference to the inner value as a trait object.
    pub fn as_trait(&self) -> &dyn ChunkStore {
        match self {
            ChunkStores::Local(a) => a,
            ChunkStores::Rocks(b) => b,
            ChunkStores::Memory(c) => c,
        }
    }
}
