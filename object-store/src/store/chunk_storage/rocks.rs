use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chunk_storage::{ChunkResult, ChunkStore};
use rocksdb::{IteratorMode, WriteOptions, DB};

use crate::store::storage::{column_family, CHUNKS_CF};

/// A `ChunkStore` that keeps chunks in the `chunks` column family, next to the manifests.
#[derive(Clone)]
pub struct RocksChunkStore {
    db: Arc<DB>,
}

impl fmt::Debug for RocksChunkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksChunkStore").field("path", &self.db.path()).finish()
    }
}

impl RocksChunkStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChunkStore for RocksChunkStore {
    async fn put_chunk(&self, chunk_id: &str, data: &[u8]) -> ChunkResult<()> {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        self.db
            .put_cf_opt(column_family(&self.db, CHUNKS_CF)?, chunk_id, data, &opts)?;
        Ok(())
    }

    async fn get_chunk(&self, chunk_id: &str) -> ChunkResult<Option<Bytes>> {
        let data = self.db.get_cf(column_family(&self.db, CHUNKS_CF)?, chunk_id)?;
        Ok(data.map(Bytes::from))
    }

    async fn delete_chunk(&self, chunk_id: &str) -> ChunkResult<()> {
        self.db.delete_cf(column_family(&self.db, CHUNKS_CF)?, chunk_id)?;
        Ok(())
    }

    async fn list_chunks(&self) -> ChunkResult<Vec<String>> {
        let mut ids = Vec::new();
        for res in self.db.iterator_cf(column_family(&self.db, CHUNKS_CF)?, IteratorMode::Start) {
            let (key, _) = res?;
            ids.push(String::from_utf8(key.into_vec())?);
        }
        Ok(ids)
    }
}
