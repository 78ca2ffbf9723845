use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::store::{ChunkResult, ChunkStore};

/// Keeps chunks in process memory. Contents are lost on restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryChunkStore {
    chunks: Arc<DashMap<String, Bytes>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn put_chunk(&self, chunk_id: &str, data: &[u8]) -> ChunkResult<()> {
        self.chunks
            .insert(chunk_id.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn get_chunk(&self, chunk_id: &str) -> ChunkResult<Option<Bytes>> {
        Ok(self.chunks.get(chunk_id).map(|entry| entry.value().clone()))
    }

    async fn delete_chunk(&self, chunk_id: &str) -> ChunkResult<()> {
        self.chunks.remove(chunk_id);
        Ok(())
    }

    async fn list_chunks(&self) -> ChunkResult<Vec<String>> {
        Ok(self.chunks.iter().map(|entry| entry.key().clone()).collect())
    }
}
