use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;

pub type ChunkResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Trait for storing and fetching chunks by their IDs.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Stores a chunk by its id. The chunk is durable once this returns.
    async fn put_chunk(&self, chunk_id: &str, data: &[u8]) -> ChunkResult<()>;

    /// Retrieves a chunk by its id, `None` if it was never written or has been deleted.
    async fn get_chunk(&self, chunk_id: &str) -> ChunkResult<Option<Bytes>>;

    /// Removes a chunk. Deleting an absent chunk is not an error.
    async fn delete_chunk(&self, chunk_id: &str) -> ChunkResult<()>;

    /// Lists the ids of every chunk currently held, in no particular order.
    async fn list_chunks(&self) -> ChunkResult<Vec<String>>;
}
