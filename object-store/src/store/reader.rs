use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, Stream};

use crate::error::{StoreError, StoreResult};
use crate::store::chunk_storage::ChunkStores;
use crate::store::manifest_storage::ManifestStore;
use crate::store::types::{chunk_id, Manifest, ObjectId};

/// Lazily produced content of one object, chunk by chunk. Single pass; dropping
/// it stops any further chunk reads.
pub type ObjectStream = Pin<Box<dyn Stream<Item = StoreResult<Bytes>> + Send>>;

#[derive(Clone)]
pub struct ObjectReader {
    pub(crate) manifests: ManifestStore,
    pub(crate) chunks: ChunkStores,
}

impl ObjectReader {
    /// Returns the manifest of a committed object.
    pub fn stat(&self, id: &ObjectId) -> StoreResult<Arc<Manifest>> {
        self.manifests.get(id)?.ok_or(StoreError::NotFound(*id))
    }

    /// Opens an object for reading.
    ///
    /// Only the manifest is read up front. Chunks are fetched one at a time, by
    /// sequence number, as the stream is polled. A chunk that is missing or
    /// does not have the length the manifest implies ends the stream with an
    /// integrity error instead of yielding short content.
    pub fn fetch(&self, id: &ObjectId) -> StoreResult<(Arc<Manifest>, ObjectStream)> {
        let manifest = self.stat(id)?;
        let stream = chunk_stream(self.chunks.clone(), manifest.clone());
        Ok((manifest, stream))
    }

    /// Removes an object. The manifest goes first so readers stop finding the
    /// object before any chunk disappears. Unknown ids are not an error.
    pub async fn delete(&self, id: &ObjectId) -> StoreResult<()> {
        let Some(manifest) = self.manifests.get(id)? else {
            tracing::debug!("delete of unknown object {}", id);
            return Ok(());
        };

        self.manifests.remove(id)?;

        for sequence in 0..manifest.chunk_count() {
            if let Err(e) = self.chunks.as_trait().delete_chunk(&chunk_id(id, sequence)).await {
                // the object is already gone for readers, leftovers are swept later
                tracing::warn!("failed to delete chunk {} of object {}: {}", sequence, id, e);
            }
        }
        tracing::debug!("deleted object {}", id);
        Ok(())
    }
}

fn chunk_stream(chunks: ChunkStores, manifest: Arc<Manifest>) -> ObjectStream {
    let total = manifest.chunk_count();
    Box::pin(stream::try_unfold(0u64, move |sequence| {
        let chunks = chunks.clone();
        let manifest = manifest.clone();
        async move {
            if sequence >= total {
                return Ok(None);
            }

            let data = chunks
                .as_trait()
                .get_chunk(&chunk_id(&manifest.id, sequence))
                .await
                .map_err(StoreError::Io)?
                .ok_or_else(|| {
                    StoreError::integrity(
                        manifest.id,
                        format!("chunk {} of {} is missing", sequence, total),
                    )
                })?;

            let expected = manifest.expected_chunk_len(sequence);
            if data.len() as u64 != expected {
                return Err(StoreError::integrity(
                    manifest.id,
                    format!(
                        "chunk {} has {} bytes, expected {}",
                        sequence,
                        data.len(),
                        expected
                    ),
                ));
            }

            Ok(Some((data, sequence + 1)))
        }
    }))
}
