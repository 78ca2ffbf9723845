use std::collections::BTreeMap;
use std::io;
use std::pin::pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use dashmap::DashSet;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};
use crate::store::chunk_storage::ChunkStores;
use crate::store::manifest_storage::ManifestStore;
use crate::store::types::{chunk_id, Manifest, ObjectId};

/// Ids of objects whose chunks are being written and whose manifest is not
/// committed yet. The orphan sweep leaves their chunks alone.
pub type InFlight = Arc<DashSet<ObjectId>>;

/// Keeps an id registered as in flight until dropped, which also covers a
/// `store` future being cancelled halfway.
struct InFlightGuard {
    in_flight: InFlight,
    id: ObjectId,
}

impl InFlightGuard {
    fn register(in_flight: &InFlight, id: ObjectId) -> Self {
        in_flight.insert(id);
        Self { in_flight: in_flight.clone(), id }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

/// Splits incoming byte streams into chunks and commits a manifest once all of
/// them are durable.
#[derive(Clone)]
pub struct ObjectWriter {
    pub(crate) manifests: ManifestStore,
    pub(crate) chunks: ChunkStores,
    pub(crate) in_flight: InFlight,
    pub(crate) chunk_size: usize,
    pub(crate) max_object_size: Option<u64>,
}

impl ObjectWriter {
    /// Consumes `source` to completion and stores it as a new object.
    ///
    /// Chunks are written in sequence order and the manifest last, so the
    /// returned manifest is the first moment the object is visible. If the
    /// source fails, or any write fails, no manifest is committed and the
    /// chunks written so far are deleted on a best-effort basis.
    pub async fn store<S>(
        &self,
        name: &str,
        content_type: &str,
        extra: BTreeMap<String, String>,
        source: S,
    ) -> StoreResult<Manifest>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        if name.trim().is_empty() {
            return Err(StoreError::Invalid("object name must not be empty".to_string()));
        }
        if content_type.trim().is_empty() {
            return Err(StoreError::Invalid("content type must not be empty".to_string()));
        }

        let id = ObjectId::generate();
        let _guard = InFlightGuard::register(&self.in_flight, id);

        let mut written = 0u64;
        let outcome = match self.write_chunks(&id, source, &mut written).await {
            Ok((length, sha256)) => {
                let manifest = Manifest {
                    id,
                    name: name.to_string(),
                    length,
                    chunk_size: self.chunk_size as u64,
                    content_type: content_type.to_string(),
                    created_at: Utc::now(),
                    sha256,
                    extra,
                };
                self.manifests.commit(&manifest).map(|_| manifest)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(manifest) => {
                tracing::debug!(
                    "stored object {} ({} bytes in {} chunks)",
                    id,
                    manifest.length,
                    written
                );
                Ok(manifest)
            }
            Err(e) => {
                tracing::warn!("store of object {} failed after {} chunks: {}", id, written, e);
                self.discard_chunks(&id, written).await;
                Err(e)
            }
        }
    }

    /// Re-chunks the source into `chunk_size` pieces and writes them in order.
    /// Returns the total length and the hex SHA-256 of the content.
    async fn write_chunks<S>(
        &self,
        id: &ObjectId,
        source: S,
        written: &mut u64,
    ) -> StoreResult<(u64, String)>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut source = pin!(source);
        let mut buffer = BytesMut::with_capacity(self.chunk_size);
        let mut hasher = Sha256::new();
        let mut length = 0u64;

        while let Some(piece) = source.next().await {
            let piece = piece?;
            length += piece.len() as u64;
            if let Some(limit) = self.max_object_size {
                if length > limit {
                    return Err(StoreError::TooLarge { limit });
                }
            }
            hasher.update(&piece);
            buffer.extend_from_slice(&piece);

            while buffer.len() >= self.chunk_size {
                let chunk = buffer.split_to(self.chunk_size).freeze();
                self.put_chunk(id, *written, &chunk).await?;
                *written += 1;
            }
        }

        if !buffer.is_empty() {
            let chunk = buffer.freeze();
            self.put_chunk(id, *written, &chunk).await?;
            *written += 1;
        }

        let digest = hasher.finalize();
        let sha256: String = digest.iter().map(|byte| format!("{:02x}", byte)).collect();
        Ok((length, sha256))
    }

    async fn put_chunk(&self, id: &ObjectId, sequence: u64, data: &[u8]) -> StoreResult<()> {
        self.chunks
            .as_trait()
            .put_chunk(&chunk_id(id, sequence), data)
            .await
            .map_err(StoreError::Io)
    }

    /// Best-effort removal of the chunks of an abandoned write. Whatever is left
    /// behind is picked up by the orphan sweep.
    async fn discard_chunks(&self, id: &ObjectId, written: u64) {
        // one past `written`: a failed put may have left a partial chunk behind
        for sequence in 0..=written {
            if let Err(e) = self.chunks.as_trait().delete_chunk(&chunk_id(id, sequence)).await {
                tracing::warn!("could not discard chunk {} of object {}: {}", sequence, id, e);
            }
        }
    }
}
