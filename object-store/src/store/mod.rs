use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::store::chunk_storage::{ChunkBackend, ChunkStores};
use crate::store::manifest_storage::ManifestStore;
use crate::store::reader::{ObjectReader, ObjectStream};
use crate::store::storage::new_storage;
use crate::store::sweep::SweepReport;
use crate::store::types::{Manifest, ObjectId};
use crate::store::writer::ObjectWriter;

pub mod chunk_storage;
pub mod manifest_storage;
pub mod reader;
pub mod storage;
pub mod sweep;
pub mod types;
pub mod writer;

/// A chunked binary object store: manifests in RocksDB, chunks in the
/// configured [`ChunkBackend`]. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct ObjectStore {
    writer: ObjectWriter,
    reader: ObjectReader,
    config: Arc<StoreConfig>,
}

impl ObjectStore {
    /// Opens the store whose manifests live in the RocksDB database at `db_path`.
    pub fn open<P: AsRef<Path>>(
        db_path: P,
        backend: &ChunkBackend,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let config = config.validate()?;
        let db = new_storage(db_path)?;

        let manifests = ManifestStore::new(db.clone(), config.manifest_cache_capacity);
        let chunks = ChunkStores::open(backend, db)?;
        tracing::info!(
            "opened object store with {:?} chunks of {} bytes",
            backend,
            config.chunk_size
        );

        Ok(Self {
            writer: ObjectWriter {
                manifests: manifests.clone(),
                chunks: chunks.clone(),
                in_flight: Default::default(),
                chunk_size: config.chunk_size,
                max_object_size: config.max_object_size,
            },
            reader: ObjectReader { manifests, chunks },
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// See [`ObjectWriter::store`].
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
        self.writer.store(name, content_type, extra, source).await
    }

    /// See [`ObjectReader::fetch`].
    pub fn fetch(&self, id: &ObjectId) -> StoreResult<(Arc<Manifest>, ObjectStream)> {
        self.reader.fetch(id)
    }

    pub fn stat(&self, id: &ObjectId) -> StoreResult<Arc<Manifest>> {
        self.reader.stat(id)
    }

    pub async fn delete(&self, id: &ObjectId) -> StoreResult<()> {
        self.reader.delete(id).await
    }

    /// Reclaims chunks that no committed manifest owns.
    pub async fn sweep_orphans(&self) -> StoreResult<SweepReport> {
        sweep::sweep_orphans(&self.reader.manifests, &self.reader.chunks, &self.writer.in_flight)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use futures::channel::mpsc;
    use futures::{stream, StreamExt, TryStreamExt};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const CHUNK: usize = 16;

    fn open(backend: ChunkBackend) -> (TempDir, ObjectStore) {
        let temp_dir = tempdir().unwrap();
        let config = StoreConfig { chunk_size: CHUNK, ..Default::default() };
        let store = ObjectStore::open(temp_dir.path().join("db"), &backend, config).unwrap();
        (temp_dir, store)
    }

    fn memory_store() -> (TempDir, ObjectStore) {
        open(ChunkBackend::Memory)
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    /// Feeds `data` in pieces of `piece` bytes, unrelated to the chunk size.
    fn source(data: &[u8], piece: usize) -> impl Stream<Item = io::Result<Bytes>> {
        let pieces: Vec<io::Result<Bytes>> = data
            .chunks(piece.max(1))
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        stream::iter(pieces)
    }

    async fn read_all(store: &ObjectStore, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let (_, stream) = store.fetch(id)?;
        let parts: Vec<Bytes> = stream.try_collect().await?;
        Ok(parts.concat())
    }

    async fn chunk_count(store: &ObjectStore) -> usize {
        store.reader.chunks.as_trait().list_chunks().await.unwrap().len()
    }

    #[tokio::test]
    async fn test_round_trip_boundaries() {
        let (_dir, store) = memory_store();
        for len in [0, 1, CHUNK - 1, CHUNK, CHUNK + 1, 3 * CHUNK + 5, 10 * CHUNK] {
            let data = payload(len);
            let manifest = store
                .store("x.glb", "model/gltf-binary", BTreeMap::new(), source(&data, 7))
                .await
                .unwrap();
            assert_eq!(manifest.length, len as u64);
            assert_eq!(manifest.chunk_count(), len.div_ceil(CHUNK) as u64);
            assert_eq!(read_all(&store, &manifest.id).await.unwrap(), data, "length {}", len);
        }
    }

    #[tokio::test]
    async fn test_round_trip_on_every_backend() {
        let temp_dir = tempdir().unwrap();
        for backend in [
            ChunkBackend::Local(temp_dir.path().join("chunks")),
            ChunkBackend::Rocks,
            ChunkBackend::Memory,
        ] {
            let (_dir, store) = open(backend);
            let data = payload(5 * CHUNK + 3);
            let manifest = store
                .store("a.obj", "model/obj", BTreeMap::new(), source(&data, 100))
                .await
                .unwrap();
            assert_eq!(read_all(&store, &manifest.id).await.unwrap(), data);
        }
    }

    #[tokio::test]
    async fn test_output_does_not_depend_on_input_pieces() {
        let (_dir, store) = memory_store();
        let data = payload(4 * CHUNK + 9);
        let mut ids = Vec::new();
        for piece in [1, 5, CHUNK, CHUNK + 3, data.len()] {
            let manifest = store
                .store("m.stl", "model/stl", BTreeMap::new(), source(&data, piece))
                .await
                .unwrap();
            ids.push((manifest.id, manifest.sha256));
        }
        let digest = &ids[0].1;
        for (id, sha) in &ids {
            assert_eq!(sha, digest);
            assert_eq!(read_all(&store, id).await.unwrap(), data);
        }
    }

    #[tokio::test]
    async fn test_manifest_carries_caller_metadata() {
        let (_dir, store) = memory_store();
        let extra = BTreeMap::from([("isThumbnail".to_string(), "true".to_string())]);
        let manifest = store
            .store("thumb.png", "image/png", extra.clone(), source(b"png", 2))
            .await
            .unwrap();

        let stat = store.stat(&manifest.id).unwrap();
        assert_eq!(stat.name, "thumb.png");
        assert_eq!(stat.content_type, "image/png");
        assert_eq!(stat.extra, extra);
        assert_eq!(stat.chunk_size, CHUNK as u64);
        assert_eq!(
            stat.sha256,
            "8f8cbb7dcf46e0bc7d53265749a6c17d116093a6ba95e442764060c76fd4a86c"
        );
    }

    #[tokio::test]
    async fn test_empty_name_or_type_is_invalid() {
        let (_dir, store) = memory_store();
        let err = store.store("", "model/stl", BTreeMap::new(), source(b"x", 1)).await;
        assert!(matches!(err, Err(StoreError::Invalid(_))));
        let err = store.store("a.stl", " ", BTreeMap::new(), source(b"x", 1)).await;
        assert!(matches!(err, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = memory_store();
        let manifest = store
            .store("x.glb", "model/gltf-binary", BTreeMap::new(), source(&payload(40), 8))
            .await
            .unwrap();

        store.delete(&manifest.id).await.unwrap();
        assert!(matches!(store.fetch(&manifest.id), Err(StoreError::NotFound(_))));
        store.delete(&manifest.id).await.unwrap();
        assert!(matches!(store.fetch(&manifest.id), Err(StoreError::NotFound(_))));
        assert_eq!(chunk_count(&store).await, 0);

        store.delete(&ObjectId::generate()).await.unwrap();
    }

    #[tokio::test]
    async fn test_objects_are_isolated() {
        let (_dir, store) = memory_store();
        let first = payload(3 * CHUNK);
        let second = payload(2 * CHUNK + 1);
        let a = store
            .store("a.fbx", "application/octet-stream", BTreeMap::new(), source(&first, 9))
            .await
            .unwrap();
        let b = store
            .store("b.fbx", "application/octet-stream", BTreeMap::new(), source(&second, 9))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);

        store.delete(&a.id).await.unwrap();
        assert_eq!(read_all(&store, &b.id).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_missing_chunk_is_an_integrity_failure() {
        let (_dir, store) = memory_store();
        let manifest = store
            .store("x.glb", "model/gltf-binary", BTreeMap::new(), source(&payload(3 * CHUNK), 4))
            .await
            .unwrap();
        store
            .reader
            .chunks
            .as_trait()
            .delete_chunk(&types::chunk_id(&manifest.id, 1))
            .await
            .unwrap();

        let (_, mut stream) = store.fetch(&manifest.id).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().len(), CHUNK);
        assert!(matches!(stream.next().await, Some(Err(StoreError::Integrity { .. }))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_truncated_chunk_is_an_integrity_failure() {
        let (_dir, store) = memory_store();
        let manifest = store
            .store("x.glb", "model/gltf-binary", BTreeMap::new(), source(&payload(2 * CHUNK), 4))
            .await
            .unwrap();
        store
            .reader
            .chunks
            .as_trait()
            .put_chunk(&types::chunk_id(&manifest.id, 1), b"short")
            .await
            .unwrap();

        assert!(matches!(
            read_all(&store, &manifest.id).await,
            Err(StoreError::Integrity { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_source_commits_nothing() {
        let (_dir, store) = memory_store();
        let pieces: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from(payload(2 * CHUNK + 3))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ];

        let err = store
            .store("x.glb", "model/gltf-binary", BTreeMap::new(), stream::iter(pieces))
            .await;
        assert!(matches!(err, Err(StoreError::Io(_))));
        assert_eq!(store.reader.manifests.count().unwrap(), 0);
        assert_eq!(chunk_count(&store).await, 0);
        assert!(store.writer.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_size_limit() {
        let temp_dir = tempdir().unwrap();
        let config = StoreConfig {
            chunk_size: CHUNK,
            max_object_size: Some(20),
            ..Default::default()
        };
        let store = ObjectStore::open(temp_dir.path(), &ChunkBackend::Memory, config).unwrap();

        let ok = store
            .store("a.stl", "model/stl", BTreeMap::new(), source(&payload(20), 3))
            .await;
        assert!(ok.is_ok());
        let err = store
            .store("b.stl", "model/stl", BTreeMap::new(), source(&payload(21), 3))
            .await;
        assert!(matches!(err, Err(StoreError::TooLarge { limit: 20 })));
        assert_eq!(store.reader.manifests.count().unwrap(), 1);
        assert_eq!(chunk_count(&store).await, 2);
    }

    #[tokio::test]
    async fn test_pending_write_is_invisible_and_survives_sweep() {
        let (_dir, store) = memory_store();
        let (tx, rx) = mpsc::unbounded::<io::Result<Bytes>>();

        let writer = store.clone();
        let handle = tokio::spawn(async move {
            writer
                .store("slow.glb", "model/gltf-binary", BTreeMap::new(), rx)
                .await
        });

        tx.unbounded_send(Ok(Bytes::from(payload(2 * CHUNK)))).unwrap();
        while chunk_count(&store).await < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(store.reader.manifests.count().unwrap(), 0);
        let report = store.sweep_orphans().await.unwrap();
        assert_eq!(report, SweepReport { scanned: 2, removed: 0 });

        drop(tx);
        let manifest = handle.await.unwrap().unwrap();
        assert_eq!(store.reader.manifests.count().unwrap(), 1);
        assert_eq!(read_all(&store, &manifest.id).await.unwrap(), payload(2 * CHUNK));
    }

    #[tokio::test]
    async fn test_sweep_removes_orphans_only() {
        let (_dir, store) = memory_store();
        let kept = store
            .store("kept.glb", "model/gltf-binary", BTreeMap::new(), source(&payload(2 * CHUNK), 5))
            .await
            .unwrap();

        let orphan = ObjectId::generate();
        let chunks = store.reader.chunks.as_trait();
        chunks.put_chunk(&types::chunk_id(&orphan, 0), b"left").await.unwrap();
        chunks.put_chunk(&types::chunk_id(&orphan, 1), b"over").await.unwrap();
        chunks.put_chunk("not-a-chunk-key", b"?").await.unwrap();

        let report = store.sweep_orphans().await.unwrap();
        assert_eq!(report, SweepReport { scanned: 5, removed: 2 });
        assert_eq!(read_all(&store, &kept.id).await.unwrap(), payload(2 * CHUNK));
        assert_eq!(chunk_count(&store).await, 3);
    }

    #[tokio::test]
    async fn test_five_megabyte_scenario() {
        let temp_dir = tempdir().unwrap();
        let store =
            ObjectStore::open(temp_dir.path(), &ChunkBackend::Memory, StoreConfig::default())
                .unwrap();
        let data = payload(5 * 1024 * 1024);

        let manifest = store
            .store("x.glb", "model/gltf-binary", BTreeMap::new(), source(&data, 64 * 1024))
            .await
            .unwrap();
        assert_eq!(manifest.chunk_count(), 21);

        let (fetched, stream) = store.fetch(&manifest.id).unwrap();
        assert_eq!(fetched.content_type, "model/gltf-binary");
        let parts: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(parts.concat(), data);

        store.delete(&manifest.id).await.unwrap();
        assert!(matches!(store.fetch(&manifest.id), Err(StoreError::NotFound(_))));
    }
}
