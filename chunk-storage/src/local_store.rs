use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::store::{ChunkResult, ChunkStore};

/// A `ChunkStore` that keeps one file per chunk in a local directory.
#[derive(Clone, Debug)]
pub struct LocalChunkStore {
    directory: PathBuf,
}

impl LocalChunkStore {
    /// Creates a new `LocalChunkStore` targeting the specified directory.
    /// The directory is expected to exist already.
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    /// Creates the directory if needed and returns a store rooted at it.
    pub fn open(directory: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::create_dir_all(directory.as_ref())?;
        Ok(Self::new(directory.as_ref().to_path_buf()))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn chunk_path(&self, chunk_id: &str) -> PathBuf {
        self.directory.join(chunk_id)
    }
}

#[async_trait]
impl ChunkStore for LocalChunkStore {
    async fn put_chunk(&self, chunk_id: &str, data: &[u8]) -> ChunkResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.chunk_path(chunk_id))
            .await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn get_chunk(&self, chunk_id: &str) -> ChunkResult<Option<Bytes>> {
        match fs::read(self.chunk_path(chunk_id)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_chunk(&self, chunk_id: &str) -> ChunkResult<()> {
        match fs::remove_file(self.chunk_path(chunk_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_chunks(&self) -> ChunkResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.directory).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => ids.push(name),
                Err(name) => tracing::warn!("skipping non-utf8 chunk file {:?}", name),
            }
        }
        Ok(ids)
    }
}
