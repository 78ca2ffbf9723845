use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use object_store::config::{DEFAULT_CHUNK_SIZE, DEFAULT_MANIFEST_CACHE_CAPACITY};
use object_store::{ChunkBackend, StoreConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChunkBackendArg {
    Local,
    Rocks,
    Memory,
}

#[derive(Parser, Debug)]
#[clap(about = "HTTP front for the chunked object store")]
pub struct Args {
    #[clap(long, env = "OBJECT_STORE_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    pub(crate) http_addr: String,
    /// Directory holding the manifest database (and local chunks unless --chunk-dir is set)
    #[clap(long, env = "OBJECT_STORE_DATA_DIR", default_value = "data")]
    pub(crate) data_dir: PathBuf,
    #[clap(long, env = "OBJECT_STORE_CHUNK_BACKEND", value_enum, default_value_t = ChunkBackendArg::Local)]
    pub(crate) chunk_backend: ChunkBackendArg,
    #[clap(long, env = "OBJECT_STORE_CHUNK_DIR")]
    pub(crate) chunk_dir: Option<PathBuf>,
    #[clap(long, env = "OBJECT_STORE_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub(crate) chunk_size: usize,
    /// Largest accepted object in bytes, unbounded when omitted
    #[clap(long, env = "OBJECT_STORE_MAX_OBJECT_SIZE")]
    pub(crate) max_object_size: Option<u64>,
    #[clap(long, env = "OBJECT_STORE_MANIFEST_CACHE_CAPACITY", default_value_t = DEFAULT_MANIFEST_CACHE_CAPACITY)]
    pub(crate) manifest_cache_capacity: usize,
    /// Seconds between orphan chunk sweeps, 0 disables sweeping
    #[clap(long, env = "OBJECT_STORE_SWEEP_INTERVAL_SECS", default_value_t = 3600)]
    pub(crate) sweep_interval_secs: u64,
}

impl Args {
    pub fn manifest_db_path(&self) -> PathBuf {
        self.data_dir.join("manifests.db")
    }

    pub fn chunk_backend(&self) -> ChunkBackend {
        match self.chunk_backend {
            ChunkBackendArg::Local => ChunkBackend::Local(
                self.chunk_dir
                    .clone()
                    .unwrap_or_else(|| self.data_dir.join("chunks")),
            ),
            ChunkBackendArg::Rocks => ChunkBackend::Rocks,
            ChunkBackendArg::Memory => ChunkBackend::Memory,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            chunk_size: self.chunk_size,
            max_object_size: self.max_object_size,
            manifest_cache_capacity: self.manifest_cache_capacity,
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}
